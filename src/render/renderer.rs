//! Single-shot page rendering

use crate::document::{DocumentSession, PageGeometry, RenderError};

use super::pixels::PixelBuffer;
use super::types::RenderSpec;

/// Renders one page of a session into an owned [`PixelBuffer`]
///
/// Each [`render`](PageRenderer::render) issues exactly one native
/// rasterization and replaces the previous buffer.
pub struct PageRenderer<'a> {
    session: &'a DocumentSession,
    page: u32,
    geometry: Option<PageGeometry>,
    spec: RenderSpec,
    buffer: Option<PixelBuffer>,
}

impl<'a> PageRenderer<'a> {
    /// Renderer for a 1-indexed page; geometry is looked up on render
    pub fn new(session: &'a DocumentSession, page: u32, spec: RenderSpec) -> Self {
        Self {
            session,
            page,
            geometry: None,
            spec,
            buffer: None,
        }
    }

    /// Renderer for geometry already fetched from the session
    pub fn with_geometry(session: &'a DocumentSession, geometry: PageGeometry, spec: RenderSpec) -> Self {
        Self {
            session,
            page: geometry.page,
            geometry: Some(geometry),
            spec,
            buffer: None,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn spec(&self) -> &RenderSpec {
        &self.spec
    }

    pub fn set_spec(&mut self, spec: RenderSpec) {
        self.spec = spec;
    }

    /// Rasterize the page; `spec.crop` applies only when `use_cropping`
    pub fn render(&mut self, use_cropping: bool) -> Result<&PixelBuffer, RenderError> {
        if !self.session.is_open() {
            return Err(RenderError::Closed);
        }
        let geometry = match self.geometry {
            Some(geometry) => geometry,
            None => self.session.resolve_page(self.page)?,
        };

        let crop = if use_cropping { self.spec.crop.as_ref() } else { None };
        let source = geometry.source_rect(crop)?;
        let (ctm, area) = geometry.device_area(&source, self.spec.zoom, self.spec.rotation)?;

        tracing::debug!(
            "Rendering page {} at zoom {} ({}x{} px, {})",
            self.page,
            self.spec.zoom,
            area.width(),
            area.height(),
            self.spec.color
        );

        let buffer = self.session.rasterize(self.page, ctm, area, &self.spec)?;
        Ok(self.buffer.insert(buffer))
    }

    /// Buffer from the last render, if not disposed
    pub fn buffer(&self) -> Option<&PixelBuffer> {
        self.buffer.as_ref()
    }

    /// Hand the buffer to the caller
    pub fn take_buffer(&mut self) -> Option<PixelBuffer> {
        self.buffer.take()
    }

    /// Release the buffer; rendering again reallocates
    pub fn dispose(&mut self) {
        self.buffer = None;
    }
}
