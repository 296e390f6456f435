//! Document session: one live native handle
//!
//! A session owns exactly one engine handle. Every accessor that reaches the
//! engine checks the handle first; after [`DocumentSession::close`] they
//! return empty values (`0`, `None`, `false`) without any native call, so
//! late calls that race with disposal are harmless.
//!
//! Sessions are not shared between threads. Use
//! [`DocumentSession::try_clone`] to get an independent handle per thread.

use std::cell::OnceCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;

use crate::engine::{Handle, NativeEngine, PageLink, RasterColorspace, RasterRequest, STATUS_OK};
use crate::export::{ExportFormat, RasterExporter, TiffCompression, TiffWriteMode};
use crate::render::{ColorMode, IRect, Matrix, PageRenderer, PixelBuffer, RenderSpec, Rotation};

use super::error::{ExportError, OpenError, RenderError, Result};
use super::outline::Outline;
use super::types::{
    DocumentKind, DocumentSource, OpenOptions, PageGeometry, PdfVersion, MAX_ANTI_ALIAS_LEVEL,
};

/// Owned native document handle
pub struct DocumentSession {
    engine: Arc<dyn NativeEngine>,
    handle: Handle,
    kind: DocumentKind,
    path: PathBuf,
    password: Option<String>,
    memory_budget: usize,
    page_count: u32,
    anti_alias_level: u8,
    /// Temp copy of a byte payload; deleted when the last sharing session lets go
    temp_file: Option<Arc<TempPath>>,
    outline: OnceCell<Outline>,
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("page_count", &self.page_count)
            .field("cached", &self.temp_file.is_some())
            .finish()
    }
}

impl DocumentSession {
    /// Open a document from a path or an in-memory payload
    pub fn open(
        engine: Arc<dyn NativeEngine>,
        source: impl Into<DocumentSource>,
        options: &OpenOptions,
    ) -> Result<Self> {
        match source.into() {
            DocumentSource::Path(path) => {
                if !path.exists() {
                    return Err(OpenError::NotFound(path));
                }
                Self::open_resolved(engine, path, None, options)
            }
            DocumentSource::Bytes(bytes) => {
                let mut file = tempfile::Builder::new()
                    .prefix("docraster-")
                    .suffix(options.kind.temp_suffix())
                    .tempfile()?;
                file.write_all(&bytes)?;
                file.flush()?;
                let temp = file.into_temp_path();
                let path = temp.to_path_buf();
                tracing::debug!("Materialized {} byte payload at {}", bytes.len(), path.display());
                Self::open_resolved(engine, path, Some(Arc::new(temp)), options)
            }
        }
    }

    pub fn open_path(
        engine: Arc<dyn NativeEngine>,
        path: impl AsRef<Path>,
        options: &OpenOptions,
    ) -> Result<Self> {
        Self::open(engine, DocumentSource::Path(path.as_ref().to_path_buf()), options)
    }

    pub fn open_bytes(
        engine: Arc<dyn NativeEngine>,
        bytes: Vec<u8>,
        options: &OpenOptions,
    ) -> Result<Self> {
        Self::open(engine, DocumentSource::Bytes(bytes), options)
    }

    /// Open, run `f`, then close, whatever `f` returns
    pub fn with_open<F, R>(
        engine: Arc<dyn NativeEngine>,
        source: impl Into<DocumentSource>,
        options: &OpenOptions,
        f: F,
    ) -> Result<R>
    where
        F: FnOnce(&mut DocumentSession) -> R,
    {
        let mut session = Self::open(engine, source, options)?;
        let result = f(&mut session);
        session.close();
        Ok(result)
    }

    fn open_resolved(
        engine: Arc<dyn NativeEngine>,
        path: PathBuf,
        temp_file: Option<Arc<TempPath>>,
        options: &OpenOptions,
    ) -> Result<Self> {
        let memory_budget = options.memory_budget_bytes();
        let password = options
            .password
            .clone()
            .filter(|_| options.kind.supports_password());

        let handle = match options.kind {
            DocumentKind::Primary => engine.open_primary(&path, password.as_deref(), memory_budget),
            DocumentKind::Secondary => engine.open_secondary(&path, memory_budget),
        };
        if handle <= 0 {
            let err = OpenError::from_handle(handle);
            tracing::warn!("Failed to open {}: {}", path.display(), err);
            return Err(err);
        }

        let page_count = engine.page_count(handle).max(0) as u32;
        let anti_alias_level = engine
            .anti_alias_level(handle)
            .clamp(0, MAX_ANTI_ALIAS_LEVEL as i32) as u8;

        tracing::info!(
            "Opened {:?} document {} (handle {}, {} pages)",
            options.kind,
            path.display(),
            handle,
            page_count
        );

        Ok(Self {
            engine,
            handle,
            kind: options.kind,
            path,
            password,
            memory_budget,
            page_count,
            anti_alias_level,
            temp_file,
            outline: OnceCell::new(),
        })
    }

    /// Release the handle, the temp file and the outline; safe to repeat
    pub fn close(&mut self) {
        if self.handle > 0 {
            self.engine.close(self.handle);
            tracing::debug!("Closed handle {} ({})", self.handle, self.path.display());
        }
        self.handle = 0;
        self.page_count = 0;
        self.outline.take();
        self.temp_file = None;
    }

    pub fn is_open(&self) -> bool {
        self.handle > 0
    }

    /// Native handle; `0` once closed
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Path handed to the engine; `None` once closed
    pub fn document_path(&self) -> Option<&Path> {
        self.is_open().then_some(self.path.as_path())
    }

    /// True when the document was opened from an in-memory payload
    pub fn is_cached(&self) -> bool {
        self.temp_file.is_some()
    }

    /// Budget passed to the engine, in bytes
    pub fn memory_budget(&self) -> usize {
        self.memory_budget
    }

    pub fn page_count(&self) -> u32 {
        if !self.is_open() {
            return 0;
        }
        self.page_count
    }

    /// Current anti-alias level; `None` once closed
    pub fn anti_alias_level(&self) -> Option<u8> {
        self.is_open().then_some(self.anti_alias_level)
    }

    /// Clamp `level` to 0..=8 and apply it; no native call when unchanged
    pub fn set_anti_alias_level(&mut self, level: i32) -> bool {
        if !self.is_open() {
            return false;
        }
        let level = level.clamp(0, MAX_ANTI_ALIAS_LEVEL as i32) as u8;
        if level == self.anti_alias_level {
            return true;
        }
        if self.engine.set_anti_alias_level(self.handle, level) != STATUS_OK {
            return false;
        }
        self.anti_alias_level = level;
        true
    }

    /// Geometry of a 1-indexed page; `None` when closed or out of range
    pub fn page_geometry(&self, page: u32) -> Option<PageGeometry> {
        if !self.is_open() || page == 0 || page > self.page_count {
            return None;
        }
        let info = self.engine.page_info(self.handle, page)?;
        Some(PageGeometry {
            page,
            bounds: info.bounds,
            rotation: info.rotation,
        })
    }

    /// Linked outline, fetched from the engine on first use
    pub fn outline(&self) -> Option<&Outline> {
        if !self.is_open() {
            return None;
        }
        Some(
            self.outline
                .get_or_init(|| Outline::from_entries(self.engine.outline(self.handle))),
        )
    }

    /// Format version of a PDF; `None` for XPS, when unknown or closed
    pub fn version(&self) -> Option<PdfVersion> {
        if !self.is_open() || self.kind != DocumentKind::Primary {
            return None;
        }
        PdfVersion::from_code(self.engine.version(self.handle))
    }

    /// Links on a 1-indexed PDF page; empty when closed or out of range
    pub fn page_links(&self, page: u32) -> Vec<PageLink> {
        if !self.is_open()
            || self.kind != DocumentKind::Primary
            || page == 0
            || page > self.page_count
        {
            return Vec::new();
        }
        self.engine.page_links(self.handle, page)
    }

    /// Independent session on the same source and password
    pub fn try_clone(&self) -> Option<DocumentSession> {
        if !self.is_open() {
            return None;
        }
        let options = OpenOptions {
            password: self.password.clone(),
            kind: self.kind,
            memory_budget_mib: (self.memory_budget >> 20) as i64,
        };
        Self::open_resolved(
            Arc::clone(&self.engine),
            self.path.clone(),
            self.temp_file.clone(),
            &options,
        )
        .map_err(|e| tracing::warn!("Reopening {} failed: {}", self.path.display(), e))
        .ok()
    }

    /// Geometry for rendering, with errors instead of empty values
    pub(crate) fn resolve_page(&self, page: u32) -> std::result::Result<PageGeometry, RenderError> {
        if !self.is_open() {
            return Err(RenderError::Closed);
        }
        if page == 0 || page > self.page_count {
            return Err(RenderError::PageOutOfRange {
                page,
                count: self.page_count,
            });
        }
        self.page_geometry(page).ok_or(RenderError::Native {
            code: crate::engine::STATUS_RASTER_FAILED,
        })
    }

    /// One native rasterization of `area`, converted to `spec.color`
    pub(crate) fn rasterize(
        &self,
        page: u32,
        ctm: Matrix,
        area: IRect,
        spec: &RenderSpec,
    ) -> std::result::Result<PixelBuffer, RenderError> {
        if !self.is_open() {
            return Err(RenderError::Closed);
        }

        let request = RasterRequest {
            page,
            ctm,
            area,
            colorspace: if spec.color.wants_rgb() {
                RasterColorspace::Rgb
            } else {
                RasterColorspace::Gray
            },
            alpha: spec.color.wants_alpha(),
            anti_alias_level: self.anti_alias_level,
        };

        let raw = self
            .engine
            .rasterize(self.handle, &request)
            .map_err(|code| RenderError::Native { code })?;
        let buffer = PixelBuffer::from_raw(raw, spec.color, spec.gamma).ok_or(
            RenderError::Native {
                code: crate::engine::STATUS_RASTER_FAILED,
            },
        )?;

        Ok(buffer.with_resolution(72.0 * spec.zoom))
    }
}

/// Full-page export conveniences
///
/// Each validates its parameters before any native call, then renders the
/// whole page with [`Rotation::Auto`].
impl DocumentSession {
    /// Monochrome PBM, halftoned from a gray render
    pub fn save_as_pbm(
        &self,
        page: u32,
        file: impl AsRef<Path>,
        zoom: f32,
    ) -> std::result::Result<(), ExportError> {
        self.save_page(page, file.as_ref(), zoom, ColorMode::Gray, RasterExporter::new(ExportFormat::Pbm))
    }

    pub fn save_as_pnm(
        &self,
        page: u32,
        file: impl AsRef<Path>,
        zoom: f32,
        color: ColorMode,
    ) -> std::result::Result<(), ExportError> {
        self.save_page(page, file.as_ref(), zoom, color, RasterExporter::new(ExportFormat::Pnm))
    }

    /// `quality` outside 0..=100 falls back to 75
    pub fn save_as_jpeg(
        &self,
        page: u32,
        file: impl AsRef<Path>,
        zoom: f32,
        color: ColorMode,
        quality: i32,
    ) -> std::result::Result<(), ExportError> {
        let exporter = RasterExporter::new(ExportFormat::Jpeg).quality(quality);
        self.save_page(page, file.as_ref(), zoom, color, exporter)
    }

    pub fn save_as_bmp(
        &self,
        page: u32,
        file: impl AsRef<Path>,
        zoom: f32,
        color: ColorMode,
    ) -> std::result::Result<(), ExportError> {
        self.save_page(page, file.as_ref(), zoom, color, RasterExporter::new(ExportFormat::Bmp))
    }

    pub fn save_as_png(
        &self,
        page: u32,
        file: impl AsRef<Path>,
        zoom: f32,
        color: ColorMode,
    ) -> std::result::Result<(), ExportError> {
        self.save_page(page, file.as_ref(), zoom, color, RasterExporter::new(ExportFormat::Png))
    }

    pub fn save_as_pam(
        &self,
        page: u32,
        file: impl AsRef<Path>,
        zoom: f32,
        color: ColorMode,
    ) -> std::result::Result<(), ExportError> {
        self.save_page(page, file.as_ref(), zoom, color, RasterExporter::new(ExportFormat::Pam))
    }

    /// `quality` is clamped per compression; CCITT and NONE ignore it
    #[allow(clippy::too_many_arguments)]
    pub fn save_as_tiff(
        &self,
        page: u32,
        file: impl AsRef<Path>,
        zoom: f32,
        color: ColorMode,
        compression: TiffCompression,
        mode: TiffWriteMode,
        quality: i32,
    ) -> std::result::Result<(), ExportError> {
        let exporter = RasterExporter::new(ExportFormat::Tiff)
            .compression(compression)
            .mode(mode)
            .quality(quality);
        self.save_page(page, file.as_ref(), zoom, color, exporter)
    }

    fn save_page(
        &self,
        page: u32,
        file: &Path,
        zoom: f32,
        color: ColorMode,
        exporter: RasterExporter,
    ) -> std::result::Result<(), ExportError> {
        exporter.resolve(color)?;
        if !self.is_open() {
            return Err(RenderError::Closed.into());
        }

        let mut renderer = PageRenderer::new(self, page, RenderSpec::new(zoom, Rotation::Auto, color));
        renderer.render(false).map_err(|e| {
            tracing::warn!("Page {} of {} failed to render: {}", page, self.path.display(), e);
            ExportError::from(e)
        })?;
        let buffer = renderer.take_buffer().ok_or(ExportError::EncodeFailed {
            code: crate::engine::STATUS_RASTER_FAILED,
        })?;

        exporter.save(&buffer, file)
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RecordingEngine;

    fn fixture_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_open_records_page_count_and_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(&dir, "a.pdf", &RecordingEngine::fixture(4, 612.0, 792.0));
        let engine = Arc::new(RecordingEngine::new());

        let session = DocumentSession::open_path(engine.clone(), &path, &OpenOptions::default()).unwrap();
        assert!(session.is_open());
        assert_eq!(session.page_count(), 4);
        assert_eq!(session.anti_alias_level(), Some(8));
        assert_eq!(session.memory_budget(), 60 << 20);
        assert!(!session.is_cached());
        assert_eq!(session.document_path(), Some(path.as_path()));
    }

    #[test]
    fn test_anti_alias_clamped_and_unchanged_is_free() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(&dir, "a.pdf", &RecordingEngine::fixture(1, 100.0, 100.0));
        let engine = Arc::new(RecordingEngine::new());
        let mut session = DocumentSession::open_path(engine.clone(), &path, &OpenOptions::default()).unwrap();

        let before = engine.calls().anti_alias;
        assert!(session.set_anti_alias_level(42));
        assert_eq!(session.anti_alias_level(), Some(8));
        assert_eq!(engine.calls().anti_alias, before);

        assert!(session.set_anti_alias_level(-3));
        assert_eq!(session.anti_alias_level(), Some(0));
        assert_eq!(engine.calls().anti_alias, before + 1);
    }

    #[test]
    fn test_outline_is_linked_and_dropped_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{}outline=Intro:1;>Part:2;End:3\n",
            RecordingEngine::fixture(3, 100.0, 100.0)
        );
        let path = fixture_file(&dir, "a.pdf", &body);
        let engine = Arc::new(RecordingEngine::new());
        let mut session = DocumentSession::open_path(engine.clone(), &path, &OpenOptions::default()).unwrap();

        let outline = session.outline().unwrap();
        assert_eq!(outline.len(), 3);
        assert_eq!(outline.roots().len(), 2);
        session.outline();
        assert_eq!(engine.calls().outlines, 1);

        session.close();
        assert!(session.outline().is_none());
    }

    #[test]
    fn test_version_and_links_from_engine() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{}version=17\nlinks=1|10,10,100,30|3;2|0,0,50,50|https://example.com\n",
            RecordingEngine::fixture(3, 100.0, 100.0)
        );
        let path = fixture_file(&dir, "a.pdf", &body);
        let engine = Arc::new(RecordingEngine::new());
        let session = DocumentSession::open_path(engine.clone(), &path, &OpenOptions::default()).unwrap();

        assert_eq!(session.version().map(|v| v.to_string()).as_deref(), Some("1.7"));

        let links = session.page_links(1);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].page, Some(3));
        assert_eq!(session.page_links(2)[0].uri.as_deref(), Some("https://example.com"));
        assert!(session.page_links(3).is_empty());

        let before = engine.calls().metadata;
        assert!(session.page_links(0).is_empty());
        assert!(session.page_links(4).is_empty());
        assert_eq!(engine.calls().metadata, before);
    }

    #[test]
    fn test_secondary_kind_ignores_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(&dir, "a.xps", &RecordingEngine::fixture(2, 100.0, 100.0));
        let engine = Arc::new(RecordingEngine::new());
        let options = OpenOptions::new(DocumentKind::Secondary).password("ignored");

        let session = DocumentSession::open_path(engine, &path, &options).unwrap();
        assert_eq!(session.kind(), DocumentKind::Secondary);
        assert_eq!(session.password(), None);
    }
}
