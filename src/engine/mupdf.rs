//! MuPDF-backed engine
//!
//! # Design
//!
//! MuPDF documents are not thread-safe. Following the same approach as a
//! per-operation document wrapper, each handle maps to a [`SafeDocument`]
//! that:
//!
//! 1. Stores the document path and password
//! 2. Opens a fresh `mupdf::Document` for each operation
//! 3. Uses a `parking_lot::Mutex` to serialize access to that handle
//!
//! The handle table itself is guarded separately and only held long enough
//! to clone an `Arc`, so separate handles render in parallel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

use mupdf::{Colorspace, Device, Document, IRect, Matrix, MetadataName, Pixmap};
use parking_lot::Mutex;

use super::{
    Handle, NativeEngine, OutlineEntry, PageInfo, PageLink, RasterColorspace, RasterRequest, RawPixmap,
    OPEN_BAD_PASSWORD, OPEN_NEEDS_PASSWORD, STATUS_NO_DOCUMENT, STATUS_OK, STATUS_RASTER_FAILED,
};
use crate::document::DocumentKind;
use crate::render::Rect;

/// Generic open failure reported for unreadable documents
const OPEN_UNREADABLE: Handle = -2;
/// Default MuPDF anti-alias bits
const DEFAULT_AA_LEVEL: u8 = 8;

/// One open document: source, credentials and cached facts
struct SafeDocument {
    path: PathBuf,
    password: Option<String>,
    kind: DocumentKind,
    page_count: i32,
    anti_alias_level: Mutex<u8>,
    /// Serializes every MuPDF call on this handle
    lock: Mutex<()>,
}

impl SafeDocument {
    /// Open a fresh MuPDF document, authenticating when needed
    fn open_document(&self) -> Result<Document, mupdf::Error> {
        let path_str = self.path.to_string_lossy();
        let mut doc = Document::open(&*path_str)?;
        if let Some(password) = &self.password {
            if doc.needs_password()? {
                doc.authenticate(password)?;
            }
        }
        Ok(doc)
    }

    /// Execute a closure with a freshly opened document, serialized per handle
    fn with_doc<F, R>(&self, f: F) -> Result<R, mupdf::Error>
    where
        F: FnOnce(&Document) -> Result<R, mupdf::Error>,
    {
        let _guard = self.lock.lock();
        let doc = self.open_document()?;
        f(&doc)
    }
}

/// [`NativeEngine`] backed by MuPDF
pub struct MupdfEngine {
    documents: Mutex<HashMap<Handle, Arc<SafeDocument>>>,
    next_handle: AtomicI64,
}

impl MupdfEngine {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            next_handle: AtomicI64::new(1),
        }
    }

    /// Process-wide engine, created on first use
    pub fn shared() -> Arc<MupdfEngine> {
        static SHARED: OnceLock<Arc<MupdfEngine>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| {
            tracing::debug!("Initializing shared MuPDF engine");
            Arc::new(MupdfEngine::new())
        }))
    }

    /// Number of live handles
    pub fn open_handles(&self) -> usize {
        self.documents.lock().len()
    }

    fn document(&self, handle: Handle) -> Option<Arc<SafeDocument>> {
        self.documents.lock().get(&handle).cloned()
    }

    fn open(
        &self,
        path: &Path,
        password: Option<&str>,
        kind: DocumentKind,
        memory_budget: usize,
    ) -> Handle {
        let path_str = path.to_string_lossy();
        let mut doc = match Document::open(&*path_str) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("MuPDF could not open {}: {}", path.display(), e);
                return OPEN_UNREADABLE;
            }
        };

        match doc.needs_password() {
            Ok(true) => match password {
                None => return OPEN_NEEDS_PASSWORD,
                Some(pw) => match doc.authenticate(pw) {
                    Ok(true) => {}
                    Ok(false) => return OPEN_BAD_PASSWORD,
                    Err(e) => {
                        tracing::warn!("MuPDF authentication error: {}", e);
                        return OPEN_BAD_PASSWORD;
                    }
                },
            },
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("MuPDF security check failed: {}", e);
                return OPEN_UNREADABLE;
            }
        }

        let page_count = match doc.page_count() {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("MuPDF page count failed: {}", e);
                return OPEN_UNREADABLE;
            }
        };

        // MuPDF sizes its store per context, so the budget is advisory here
        tracing::debug!(
            "Opened {} ({:?}, {} pages, store hint {} bytes)",
            path.display(),
            kind,
            page_count,
            memory_budget
        );

        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let entry = SafeDocument {
            path: path.to_path_buf(),
            password: password.map(str::to_owned),
            kind,
            page_count,
            anti_alias_level: Mutex::new(DEFAULT_AA_LEVEL),
            lock: Mutex::new(()),
        };
        self.documents.lock().insert(handle, Arc::new(entry));
        handle
    }
}

impl Default for MupdfEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine for MupdfEngine {
    fn open_primary(&self, path: &Path, password: Option<&str>, memory_budget: usize) -> Handle {
        self.open(path, password, DocumentKind::Primary, memory_budget)
    }

    fn open_secondary(&self, path: &Path, memory_budget: usize) -> Handle {
        self.open(path, None, DocumentKind::Secondary, memory_budget)
    }

    fn close(&self, handle: Handle) {
        if let Some(doc) = self.documents.lock().remove(&handle) {
            tracing::debug!("Closed {:?} handle {} ({})", doc.kind, handle, doc.path.display());
        }
    }

    fn page_count(&self, handle: Handle) -> i32 {
        self.document(handle).map(|d| d.page_count).unwrap_or(0)
    }

    fn page_info(&self, handle: Handle, page: u32) -> Option<PageInfo> {
        let doc = self.document(handle)?;
        if page == 0 || page as i32 > doc.page_count {
            return None;
        }

        let bounds = doc
            .with_doc(|d| d.load_page(page as i32 - 1)?.bounds())
            .map_err(|e| tracing::warn!("MuPDF page {} bounds failed: {}", page, e))
            .ok()?;

        Some(PageInfo {
            bounds: Rect::new(bounds.x0, bounds.y0, bounds.x1, bounds.y1),
            // Page bounds and transform already include /Rotate
            rotation: 0,
        })
    }

    fn anti_alias_level(&self, handle: Handle) -> i32 {
        self.document(handle)
            .map(|d| *d.anti_alias_level.lock() as i32)
            .unwrap_or(-1)
    }

    fn set_anti_alias_level(&self, handle: Handle, level: u8) -> i32 {
        match self.document(handle) {
            Some(doc) => {
                *doc.anti_alias_level.lock() = level;
                STATUS_OK
            }
            None => STATUS_NO_DOCUMENT,
        }
    }

    fn rasterize(&self, handle: Handle, request: &RasterRequest) -> Result<RawPixmap, i32> {
        let doc = self.document(handle).ok_or(STATUS_NO_DOCUMENT)?;

        doc.with_doc(|d| render_area(d, request))
            .map_err(|e| {
                tracing::warn!(
                    "MuPDF rasterization of page {} failed: {}",
                    request.page,
                    e
                );
                STATUS_RASTER_FAILED
            })
    }

    fn outline(&self, handle: Handle) -> Vec<OutlineEntry> {
        let Some(doc) = self.document(handle) else {
            return Vec::new();
        };

        match doc.with_doc(|d| d.outlines()) {
            Ok(outlines) => {
                let mut entries = Vec::new();
                flatten_outlines(&outlines, 0, &mut entries);
                entries
            }
            Err(e) => {
                tracing::warn!("MuPDF outline extraction failed: {}", e);
                Vec::new()
            }
        }
    }

    fn version(&self, handle: Handle) -> i32 {
        let Some(doc) = self.document(handle) else {
            return 0;
        };
        if doc.kind != DocumentKind::Primary {
            return 0;
        }

        match doc.with_doc(|d| d.metadata(MetadataName::Format)) {
            Ok(format) => parse_format_version(&format),
            Err(e) => {
                tracing::warn!("MuPDF format lookup failed: {}", e);
                0
            }
        }
    }

    fn page_links(&self, handle: Handle, page: u32) -> Vec<PageLink> {
        let Some(doc) = self.document(handle) else {
            return Vec::new();
        };
        if doc.kind != DocumentKind::Primary || page == 0 || page as i32 > doc.page_count {
            return Vec::new();
        }

        let links = doc.with_doc(|d| {
            let page = d.load_page(page as i32 - 1)?;
            Ok(page.links()?.map(convert_link).collect::<Vec<_>>())
        });
        links.unwrap_or_else(|e| {
            tracing::warn!("MuPDF links of page {} failed: {}", page, e);
            Vec::new()
        })
    }
}

/// `"PDF 1.7"` as `17`; `0` for anything else
fn parse_format_version(format: &str) -> i32 {
    let Some((major, minor)) = format
        .strip_prefix("PDF ")
        .and_then(|v| v.trim().split_once('.'))
    else {
        return 0;
    };
    match (major.parse::<i32>(), minor.parse::<i32>()) {
        (Ok(major), Ok(minor)) if (0..10).contains(&minor) => major * 10 + minor,
        _ => 0,
    }
}

/// True for URIs with a scheme (`https:`, `mailto:`); the rest resolve in-document
fn is_external_uri(uri: &str) -> bool {
    let Some((scheme, _)) = uri.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn convert_link(link: mupdf::Link) -> PageLink {
    let bounds = Rect::new(link.bounds.x0, link.bounds.y0, link.bounds.x1, link.bounds.y1);
    if is_external_uri(&link.uri) {
        PageLink {
            bounds,
            page: None,
            uri: Some(link.uri),
        }
    } else {
        PageLink {
            bounds,
            page: Some(link.page + 1),
            uri: None,
        }
    }
}

/// Draw the page into a pixmap covering exactly `request.area`
fn render_area(doc: &Document, request: &RasterRequest) -> Result<RawPixmap, mupdf::Error> {
    let page = doc.load_page(request.page as i32 - 1)?;

    mupdf::Context::get().set_aa_level(request.anti_alias_level as i32);

    let colorspace = match request.colorspace {
        RasterColorspace::Rgb => Colorspace::device_rgb(),
        RasterColorspace::Gray => Colorspace::device_gray(),
    };
    let area = IRect::new(
        request.area.x0,
        request.area.y0,
        request.area.x1,
        request.area.y1,
    );
    let mut pixmap = Pixmap::new_with_rect(&colorspace, area, request.alpha)?;
    if request.alpha {
        pixmap.clear()?;
    } else {
        pixmap.clear_with(255)?;
    }

    let ctm = Matrix::new(
        request.ctm.a,
        request.ctm.b,
        request.ctm.c,
        request.ctm.d,
        request.ctm.e,
        request.ctm.f,
    );
    {
        let device = Device::from_pixmap(&pixmap)?;
        page.run(&device, &ctm)?;
    }

    Ok(pack_samples(&pixmap))
}

/// Copy pixmap rows into a tightly packed buffer
fn pack_samples(pixmap: &Pixmap) -> RawPixmap {
    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let n = pixmap.n() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;

    let mut packed = Vec::with_capacity(row_bytes * height);
    for y in 0..height {
        let start = y * stride;
        packed.extend_from_slice(&samples[start..start + row_bytes]);
    }

    RawPixmap {
        width: width as u32,
        height: height as u32,
        n: n as u8,
        samples: packed,
    }
}

fn flatten_outlines(outlines: &[mupdf::Outline], depth: u16, entries: &mut Vec<OutlineEntry>) {
    for outline in outlines {
        entries.push(OutlineEntry {
            title: outline.title.clone(),
            page: outline.page.map(|p| p + 1),
            uri: outline.uri.clone(),
            depth,
        });
        flatten_outlines(&outline.down, depth + 1, entries);
    }
}
