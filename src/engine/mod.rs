//! Native rasterization engine boundary
//!
//! Everything that actually parses a document and produces pixels lives
//! behind [`NativeEngine`]. The contract is handle based: opening returns an
//! opaque integer, positive when the document is live and a non-positive
//! status code otherwise. Sessions never hold engine objects directly.
//!
//! # Implementations
//!
//! - [`MupdfEngine`] (feature `mupdf`): MuPDF through the `mupdf` crate
//! - [`RecordingEngine`] (feature `test-utils`): deterministic fake that
//!   counts every call, used by the test suite
//!
//! # Thread Safety
//!
//! Engines are shared as `Arc<dyn NativeEngine>`. Implementations must
//! serialize work per handle; different handles may be driven from
//! different threads at the same time.

#[cfg(feature = "mupdf")]
mod mupdf;
#[cfg(any(test, feature = "test-utils"))]
mod recording;

#[cfg(feature = "mupdf")]
pub use self::mupdf::MupdfEngine;
#[cfg(any(test, feature = "test-utils"))]
pub use recording::{CallCounts, RecordingEngine};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::render::{IRect, Matrix, Rect};

/// Opaque native document handle; `> 0` is a live document
pub type Handle = i64;

/// Generic open failures (corrupt or unsupported document)
pub const OPEN_FAILED: [Handle; 3] = [-1, -2, -3];
/// The document is encrypted and no password was supplied
pub const OPEN_NEEDS_PASSWORD: Handle = -4;
/// The supplied password was rejected
pub const OPEN_BAD_PASSWORD: Handle = -5;

/// Raster/write status: success
pub const STATUS_OK: i32 = 0;
/// Raster/write status: the handle does not name an open document
pub const STATUS_NO_DOCUMENT: i32 = -1;
/// Raster/write status: the page could not be rasterized
pub const STATUS_RASTER_FAILED: i32 = -2;
/// Raster/write status: the output could not be written
pub const STATUS_WRITE_FAILED: i32 = -3;

/// Raster colorspace requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterColorspace {
    Rgb,
    Gray,
}

/// One rasterization call: fill `area` with the page drawn through `ctm`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterRequest {
    /// Page number (1-indexed)
    pub page: u32,
    pub ctm: Matrix,
    /// Device pixel rectangle to produce
    pub area: IRect,
    pub colorspace: RasterColorspace,
    /// Transparent background (otherwise cleared to white)
    pub alpha: bool,
    pub anti_alias_level: u8,
}

/// Pixels produced by the engine
///
/// Rows are tightly packed, `n` components per pixel including alpha.
/// When alpha is present the color components are premultiplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPixmap {
    pub width: u32,
    pub height: u32,
    pub n: u8,
    pub samples: Vec<u8>,
}

impl RawPixmap {
    pub fn has_alpha(&self) -> bool {
        self.n == 2 || self.n == 4
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.samples.len() == self.width as usize * self.height as usize * self.n as usize
    }
}

/// Page description reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Page bounds in page units
    pub bounds: Rect,
    /// Rotation the page asks for (degrees)
    pub rotation: i32,
}

/// Flattened outline entry in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    /// Target page (1-indexed)
    pub page: Option<u32>,
    pub uri: Option<String>,
    /// Nesting depth, 0 for top level
    pub depth: u16,
}

/// Hyperlink area on a page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLink {
    /// Hot area in page units
    pub bounds: Rect,
    /// Internal target page (1-indexed)
    pub page: Option<u32>,
    /// External target
    pub uri: Option<String>,
}

/// Handle-based native rendering capability
pub trait NativeEngine: Send + Sync {
    /// Open a primary-format (PDF) document; `memory_budget` is in bytes
    fn open_primary(&self, path: &Path, password: Option<&str>, memory_budget: usize) -> Handle;

    /// Open a secondary-format (XPS) document; `memory_budget` is in bytes
    fn open_secondary(&self, path: &Path, memory_budget: usize) -> Handle;

    /// Release a handle; unknown handles are ignored
    fn close(&self, handle: Handle);

    fn page_count(&self, handle: Handle) -> i32;

    /// Geometry of a page (1-indexed)
    fn page_info(&self, handle: Handle, page: u32) -> Option<PageInfo>;

    fn anti_alias_level(&self, handle: Handle) -> i32;

    /// Returns a status code
    fn set_anti_alias_level(&self, handle: Handle, level: u8) -> i32;

    /// Rasterize; the error value is a status code
    fn rasterize(&self, handle: Handle, request: &RasterRequest) -> Result<RawPixmap, i32>;

    fn outline(&self, handle: Handle) -> Vec<OutlineEntry>;

    /// Format version as `major * 10 + minor`; `0` when unknown
    fn version(&self, handle: Handle) -> i32;

    /// Links on a page (1-indexed), in page order
    fn page_links(&self, handle: Handle, page: u32) -> Vec<PageLink>;
}
