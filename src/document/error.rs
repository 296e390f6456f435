//! Document error types
//!
//! Open, render and export failures are kept apart because callers branch
//! on them differently: an open failure may be retried with credentials,
//! a render failure is per page, and an export failure is per file.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::{
    Handle, OPEN_BAD_PASSWORD, OPEN_FAILED, OPEN_NEEDS_PASSWORD, STATUS_NO_DOCUMENT,
    STATUS_RASTER_FAILED, STATUS_WRITE_FAILED,
};
use crate::export::{ExportFormat, TiffCompression};
use crate::render::ColorMode;

/// Failure to open a document session
#[derive(Debug, Error)]
pub enum OpenError {
    /// Source path does not exist (checked before any native call)
    #[error("Document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Corrupt or unsupported document
    #[error("Native open failed with code {code}")]
    NativeOpenFailed { code: i64 },

    /// The document needs a password
    #[error("Document requires authentication (code {code})")]
    SecurityRequired { code: i64 },

    /// The supplied password was rejected
    #[error("Incorrect password (code {code})")]
    BadCredentials { code: i64 },

    /// Handle value outside the documented codes
    #[error("Unexpected native handle value: {0}")]
    Unexpected(i64),

    /// Failed to materialize a byte payload
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OpenError {
    /// Classify a non-positive handle returned by the engine
    pub fn from_handle(handle: Handle) -> Self {
        match handle {
            code if OPEN_FAILED.contains(&code) => OpenError::NativeOpenFailed { code },
            OPEN_NEEDS_PASSWORD => OpenError::SecurityRequired { code: handle },
            OPEN_BAD_PASSWORD => OpenError::BadCredentials { code: handle },
            other => OpenError::Unexpected(other),
        }
    }

    /// Security failures are remedied by supplying credentials
    pub fn is_security(&self) -> bool {
        matches!(
            self,
            OpenError::SecurityRequired { .. } | OpenError::BadCredentials { .. }
        )
    }
}

/// Failure to rasterize a page or tile
#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("Document session is closed")]
    Closed,

    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: u32 },

    #[error("Invalid zoom factor: {0}")]
    InvalidZoom(f32),

    #[error("Tile dimensions must be positive")]
    InvalidTileSize,

    /// Crop and page bounds do not overlap
    #[error("Render area is empty")]
    EmptyArea,

    #[error("Native rasterization failed with code {code}")]
    Native { code: i32 },
}

impl RenderError {
    /// Status code reported when a render failure aborts an export
    pub fn status_code(&self) -> i32 {
        match self {
            RenderError::Closed => STATUS_NO_DOCUMENT,
            RenderError::Native { code } => *code,
            _ => STATUS_RASTER_FAILED,
        }
    }
}

/// Failure to write a raster file
#[derive(Debug, Error, PartialEq)]
pub enum ExportError {
    /// `color` is the integer color code, which may name no mode at all
    #[error("{format} does not accept color code {color}")]
    InvalidColorMode { format: ExportFormat, color: i32 },

    #[error("Invalid TIFF write mode: {0}")]
    InvalidMode(i32),

    #[error("Invalid TIFF compression: {0}")]
    InvalidCompression(i32),

    #[error("TIFF compression {compression} does not accept color mode {color}")]
    InvalidCompressionForColorMode {
        compression: TiffCompression,
        color: ColorMode,
    },

    #[error("Encoding failed with code {code}")]
    EncodeFailed { code: i32 },
}

impl ExportError {
    pub(crate) fn write_failed() -> Self {
        ExportError::EncodeFailed {
            code: STATUS_WRITE_FAILED,
        }
    }
}

impl From<RenderError> for ExportError {
    fn from(err: RenderError) -> Self {
        ExportError::EncodeFailed {
            code: err.status_code(),
        }
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, OpenError>;
