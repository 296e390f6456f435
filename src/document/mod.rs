//! Document sessions
//!
//! A [`DocumentSession`] wraps one native handle from a
//! [`NativeEngine`](crate::engine::NativeEngine) and is the entry point for
//! everything else: page geometry, rendering, tiling and export.
//!
//! # Usage
//!
//! ```rust,ignore
//! use docraster::document::{DocumentSession, OpenOptions};
//! use docraster::engine::MupdfEngine;
//! use docraster::render::ColorMode;
//!
//! let session = DocumentSession::open_path(MupdfEngine::shared(), "book.pdf", &OpenOptions::default())?;
//! session.save_as_png(1, "page-1.png", 2.0, ColorMode::Rgb)?;
//! ```

mod error;
mod outline;
mod session;
mod types;

pub use error::{ExportError, OpenError, RenderError, Result};
pub use outline::{Children, NodeId, Outline, OutlineNode};
pub use session::DocumentSession;
pub use types::{
    DocumentKind, DocumentSource, OpenOptions, PageGeometry, PdfVersion, DEFAULT_MEMORY_BUDGET_MIB,
    MAX_ANTI_ALIAS_LEVEL,
};
