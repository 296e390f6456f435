//! docraster Library
//!
//! Renders pages of PDF/XPS documents to pixel buffers at any zoom and
//! rotation, tiles large pages, and writes raster files.
//!
//! # Modules
//!
//! - `engine`: native rasterization boundary (MuPDF, test double)
//! - `document`: sessions over one native handle, errors
//! - `render`: geometry, page renderer, tiling
//! - `export`: PBM, PNM, JPEG, BMP, PNG, PAM and TIFF writers
//! - `config`: environment configuration

pub mod config;
pub mod document;
pub mod engine;
pub mod export;
pub mod render;

pub use document::{DocumentSession, OpenOptions};
pub use render::{ColorMode, PixelBuffer, RenderSpec, Rotation};
