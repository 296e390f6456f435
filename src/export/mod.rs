//! Raster file export
//!
//! [`RasterExporter`] validates a [`PixelBuffer`](crate::render::PixelBuffer)
//! against the target format and writes it:
//!
//! | format | color modes | options |
//! |---|---|---|
//! | PBM | any (halftoned to 1 bit) | |
//! | PNM | RGB, GRAY | |
//! | JPEG | RGB, GRAY | quality |
//! | BMP | RGB, GRAY, BINARY, BINARY_DITHERED | |
//! | PNG | RGB, ARGB, GRAY | |
//! | PAM | RGB, ARGB, GRAY | |
//! | TIFF | all (CCITT: binary only) | compression, write mode, quality |

mod ccitt;
mod encode;
mod exporter;
mod format;
mod tiff;

pub use exporter::{EncodePlan, RasterExporter};
pub use format::{ExportFormat, TiffCompression, TiffWriteMode};
pub use tiff::page_count as tiff_page_count;
