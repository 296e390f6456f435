//! Parameter validation and dispatch for raster export
//!
//! Validation has two tiers:
//!
//! - color mode, write mode and compression/color mismatches are hard
//!   rejections, reported before anything is encoded
//! - out-of-range quality values are silently replaced by the format's
//!   default
//!
//! | format | quality range | default |
//! |---|---|---|
//! | JPEG file | 0..=100 | 75 |
//! | TIFF, JPEG compression | 1..=100 | 75 |
//! | TIFF, DEFLATE compression | 1..=9 | 6 |

use std::path::Path;

use serde::Serialize;

use crate::document::ExportError;
use crate::render::{ColorMode, PixelBuffer};

use super::encode;
use super::format::{ExportFormat, TiffCompression, TiffWriteMode};
use super::tiff;

const JPEG_DEFAULT_QUALITY: u8 = 75;
const DEFLATE_DEFAULT_LEVEL: u8 = 6;

/// Fully validated export parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodePlan {
    pub format: ExportFormat,
    pub color: ColorMode,
    pub compression: TiffCompression,
    pub mode: TiffWriteMode,
    /// Effective quality or deflate level; `None` when the format has none
    pub quality: Option<u8>,
}

/// Writes [`PixelBuffer`]s in one format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterExporter {
    format: ExportFormat,
    compression: TiffCompression,
    mode: TiffWriteMode,
    quality: Option<i32>,
}

impl RasterExporter {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            compression: TiffCompression::None,
            mode: TiffWriteMode::Discard,
            quality: None,
        }
    }

    /// TIFF exporter from raw integer codes
    ///
    /// Checks run in a fixed order: color code, write mode, compression.
    pub fn tiff_from_codes(
        color: i32,
        compression: i32,
        mode: i32,
        quality: i32,
    ) -> Result<(Self, ColorMode), ExportError> {
        let color = ColorMode::from_code(color).ok_or(ExportError::InvalidColorMode {
            format: ExportFormat::Tiff,
            color,
        })?;
        let mode = TiffWriteMode::from_code(mode)?;
        let compression = TiffCompression::from_code(compression)?;
        let exporter = RasterExporter::new(ExportFormat::Tiff)
            .compression(compression)
            .mode(mode)
            .quality(quality);
        exporter.resolve(color)?;
        Ok((exporter, color))
    }

    /// TIFF only
    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = compression;
        self
    }

    /// TIFF only
    pub fn mode(mut self, mode: TiffWriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// JPEG quality or TIFF JPEG/DEFLATE level; clamped on resolve
    pub fn quality(mut self, quality: i32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Validate against `color` and apply defaults, without any I/O
    pub fn resolve(&self, color: ColorMode) -> Result<EncodePlan, ExportError> {
        if !self.format.accepts(color) {
            return Err(ExportError::InvalidColorMode {
                format: self.format,
                color: color.code(),
            });
        }

        let (compression, mode) = if self.format == ExportFormat::Tiff {
            if self.compression.is_ccitt() && !color.is_binary() {
                return Err(ExportError::InvalidCompressionForColorMode {
                    compression: self.compression,
                    color,
                });
            }
            (self.compression, self.mode)
        } else {
            (TiffCompression::None, TiffWriteMode::Discard)
        };

        let quality = match (self.format, compression) {
            (ExportFormat::Jpeg, _) => Some(clamp_or(self.quality, 0, 100, JPEG_DEFAULT_QUALITY)),
            (ExportFormat::Tiff, TiffCompression::Jpeg) => {
                Some(clamp_or(self.quality, 1, 100, JPEG_DEFAULT_QUALITY))
            }
            (ExportFormat::Tiff, TiffCompression::Deflate) => {
                Some(clamp_or(self.quality, 1, 9, DEFLATE_DEFAULT_LEVEL))
            }
            _ => None,
        };

        Ok(EncodePlan {
            format: self.format,
            color,
            compression,
            mode,
            quality,
        })
    }

    /// Encode into memory; TIFF produces a single-page file
    pub fn encode(&self, buffer: &PixelBuffer) -> Result<Vec<u8>, ExportError> {
        let plan = self.resolve(buffer.color())?;
        encode::encode(buffer, &plan).map_err(|e| {
            tracing::warn!("{} encoding failed: {}", plan.format, e);
            ExportError::write_failed()
        })
    }

    /// Validate, encode and write `buffer` to `path`
    pub fn save(&self, buffer: &PixelBuffer, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let path = path.as_ref();
        let plan = self.resolve(buffer.color())?;

        let result = match plan.format {
            ExportFormat::Tiff => encode::tiff_image(buffer, &plan)
                .map_err(|e| e.to_string())
                .and_then(|image| tiff::write(path, &image, plan.mode).map_err(|e| e.to_string())),
            _ => encode::encode(buffer, &plan)
                .map_err(|e| e.to_string())
                .and_then(|bytes| std::fs::write(path, bytes).map_err(|e| e.to_string())),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    "Wrote {} ({}x{} {}) to {}",
                    plan.format,
                    buffer.width(),
                    buffer.height(),
                    plan.color,
                    path.display()
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to write {}: {}", path.display(), e);
                Err(ExportError::write_failed())
            }
        }
    }
}

/// `value` when inside `min..=max`, otherwise `default`
fn clamp_or(value: Option<i32>, min: i32, max: i32, default: u8) -> u8 {
    match value {
        Some(v) if (min..=max).contains(&v) => v as u8,
        _ => default,
    }
}
