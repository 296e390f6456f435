//! Per-format encoders
//!
//! Everything is encoded into memory and written to disk by the caller;
//! multi-page TIFF appends go through [`tiff::write`] instead.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder, ImageResult};

use crate::render::{ColorMode, PixelBuffer};

use super::ccitt;
use super::exporter::EncodePlan;
use super::format::{ExportFormat, TiffCompression};
use super::tiff::{
    self, TiffImage, PHOTOMETRIC_BLACK_IS_ZERO, PHOTOMETRIC_RGB, PHOTOMETRIC_WHITE_IS_ZERO,
    PHOTOMETRIC_YCBCR,
};

/// Color type the `image` encoders see for a buffer
fn color_type(color: ColorMode) -> ExtendedColorType {
    match color {
        ColorMode::Rgb => ExtendedColorType::Rgb8,
        ColorMode::Argb => ExtendedColorType::Rgba8,
        ColorMode::Gray | ColorMode::Binary | ColorMode::BinaryDithered => ExtendedColorType::L8,
    }
}

/// Encode `buffer` as a complete file image
pub(crate) fn encode(buffer: &PixelBuffer, plan: &EncodePlan) -> ImageResult<Vec<u8>> {
    let (width, height) = (buffer.width(), buffer.height());
    let data = buffer.data();
    let color = color_type(buffer.color());
    let mut output = Vec::new();

    match plan.format {
        ExportFormat::Png => {
            PngEncoder::new(&mut output).write_image(data, width, height, color)?;
        }
        ExportFormat::Jpeg => {
            let quality = plan.quality.unwrap_or(75).max(1);
            JpegEncoder::new_with_quality(&mut output, quality)
                .write_image(data, width, height, color)?;
        }
        ExportFormat::Bmp => {
            BmpEncoder::new(&mut output).write_image(data, width, height, color)?;
        }
        ExportFormat::Pnm => {
            let subtype = match buffer.color() {
                ColorMode::Rgb => PnmSubtype::Pixmap(SampleEncoding::Binary),
                _ => PnmSubtype::Graymap(SampleEncoding::Binary),
            };
            PnmEncoder::new(&mut output)
                .with_subtype(subtype)
                .write_image(data, width, height, color)?;
        }
        ExportFormat::Pam => {
            PnmEncoder::new(&mut output)
                .with_subtype(PnmSubtype::ArbitraryMap)
                .write_image(data, width, height, color)?;
        }
        ExportFormat::Pbm => {
            write!(output, "P4\n{} {}\n", width, height)?;
            output.extend_from_slice(&buffer.packed_bits());
        }
        ExportFormat::Tiff => {
            output = tiff::to_bytes(&tiff_image(buffer, plan)?)?;
        }
    }

    Ok(output)
}

fn deflate(data: &[u8], level: u8) -> ImageResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level as u32));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Build the single strip and tag values for one TIFF page
pub(crate) fn tiff_image(buffer: &PixelBuffer, plan: &EncodePlan) -> ImageResult<TiffImage> {
    let (width, height) = (buffer.width(), buffer.height());
    let dpi = buffer.resolution_dpi();
    let compression = plan.compression;

    // Bilevel pages: 1 bit per sample, 1 = black
    let bilevel = compression.is_ccitt()
        || (buffer.color().is_binary() && compression != TiffCompression::Jpeg);
    if bilevel {
        let bits = buffer.packed_bits();
        let strip = match compression {
            TiffCompression::CcittRle => ccitt::encode_mh(&bits, width, height),
            TiffCompression::CcittT4 => ccitt::encode_t4(&bits, width, height),
            TiffCompression::CcittT6 => ccitt::encode_t6(&bits, width, height),
            TiffCompression::Deflate => deflate(&bits, plan.quality.unwrap_or(6))?,
            TiffCompression::None | TiffCompression::Jpeg => bits,
        };
        return Ok(TiffImage {
            width,
            height,
            bits_per_sample: 1,
            samples_per_pixel: 1,
            photometric: PHOTOMETRIC_WHITE_IS_ZERO,
            compression: compression.code(),
            alpha: false,
            dpi,
            strip,
        });
    }

    let (samples_per_pixel, photometric, alpha) = match buffer.color() {
        ColorMode::Rgb => (3, PHOTOMETRIC_RGB, false),
        ColorMode::Argb => (4, PHOTOMETRIC_RGB, true),
        _ => (1, PHOTOMETRIC_BLACK_IS_ZERO, false),
    };

    if compression == TiffCompression::Jpeg {
        // JPEG has no alpha channel
        let (pixels, color, samples_per_pixel, photometric) = match buffer.color() {
            ColorMode::Argb => (
                buffer.data().chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]).collect(),
                ExtendedColorType::Rgb8,
                3,
                PHOTOMETRIC_YCBCR,
            ),
            ColorMode::Rgb => (buffer.data().to_vec(), ExtendedColorType::Rgb8, 3, PHOTOMETRIC_YCBCR),
            _ => (buffer.data().to_vec(), ExtendedColorType::L8, 1, PHOTOMETRIC_BLACK_IS_ZERO),
        };
        let mut strip = Vec::new();
        JpegEncoder::new_with_quality(&mut strip, plan.quality.unwrap_or(75).max(1))
            .write_image(&pixels, width, height, color)?;
        return Ok(TiffImage {
            width,
            height,
            bits_per_sample: 8,
            samples_per_pixel,
            photometric,
            compression: compression.code(),
            alpha: false,
            dpi,
            strip,
        });
    }

    let strip = match compression {
        TiffCompression::Deflate => deflate(buffer.data(), plan.quality.unwrap_or(6))?,
        _ => buffer.data().to_vec(),
    };
    Ok(TiffImage {
        width,
        height,
        bits_per_sample: 8,
        samples_per_pixel,
        photometric,
        compression: compression.code(),
        alpha,
        dpi,
        strip,
    })
}
