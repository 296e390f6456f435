//! Output formats and TIFF options

use serde::{Deserialize, Serialize};

use crate::document::ExportError;
use crate::render::ColorMode;

/// Raster file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pbm,
    Pnm,
    Jpeg,
    Bmp,
    Png,
    Pam,
    Tiff,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 7] = [
        ExportFormat::Pbm,
        ExportFormat::Pnm,
        ExportFormat::Jpeg,
        ExportFormat::Bmp,
        ExportFormat::Png,
        ExportFormat::Pam,
        ExportFormat::Tiff,
    ];

    /// Detect format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pbm" => Some(Self::Pbm),
            "pnm" | "ppm" | "pgm" => Some(Self::Pnm),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "bmp" => Some(Self::Bmp),
            "png" => Some(Self::Png),
            "pam" => Some(Self::Pam),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pbm => "pbm",
            ExportFormat::Pnm => "pnm",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Bmp => "bmp",
            ExportFormat::Png => "png",
            ExportFormat::Pam => "pam",
            ExportFormat::Tiff => "tif",
        }
    }

    /// Whether buffers in `color` may be written in this format
    ///
    /// PBM accepts anything: it always halftones to monochrome.
    pub fn accepts(&self, color: ColorMode) -> bool {
        use ColorMode::*;
        match self {
            ExportFormat::Pbm | ExportFormat::Tiff => true,
            ExportFormat::Pnm | ExportFormat::Jpeg => matches!(color, Rgb | Gray),
            ExportFormat::Bmp => matches!(color, Rgb | Gray | Binary | BinaryDithered),
            ExportFormat::Png | ExportFormat::Pam => matches!(color, Rgb | Argb | Gray),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExportFormat::Pbm => "PBM",
            ExportFormat::Pnm => "PNM",
            ExportFormat::Jpeg => "JPEG",
            ExportFormat::Bmp => "BMP",
            ExportFormat::Png => "PNG",
            ExportFormat::Pam => "PAM",
            ExportFormat::Tiff => "TIFF",
        };
        f.write_str(name)
    }
}

/// TIFF compression scheme; codes match the TIFF `Compression` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiffCompression {
    #[default]
    None,
    CcittRle,
    CcittT4,
    CcittT6,
    Jpeg,
    /// zlib/deflate (Adobe code 8)
    Deflate,
}

impl TiffCompression {
    pub fn from_code(code: i32) -> Result<Self, ExportError> {
        match code {
            1 => Ok(TiffCompression::None),
            2 => Ok(TiffCompression::CcittRle),
            3 => Ok(TiffCompression::CcittT4),
            4 => Ok(TiffCompression::CcittT6),
            7 => Ok(TiffCompression::Jpeg),
            8 => Ok(TiffCompression::Deflate),
            other => Err(ExportError::InvalidCompression(other)),
        }
    }

    /// Value written to the `Compression` tag
    pub fn code(&self) -> u16 {
        match self {
            TiffCompression::None => 1,
            TiffCompression::CcittRle => 2,
            TiffCompression::CcittT4 => 3,
            TiffCompression::CcittT6 => 4,
            TiffCompression::Jpeg => 7,
            TiffCompression::Deflate => 8,
        }
    }

    pub fn is_ccitt(&self) -> bool {
        matches!(
            self,
            TiffCompression::CcittRle | TiffCompression::CcittT4 | TiffCompression::CcittT6
        )
    }
}

impl std::fmt::Display for TiffCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TiffCompression::None => "NONE",
            TiffCompression::CcittRle => "CCITT_RLE",
            TiffCompression::CcittT4 => "CCITT_T4",
            TiffCompression::CcittT6 => "CCITT_T6",
            TiffCompression::Jpeg => "JPEG",
            TiffCompression::Deflate => "ZLIB",
        };
        f.write_str(name)
    }
}

/// What to do with an existing file at the TIFF target path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiffWriteMode {
    /// Add a page after the existing ones
    Append,
    /// Replace the file
    #[default]
    Discard,
}

impl TiffWriteMode {
    pub fn from_code(code: i32) -> Result<Self, ExportError> {
        match code {
            0 => Ok(TiffWriteMode::Append),
            1 => Ok(TiffWriteMode::Discard),
            other => Err(ExportError::InvalidMode(other)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            TiffWriteMode::Append => 0,
            TiffWriteMode::Discard => 1,
        }
    }
}
