//! Rendering parameter types

use serde::{Deserialize, Serialize};

use super::geometry::Rect;

/// Pixel format of a rendered buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// 3 bytes per pixel, opaque on white
    Rgb,
    /// 4 bytes per pixel (stored R, G, B, A), transparent background
    Argb,
    /// 1 byte per pixel
    Gray,
    /// 1 byte per pixel, 0 or 255, plain threshold
    Binary,
    /// 1 byte per pixel, 0 or 255, error-diffused
    BinaryDithered,
}

impl ColorMode {
    pub const ALL: [ColorMode; 5] = [
        ColorMode::Rgb,
        ColorMode::Argb,
        ColorMode::Gray,
        ColorMode::Binary,
        ColorMode::BinaryDithered,
    ];

    /// Map an integer color code (1..=5) to a mode
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ColorMode::Rgb),
            2 => Some(ColorMode::Argb),
            3 => Some(ColorMode::Gray),
            4 => Some(ColorMode::Binary),
            5 => Some(ColorMode::BinaryDithered),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ColorMode::Rgb => 1,
            ColorMode::Argb => 2,
            ColorMode::Gray => 3,
            ColorMode::Binary => 4,
            ColorMode::BinaryDithered => 5,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, ColorMode::Binary | ColorMode::BinaryDithered)
    }

    /// Bytes per pixel in a [`PixelBuffer`](super::PixelBuffer)
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            ColorMode::Rgb => 3,
            ColorMode::Argb => 4,
            ColorMode::Gray | ColorMode::Binary | ColorMode::BinaryDithered => 1,
        }
    }

    /// Whether the engine should rasterize in RGB (otherwise gray)
    pub fn wants_rgb(&self) -> bool {
        matches!(self, ColorMode::Rgb | ColorMode::Argb)
    }

    pub fn wants_alpha(&self) -> bool {
        matches!(self, ColorMode::Argb)
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColorMode::Rgb => "RGB",
            ColorMode::Argb => "ARGB",
            ColorMode::Gray => "GRAY",
            ColorMode::Binary => "BINARY",
            ColorMode::BinaryDithered => "BINARY_DITHERED",
        };
        f.write_str(name)
    }
}

/// Page rotation applied on top of the page transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    Auto,
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Accepts -1 for `Auto` or any multiple of 90 (normalized into 0..360)
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees == -1 {
            return Some(Rotation::Auto);
        }
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// Concrete degrees, resolving `Auto` to the page's own rotation hint
    pub fn resolve(&self, page_rotation: i32) -> i32 {
        match self {
            Rotation::Auto => page_rotation.rem_euclid(360),
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

/// Everything needed to rasterize one page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSpec {
    /// Linear scale (1.0 = 72 DPI)
    pub zoom: f32,
    #[serde(default)]
    pub rotation: Rotation,
    pub color: ColorMode,
    /// Page-unit crop; replaces the page bounds when cropping is requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<Rect>,
    /// Exponent applied to color channels; 1.0 leaves pixels untouched
    #[serde(default = "default_gamma")]
    pub gamma: f32,
}

fn default_gamma() -> f32 {
    1.0
}

impl RenderSpec {
    pub fn new(zoom: f32, rotation: Rotation, color: ColorMode) -> Self {
        Self {
            zoom,
            rotation,
            color,
            crop: None,
            gamma: default_gamma(),
        }
    }

    pub fn with_crop(mut self, crop: Rect) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }
}

impl Default for RenderSpec {
    fn default() -> Self {
        Self::new(1.0, Rotation::Auto, ColorMode::Rgb)
    }
}
