//! Owned pixel buffers and color-mode conversion

use crate::engine::RawPixmap;

use super::types::ColorMode;

/// Gray values below this become black
const BINARY_THRESHOLD: u8 = 128;

/// Rendered pixels in one of the [`ColorMode`] layouts
///
/// | mode | bytes per pixel | layout |
/// |---|---|---|
/// | `Rgb` | 3 | R, G, B |
/// | `Argb` | 4 | R, G, B, A (straight alpha) |
/// | `Gray` | 1 | luminance |
/// | `Binary`, `BinaryDithered` | 1 | 0 = black, 255 = white |
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    color: ColorMode,
    resolution_dpi: f32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap already converted pixels; `None` when the length does not match
    pub fn new(width: u32, height: u32, color: ColorMode, data: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * color.bytes_per_pixel();
        if data.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            color,
            resolution_dpi: 72.0,
            data,
        })
    }

    /// Convert engine output into `color`, applying `gamma` when it is not 1
    pub(crate) fn from_raw(raw: RawPixmap, color: ColorMode, gamma: f32) -> Option<Self> {
        if !raw.is_consistent() {
            return None;
        }
        let RawPixmap {
            width,
            height,
            n,
            mut samples,
        } = raw;
        let n = n as usize;
        let has_alpha = n == 2 || n == 4;

        if has_alpha {
            unpremultiply(&mut samples, n);
        }
        if gamma > 0.0 && gamma != 1.0 {
            apply_gamma(&mut samples, n, has_alpha, gamma);
        }

        let pixels = width as usize * height as usize;
        let data = match color {
            ColorMode::Rgb => (0..pixels)
                .flat_map(|i| {
                    let (r, g, b, _) = rgba_at(&samples, n, i);
                    [r, g, b]
                })
                .collect(),
            ColorMode::Argb => (0..pixels)
                .flat_map(|i| {
                    let (r, g, b, a) = rgba_at(&samples, n, i);
                    [r, g, b, a]
                })
                .collect(),
            ColorMode::Gray => (0..pixels).map(|i| luma_at(&samples, n, i)).collect(),
            ColorMode::Binary | ColorMode::BinaryDithered => {
                let gray: Vec<u8> = (0..pixels).map(|i| luma_at(&samples, n, i)).collect();
                to_black_white(
                    gray,
                    width as usize,
                    height as usize,
                    color == ColorMode::BinaryDithered,
                )
            }
        };

        PixelBuffer::new(width, height, color, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color(&self) -> ColorMode {
        self.color
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Dots per inch the buffer was rendered at
    pub fn resolution_dpi(&self) -> f32 {
        self.resolution_dpi
    }

    pub fn with_resolution(mut self, dpi: f32) -> Self {
        self.resolution_dpi = dpi;
        self
    }

    /// Size of the pixel data in bytes
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Luminance per pixel, regardless of mode
    pub fn to_gray(&self) -> Vec<u8> {
        let n = self.color.bytes_per_pixel();
        let pixels = self.width as usize * self.height as usize;
        match self.color {
            ColorMode::Gray | ColorMode::Binary | ColorMode::BinaryDithered => self.data.clone(),
            ColorMode::Rgb | ColorMode::Argb => {
                (0..pixels).map(|i| luma_at(&self.data, n, i)).collect()
            }
        }
    }

    /// Black/white values (0 or 255) per pixel; non-binary buffers are dithered
    pub fn to_black_white(&self) -> Vec<u8> {
        if self.color.is_binary() {
            return self.data.clone();
        }
        to_black_white(
            self.to_gray(),
            self.width as usize,
            self.height as usize,
            true,
        )
    }

    /// One bit per pixel, 1 = black, MSB first, rows padded to whole bytes
    pub fn packed_bits(&self) -> Vec<u8> {
        pack_bits(&self.to_black_white(), self.width as usize, self.height as usize)
    }

    /// Bytes of one packed-bit row
    pub fn packed_row_bytes(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }
}

fn rgba_at(samples: &[u8], n: usize, i: usize) -> (u8, u8, u8, u8) {
    let px = &samples[i * n..i * n + n];
    match n {
        1 => (px[0], px[0], px[0], 255),
        2 => (px[0], px[0], px[0], px[1]),
        3 => (px[0], px[1], px[2], 255),
        _ => (px[0], px[1], px[2], px[3]),
    }
}

fn luma_at(samples: &[u8], n: usize, i: usize) -> u8 {
    let px = &samples[i * n..i * n + n];
    if n < 3 {
        return px[0];
    }
    let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
    ((r * 77 + g * 150 + b * 29 + 128) >> 8) as u8
}

fn unpremultiply(samples: &mut [u8], n: usize) {
    for px in samples.chunks_exact_mut(n) {
        let a = px[n - 1] as u32;
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..n - 1] {
            *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

fn apply_gamma(samples: &mut [u8], n: usize, has_alpha: bool, gamma: f32) {
    let table: Vec<u8> = (0..=255u16)
        .map(|v| ((v as f32 / 255.0).powf(gamma) * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect();
    let colors = if has_alpha { n - 1 } else { n };
    for px in samples.chunks_exact_mut(n) {
        for c in &mut px[..colors] {
            *c = table[*c as usize];
        }
    }
}

/// Threshold gray to 0/255, optionally spreading the quantization error
/// Floyd-Steinberg style over interior pixels.
fn to_black_white(mut gray: Vec<u8>, width: usize, height: usize, dither: bool) -> Vec<u8> {
    let mut out = vec![0u8; gray.len()];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let value = gray[idx];
            out[idx] = if value < BINARY_THRESHOLD { 0 } else { 255 };

            if dither && x > 0 && y > 0 && x + 1 < width && y + 1 < height {
                let qerror = if value < BINARY_THRESHOLD {
                    value as f32
                } else {
                    value as f32 - 255.0
                };
                let below = idx + width;
                diffuse(&mut gray[idx + 1], qerror * 0.4375);
                diffuse(&mut gray[below - 1], qerror * 0.1875);
                diffuse(&mut gray[below], qerror * 0.3125);
                diffuse(&mut gray[below + 1], qerror * 0.0625);
            }
        }
    }

    out
}

fn diffuse(target: &mut u8, error: f32) {
    *target = (*target as f32 + error).round().clamp(0.0, 255.0) as u8;
}

fn pack_bits(values: &[u8], width: usize, height: usize) -> Vec<u8> {
    let row_bytes = width.div_ceil(8);
    let mut out = vec![0u8; row_bytes * height];
    for y in 0..height {
        for x in 0..width {
            if values[y * width + x] < BINARY_THRESHOLD {
                out[y * row_bytes + x / 8] |= 0x80 >> (x % 8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(width: u32, height: u32, n: u8, samples: Vec<u8>) -> RawPixmap {
        RawPixmap {
            width,
            height,
            n,
            samples,
        }
    }

    #[test]
    fn test_rgb_from_rgba_drops_alpha() {
        let pixmap = raw(1, 1, 4, vec![10, 20, 30, 255]);
        let buf = PixelBuffer::from_raw(pixmap, ColorMode::Rgb, 1.0).unwrap();
        assert_eq!(buf.data(), &[10, 20, 30]);
    }

    #[test]
    fn test_argb_is_unpremultiplied() {
        let pixmap = raw(1, 1, 4, vec![64, 0, 128, 128]);
        let buf = PixelBuffer::from_raw(pixmap, ColorMode::Argb, 1.0).unwrap();
        assert_eq!(buf.data(), &[128, 0, 255, 128]);
    }

    #[test]
    fn test_binary_threshold() {
        let pixmap = raw(4, 1, 1, vec![0, 127, 128, 255]);
        let buf = PixelBuffer::from_raw(pixmap, ColorMode::Binary, 1.0).unwrap();
        assert_eq!(buf.data(), &[0, 0, 255, 255]);
    }

    #[test]
    fn test_dither_spreads_error_inside() {
        // Uniform mid gray: a plain threshold gives all white, dithering mixes
        let gray = vec![140u8; 5 * 5];
        let plain = to_black_white(gray.clone(), 5, 5, false);
        let dithered = to_black_white(gray, 5, 5, true);
        assert!(plain.iter().all(|v| *v == 255));
        assert!(dithered.iter().any(|v| *v == 0));
        assert!(dithered.iter().all(|v| *v == 0 || *v == 255));
    }

    #[test]
    fn test_dither_leaves_border_alone() {
        // A 2x2 image has no interior pixels, so nothing is diffused
        let gray = vec![140u8; 4];
        assert_eq!(to_black_white(gray, 2, 2, true), vec![255; 4]);
    }

    #[test]
    fn test_gamma_darkens_midtones() {
        let pixmap = raw(1, 1, 1, vec![128]);
        let buf = PixelBuffer::from_raw(pixmap, ColorMode::Gray, 2.0).unwrap();
        assert_eq!(buf.data(), &[64]);
    }

    #[test]
    fn test_packed_bits_pad_rows() {
        let buf = PixelBuffer::new(10, 2, ColorMode::Binary, {
            let mut v = vec![255u8; 20];
            v[0] = 0;
            v[9] = 0;
            v[19] = 0;
            v
        })
        .unwrap();
        assert_eq!(buf.packed_row_bytes(), 2);
        assert_eq!(buf.packed_bits(), vec![0x80, 0x40, 0x00, 0x40]);
    }

    #[test]
    fn test_rejects_inconsistent_sizes() {
        assert!(PixelBuffer::new(2, 2, ColorMode::Rgb, vec![0; 11]).is_none());
        assert!(PixelBuffer::from_raw(raw(2, 2, 3, vec![0; 5]), ColorMode::Rgb, 1.0).is_none());
    }
}
