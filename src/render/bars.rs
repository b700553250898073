use image::{Rgba, RgbaImage};

use crate::error::{Result, WaveError};

/// Horizontal gap on each side of a bar, relative to the bar's drawn width.
pub const PAD_RATIO: f64 = 0.1;
/// Lower (reflected) bar height relative to the upper one.
pub const LOWER_SCALE: f64 = 0.9;
/// Opacity multiplier for the lower bar, 204/255.
pub const LOWER_OPACITY: f64 = 0.8;

/// Mirrored vertical bars on a flat background.
#[derive(Clone, Debug)]
pub struct BarRenderer {
    width: u32,
    height: u32,
    foreground: Rgba<u8>,
    background: Rgba<u8>,
    pad_ratio: f64,
    lower_scale: f64,
    lower_opacity: f64,
}

impl BarRenderer {
    pub fn new(width: u32, height: u32, foreground: Rgba<u8>, background: Rgba<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(WaveError::input(format!(
                "frame size must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            foreground,
            background,
            pad_ratio: PAD_RATIO,
            lower_scale: LOWER_SCALE,
            lower_opacity: LOWER_OPACITY,
        })
    }

    pub fn with_lower_bar(mut self, scale: f64, opacity: f64) -> Self {
        self.lower_scale = scale;
        self.lower_opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Rasterize one frame. Non-positive heights draw nothing.
    pub fn render(&self, bars: &[f64]) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(self.width, self.height, self.background);
        if bars.is_empty() {
            return img;
        }

        let bar_width = self.width as f64 / bars.len() as f64;
        let actual_width = bar_width / (1.0 + 2.0 * self.pad_ratio);
        let pad = self.pad_ratio * actual_width;
        let bar_w = actual_width as i64;
        let height = self.height as f64;
        let mid = (self.height / 2) as i64;

        let upper = self.foreground;
        let mut lower = self.foreground;
        lower[3] = (self.foreground[3] as f64 * self.lower_opacity).round() as u8;

        for (i, &e) in bars.iter().enumerate() {
            let half = 0.5 * e;
            let x = (pad + i as f64 * bar_width) as i64;

            let top = mid - (half * height / 2.0) as i64;
            fill_rect(&mut img, x, top, x + bar_w, mid, upper);

            let bottom = mid + (self.lower_scale * half * height / 2.0) as i64;
            fill_rect(&mut img, x, mid, x + bar_w, bottom, lower);
        }

        img
    }
}

/// Blend `color` over `[x0, x1) x [y0, y1)`, clipped to the image.
fn fill_rect(img: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (x0, x1) = (x0.max(0), x1.min(w));
    let (y0, y1) = (y0.max(0), y1.min(h));
    if x0 >= x1 || y0 >= y1 || color[3] == 0 {
        return;
    }

    for y in y0..y1 {
        for x in x0..x1 {
            let dst = img.get_pixel_mut(x as u32, y as u32);
            *dst = blend(color, *dst);
        }
    }
}

fn blend(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 255 {
        return src;
    }
    let a = src[3] as f64 / 255.0;
    let inv_a = 1.0 - a;
    let mix = |s: u8, d: u8| (s as f64 * a + d as f64 * inv_a).round() as u8;
    let out_a = a + dst[3] as f64 / 255.0 * inv_a;
    Rgba([
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}
