//! Image primitives and utilities.
//!
//! Captures travel through the pipeline as `image::RgbImage`; matching and OCR
//! work on `image::GrayImage`. Resizing goes through `fast_image_resize`
//! (SIMD-optimized), which is noticeably faster than `image::imageops` for the
//! many template rescales of a scale sweep.

use anyhow::{ensure, Context, Result};
use fast_image_resize::{images, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{GrayImage, Luma, RgbImage};

/// Interpolation used when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Pixel-area averaging; good for shrinking templates.
    Area,
    /// Keeps hard edges; used for binary masks.
    Nearest,
    Bilinear,
    /// Smooth cubic upscaling for OCR crops.
    CatmullRom,
}

impl Filter {
    fn alg(self) -> ResizeAlg {
        match self {
            Filter::Area => ResizeAlg::Convolution(FilterType::Box),
            Filter::Nearest => ResizeAlg::Nearest,
            Filter::Bilinear => ResizeAlg::Convolution(FilterType::Bilinear),
            Filter::CatmullRom => ResizeAlg::Convolution(FilterType::CatmullRom),
        }
    }
}

fn resize_raw(
    width: u32,
    height: u32,
    bytes: &[u8],
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
    filter: Filter,
) -> Result<Vec<u8>> {
    ensure!(width > 0 && height > 0, "cannot resize an empty image");
    ensure!(
        dst_width > 0 && dst_height > 0,
        "cannot resize to an empty image ({dst_width}x{dst_height})"
    );

    let src = images::ImageRef::new(width, height, bytes, pixel_type)
        .context("fast_image_resize: ImageRef::new failed")?;
    let mut dst = images::Image::new(dst_width, dst_height, pixel_type);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(filter.alg());
    resizer
        .resize(&src, &mut dst, &options)
        .context("fast_image_resize: resize failed")?;

    Ok(dst.into_vec())
}

pub fn resize_gray(image: &GrayImage, width: u32, height: u32, filter: Filter) -> Result<GrayImage> {
    let bytes = resize_raw(
        image.width(),
        image.height(),
        image.as_raw(),
        PixelType::U8,
        width,
        height,
        filter,
    )?;
    GrayImage::from_raw(width, height, bytes).context("GrayImage::from_raw failed")
}

pub fn resize_rgb(image: &RgbImage, width: u32, height: u32, filter: Filter) -> Result<RgbImage> {
    let bytes = resize_raw(
        image.width(),
        image.height(),
        image.as_raw(),
        PixelType::U8x3,
        width,
        height,
        filter,
    )?;
    RgbImage::from_raw(width, height, bytes).context("RgbImage::from_raw failed")
}

/// Size of `(width, height)` multiplied by `factor`, rounded, never below 1.
#[inline]
pub fn scaled_size(width: u32, height: u32, factor: f32) -> (u32, u32) {
    let w = (width as f32 * factor).round().max(1.0) as u32;
    let h = (height as f32 * factor).round().max(1.0) as u32;
    (w, h)
}

/// Build an `RgbImage` from tightly packed RGBA bytes (alpha is discarded).
pub fn rgb_from_rgba(width: u32, height: u32, bytes: &[u8]) -> Option<RgbImage> {
    if bytes.len() != (width as usize) * (height as usize) * 4 {
        return None;
    }
    let data = bytes
        .chunks_exact(4)
        .flat_map(|v| [v[0], v[1], v[2]])
        .collect::<Vec<_>>();
    RgbImage::from_raw(width, height, data)
}

/// Convert to grayscale (luma).
pub fn to_gray(image: &RgbImage) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    for (x, y, p) in image.enumerate_pixels() {
        let [r, g, b] = p.0;
        out.put_pixel(x, y, Luma([Color::new(r, g, b).luma()]));
    }
    out
}

/// Crop a rectangle, clamped to the image bounds. Returns `None` when nothing is left.
pub fn crop(image: &RgbImage, rect: Rect) -> Option<RgbImage> {
    let rect = rect.clamped(image.width(), image.height())?;
    Some(image::imageops::crop_imm(image, rect.x, rect.y, rect.w, rect.h).to_image())
}

// ----------

/// Axis-aligned rectangle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    /// Translate by a parent rectangle's origin.
    pub fn offset(&self, dx: u32, dy: u32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Intersect with a `width x height` image. Returns `None` if the result is empty.
    pub fn clamped(&self, width: u32, height: u32) -> Option<Self> {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let w = self.w.min(width - x);
        let h = self.h.min(height - y);
        (w > 0 && h > 0).then_some(Self::new(x, y, w, h))
    }
}

// ----------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Compute luma (grayscale intensity).
    pub fn luma(&self) -> u8 {
        let r = self.r as u32;
        let g = self.g as u32;
        let b = self.b as u32;
        ((299 * r + 587 * g + 114 * b) / 1000) as u8
    }

    /// HSV saturation and value, both on a 0..=255 scale.
    pub fn saturation_value(&self) -> (u8, u8) {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        if max == 0 {
            return (0, 0);
        }
        let s = ((max - min) as u32 * 255 + max as u32 / 2) / max as u32;
        (s as u8, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn crop_clamps_to_bounds() {
        let img = RgbImage::from_fn(100, 100, |x, y| Rgb([x as u8, y as u8, 0]));
        let cropped = crop(&img, Rect::new(90, 95, 50, 50)).unwrap();
        assert_eq!(cropped.dimensions(), (10, 5));
        assert_eq!(cropped.get_pixel(0, 0).0, [90, 95, 0]);
        assert!(crop(&img, Rect::new(100, 0, 10, 10)).is_none());
    }

    #[test]
    fn rgba_bytes_drop_alpha() {
        let img = rgb_from_rgba(2, 1, &[1, 2, 3, 255, 4, 5, 6, 0]).unwrap();
        assert_eq!(img.get_pixel(1, 0).0, [4, 5, 6]);
        assert!(rgb_from_rgba(2, 2, &[0; 8]).is_none());
    }

    #[test]
    fn upscale_gray_keeps_flat_color() {
        let img = GrayImage::from_pixel(4, 2, Luma([77]));
        let (w, h) = scaled_size(4, 2, 3.5);
        let big = resize_gray(&img, w, h, Filter::CatmullRom).unwrap();
        assert_eq!(big.dimensions(), (14, 7));
        assert!(big.pixels().all(|p| p.0[0].abs_diff(77) <= 1));
    }

    #[test]
    fn nearest_resize_keeps_binary_values() {
        let img = GrayImage::from_fn(4, 4, |x, _| Luma([if x < 2 { 0 } else { 255 }]));
        let small = resize_gray(&img, 3, 3, Filter::Nearest).unwrap();
        assert!(small.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn resize_to_zero_is_an_error() {
        let img = RgbImage::new(4, 4);
        assert!(resize_rgb(&img, 0, 3, Filter::Area).is_err());
    }

    #[test]
    fn white_has_no_saturation() {
        assert_eq!(Color::WHITE.saturation_value(), (0, 255));
        assert_eq!(Color::new(255, 0, 0).saturation_value(), (255, 255));
        assert_eq!(Color::BLACK.saturation_value(), (0, 0));
        assert_eq!(Color::new(200, 200, 200).luma(), 200);
    }
}
