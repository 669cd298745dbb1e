//! OCR preprocessing for the two text sources on screen.
//!
//! The deed panel is dark text on a light, slightly noisy background: it only
//! needs upscaling and a median pass. The coordinate label is thin white text
//! drawn over the radar, so it is contrast-equalized and thresholded down to
//! dark glyphs on a white page, which is what the OCR engine reads best.

use anyhow::Result;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::{filter::median_filter, morphology};

use crate::image::{resize_gray, resize_rgb, scaled_size, to_gray, Filter};
use crate::{clahe, Color};

pub const DEED_UPSCALE: f32 = 3.5;
pub const COORDS_UPSCALE: f32 = 3.0;

const CLAHE_CLIP: f32 = 2.0;
const CLAHE_TILES: (u32, u32) = (8, 8);

/// Glyph pixels: nearly unsaturated and bright.
const WHITE_MAX_SATURATION: u8 = 60;
const WHITE_MIN_VALUE: u8 = 190;

pub fn preprocess_deed(region: &RgbImage) -> Result<GrayImage> {
	let gray = to_gray(region);
	let (w, h) = scaled_size(gray.width(), gray.height(), DEED_UPSCALE);
	let big = resize_gray(&gray, w, h, Filter::CatmullRom)?;
	Ok(median_filter(&big, 1, 1))
}

pub fn preprocess_coords(region: &RgbImage) -> Result<GrayImage> {
	let (w, h) = scaled_size(region.width(), region.height(), COORDS_UPSCALE);
	let big = resize_rgb(region, w, h, Filter::Bilinear)?;
	let equalized = equalize_rgb(&big);

	let mask = GrayImage::from_fn(w, h, |x, y| {
		let [r, g, b] = equalized.get_pixel(x, y).0;
		let (s, v) = Color::new(r, g, b).saturation_value();
		let white = s <= WHITE_MAX_SATURATION && v >= WHITE_MIN_VALUE;
		Luma([if white { 255 } else { 0 }])
	});

	let closed = morphology::close(&mask, Norm::LInf, 1);
	let mut glyphs = morphology::dilate(&closed, Norm::L1, 1);
	image::imageops::invert(&mut glyphs);
	Ok(glyphs)
}

/// CLAHE on luma, with each pixel's luma change added back to its channels.
fn equalize_rgb(image: &RgbImage) -> RgbImage {
	let luma = to_gray(image);
	let equalized = clahe::clahe(&luma, CLAHE_CLIP, CLAHE_TILES);

	let mut out = image.clone();
	for (x, y, p) in out.enumerate_pixels_mut() {
		let delta = equalized.get_pixel(x, y).0[0] as i16 - luma.get_pixel(x, y).0[0] as i16;
		let shift = |c: u8| (c as i16 + delta).clamp(0, 255) as u8;
		let [r, g, b] = p.0;
		*p = Rgb([shift(r), shift(g), shift(b)]);
	}
	out
}
