//! Masked templates loaded from RGBA assets.

use std::path::Path;

use anyhow::{Context, Result};
use image::{GrayImage, Luma, RgbImage, RgbaImage};

use crate::image::{resize_gray, resize_rgb, scaled_size, to_gray, Filter};
use crate::VisionError;

/// Colour template plus an opacity mask derived from its alpha channel.
#[derive(Debug, Clone)]
pub struct Template {
	color: RgbImage,
	mask: GrayImage,
}

/// A template resized for one step of a scale sweep.
pub struct ScaledTemplate {
	pub luma: GrayImage,
	pub mask: GrayImage,
}

impl Template {
	/// Any alpha at or above this counts as opaque.
	pub const ALPHA_THRESHOLD: u8 = 1;

	pub fn load(path: impl AsRef<Path>) -> Result<Self, VisionError> {
		let path = path.as_ref();
		let img = image::open(path).map_err(|err| VisionError::TemplateLoad {
			path: path.to_path_buf(),
			reason: err.to_string(),
		})?;
		Ok(Self::from_rgba(&img.to_rgba8()))
	}

	pub fn from_png_bytes(bytes: &[u8]) -> Result<Self> {
		let img = image::load_from_memory(bytes)
			.context("decode png (with alpha)")?
			.to_rgba8();
		Ok(Self::from_rgba(&img))
	}

	pub fn from_rgba(img: &RgbaImage) -> Self {
		let (width, height) = img.dimensions();
		let mut color = RgbImage::new(width, height);
		let mut mask = GrayImage::new(width, height);

		for (x, y, p) in img.enumerate_pixels() {
			let [r, g, b, a] = p.0;
			color.put_pixel(x, y, image::Rgb([r, g, b]));
			let opaque = if a >= Self::ALPHA_THRESHOLD { 255 } else { 0 };
			mask.put_pixel(x, y, Luma([opaque]));
		}

		Self { color, mask }
	}

	pub fn width(&self) -> u32 {
		self.color.width()
	}

	pub fn height(&self) -> u32 {
		self.color.height()
	}

	pub fn mask(&self) -> &GrayImage {
		&self.mask
	}

	/// Resize colour with area filtering and the mask with nearest-neighbour, so
	/// mask edges stay hard.
	pub fn scaled(&self, scale: f32) -> Result<ScaledTemplate> {
		let (w, h) = scaled_size(self.width(), self.height(), scale);
		let (color, mask) = if (w, h) == self.color.dimensions() {
			(self.color.clone(), self.mask.clone())
		} else {
			(
				resize_rgb(&self.color, w, h, Filter::Area)?,
				resize_gray(&self.mask, w, h, Filter::Nearest)?,
			)
		};
		Ok(ScaledTemplate {
			luma: to_gray(&color),
			mask,
		})
	}
}
