//! Compass (radar) widget and the coordinate readout under it.
//!
//! The readout block is found in two steps: the radar is located with a full
//! scale sweep, then the coordinate label template is matched at the radar's
//! winning scale inside the area starting at the radar's top-left corner. The
//! resulting rectangle is cached until `relocate_after` consecutive reads fail.
//! Without templates a fixed rectangle inside the compass capture is used.

use anyhow::Result;
use image::{GrayImage, RgbImage};

use crate::locate::{locate, locate_at_scale, LocateParams};
use crate::ocr::{read_text, TextRecognizer};
use crate::{crop, preprocess, to_gray, Rect, Template, VisionError};

/// Readout block inside a 370x430 compass capture.
pub const DEFAULT_COORDS_ROI: Rect = Rect::new(55, 372, 110, 47);

pub struct CompassTemplates {
	pub radar: Template,
	pub coords: Template,
}

pub struct CompassLocator {
	templates: Option<CompassTemplates>,
	params: LocateParams,
	fallback: Rect,
	relocate_after: u32,
	cached: Option<Rect>,
	misses: u32,
}

impl CompassLocator {
	pub fn with_templates(templates: CompassTemplates, params: LocateParams, relocate_after: u32) -> Self {
		Self {
			templates: Some(templates),
			params,
			fallback: DEFAULT_COORDS_ROI,
			relocate_after: relocate_after.max(1),
			cached: None,
			misses: 0,
		}
	}

	pub fn fixed(roi: Rect) -> Self {
		Self {
			templates: None,
			params: LocateParams::default(),
			fallback: roi,
			relocate_after: 1,
			cached: None,
			misses: 0,
		}
	}

	pub fn uses_templates(&self) -> bool {
		self.templates.is_some()
	}

	pub fn cached(&self) -> Option<Rect> {
		self.cached
	}

	/// Rectangle of the coordinate readout inside `frame`.
	pub fn coords_roi(&mut self, frame: &RgbImage) -> Result<Rect, VisionError> {
		let Some(templates) = &self.templates else {
			return Ok(self.fallback);
		};
		if let Some(rect) = self.cached {
			return Ok(rect);
		}

		let gray = to_gray(frame);
		let rect = find_readout(&gray, templates, &self.params)?;
		log::info!("coordinate readout located at {rect:?}");
		self.cached = Some(rect);
		self.misses = 0;
		Ok(rect)
	}

	/// Record the outcome of a read against the cached rectangle.
	pub fn report(&mut self, success: bool) {
		if success {
			self.misses = 0;
			return;
		}
		if self.cached.is_none() {
			return;
		}
		self.misses += 1;
		if self.misses >= self.relocate_after {
			log::debug!("{} consecutive misses, relocating readout", self.misses);
			self.cached = None;
			self.misses = 0;
		}
	}

	/// Read `(lon, lat)` from a compass capture. `Ok(None)` when the readout
	/// was found but did not parse.
	pub fn read_position(
		&mut self,
		frame: &RgbImage,
		engine: &dyn TextRecognizer,
	) -> Result<Option<(i32, i32)>> {
		let roi = self.coords_roi(frame)?;
		let position = read_coords(frame, roi, engine)?;
		self.report(position.is_some());
		Ok(position)
	}
}

fn find_readout(gray: &GrayImage, templates: &CompassTemplates, params: &LocateParams) -> Result<Rect, VisionError> {
	let radar = locate(gray, &templates.radar, params)?;
	let (rx, ry) = radar.top_left;
	let below = image::imageops::crop_imm(gray, rx, ry, gray.width() - rx, gray.height() - ry).to_image();
	let coords = locate_at_scale(&below, &templates.coords, radar.scale, params.threshold)?;
	Ok(coords.rect().offset(rx, ry))
}

/// OCR the readout at `roi` and parse it.
pub fn read_coords(frame: &RgbImage, roi: Rect, engine: &dyn TextRecognizer) -> Result<Option<(i32, i32)>> {
	let Some(region) = crop(frame, roi) else {
		log::debug!("coordinate roi {roi:?} outside {}x{} capture", frame.width(), frame.height());
		return Ok(None);
	};
	let prepared = preprocess::preprocess_coords(&region)?;
	let text = read_text(engine, &prepared);
	let position = data::parse_position(&text);
	if position.is_none() {
		log::debug!("no coordinates in {text:?}");
	}
	Ok(position)
}
