use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Window corner a [`Region`] is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
	TopLeft,
	BottomRight,
}

/// Capture rectangle relative to one corner of the game window.
///
/// For `BottomRight` the offsets are the gaps between the region and the
/// window's right and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
	pub anchor: Anchor,
	pub offset_x: u32,
	pub offset_y: u32,
	pub width: u32,
	pub height: u32,
}

impl Region {
	pub const fn new(anchor: Anchor, offset_x: u32, offset_y: u32, width: u32, height: u32) -> Self {
		Self { anchor, offset_x, offset_y, width, height }
	}

	/// Rectangle inside a `window_w x window_h` window, clamped to it.
	pub fn resolve(&self, window_w: u32, window_h: u32) -> Option<ie::Rect> {
		let (x, y) = match self.anchor {
			Anchor::TopLeft => (self.offset_x, self.offset_y),
			Anchor::BottomRight => (
				window_w.saturating_sub(self.offset_x + self.width),
				window_h.saturating_sub(self.offset_y + self.height),
			),
		};
		ie::Rect::new(x, y, self.width, self.height).clamped(window_w, window_h)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
	#[error("no visible window with a title containing {0:?}")]
	WindowNotFound(String),
	#[error("capture backend: {0}")]
	Backend(String),
	#[error("region {region:?} is empty in a {width}x{height} window")]
	EmptyRegion { region: Region, width: u32, height: u32 },
}

pub trait CaptureSource: Send {
	fn capture(&mut self, region: Region) -> Result<RgbImage, CaptureError>;
}

/// Captures a region of the first matching game window via xcap.
pub struct WindowCapture {
	title: String,
}

impl WindowCapture {
	pub fn new(title: impl Into<String>) -> Self {
		Self { title: title.into() }
	}

	fn find_window(&self) -> Result<xcap::Window, CaptureError> {
		let needle = self.title.to_lowercase();
		let windows = xcap::Window::all().map_err(|err| CaptureError::Backend(err.to_string()))?;
		windows
			.into_iter()
			.find(|window| {
				!window.is_minimized().unwrap_or(true)
					&& window.title().is_ok_and(|title| title.to_lowercase().contains(&needle))
			})
			.ok_or_else(|| CaptureError::WindowNotFound(self.title.clone()))
	}
}

impl CaptureSource for WindowCapture {
	fn capture(&mut self, region: Region) -> Result<RgbImage, CaptureError> {
		let window = self.find_window()?;
		let img = window.capture_image().map_err(|err| CaptureError::Backend(err.to_string()))?;
		let (width, height) = (img.width(), img.height());

		let frame = ie::rgb_from_rgba(width, height, img.as_raw())
			.ok_or_else(|| CaptureError::Backend(format!("unexpected buffer size for {width}x{height}")))?;
		crop_region(&frame, region)
	}
}

/// Cut `region` out of a full-window frame.
pub fn crop_region(frame: &RgbImage, region: Region) -> Result<RgbImage, CaptureError> {
	let (width, height) = frame.dimensions();
	region
		.resolve(width, height)
		.and_then(|rect| ie::crop(frame, rect))
		.ok_or(CaptureError::EmptyRegion { region, width, height })
}
