mod clahe;
mod error;
pub use error::VisionError;
mod image;
pub use self::image::*;
pub mod locate;
pub use locate::{LocateParams, Located, ScaleSweep};
pub mod ocr;
pub use ocr::{Layout, Tesseract, TextRecognizer, COORDS_WHITELIST};
pub mod preprocess;
mod template;
pub use template::{ScaledTemplate, Template};

pub mod screen;

/// Screen readers bundled with the OCR engines they use.
pub struct Ie {
	ocr: Box<dyn TextRecognizer>,
	coords_ocr: Option<Box<dyn TextRecognizer>>,
	deed_panel: screen::deed::DeedPanel,
}

impl Ie {
	pub fn new(ocr: Box<dyn TextRecognizer>, deed_panel: screen::deed::DeedPanel) -> Self {
		Self { ocr, coords_ocr: None, deed_panel }
	}

	/// Use a separate engine for the compass readout.
	pub fn with_coords_recognizer(mut self, ocr: Box<dyn TextRecognizer>) -> Self {
		self.coords_ocr = Some(ocr);
		self
	}

	/// Locate the tesseract executable and build the engines around it. The
	/// compass readout engine only accepts digits and the `Lon`/`Lat` labels.
	pub fn try_with_tesseract(
		tesseract: Option<&std::path::Path>,
		deed_panel: screen::deed::DeedPanel,
	) -> anyhow::Result<Self> {
		let engine = Tesseract::locate(tesseract)?;
		let coords = engine.clone().with_whitelist(COORDS_WHITELIST);
		Ok(Self::new(Box::new(engine), deed_panel).with_coords_recognizer(Box::new(coords)))
	}

	pub fn recognizer(&self) -> &dyn TextRecognizer {
		self.ocr.as_ref()
	}

	pub fn coords_recognizer(&self) -> &dyn TextRecognizer {
		self.coords_ocr.as_deref().unwrap_or(self.ocr.as_ref())
	}

	/// OCR the deed panel out of a top-left corner capture.
	pub fn deed_text(&self, corner: &::image::RgbImage) -> anyhow::Result<String> {
		self.deed_panel.read(corner, self.recognizer())
	}

	/// Read the player's coordinates from a compass capture.
	pub fn compass_position(
		&self,
		locator: &mut screen::compass::CompassLocator,
		compass: &::image::RgbImage,
	) -> anyhow::Result<Option<(i32, i32)>> {
		locator.read_position(compass, self.coords_recognizer())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ::image::{GrayImage, Rgb, RgbImage};
	use crate::screen::compass::{CompassLocator, DEFAULT_COORDS_ROI};
	use crate::screen::deed::DeedPanel;

	struct Fixed(&'static str);

	impl TextRecognizer for Fixed {
		fn recognize(&self, _image: &GrayImage, _layout: Layout) -> anyhow::Result<String> {
			Ok(self.0.to_owned())
		}
	}

	fn compass() -> RgbImage {
		RgbImage::from_pixel(370, 430, Rgb([40, 40, 40]))
	}

	#[test]
	fn compass_reads_go_through_the_coords_engine() {
		let ie = Ie::new(Box::new(Fixed("Lon: 1 Lat: 2")), DeedPanel::default())
			.with_coords_recognizer(Box::new(Fixed("Lon: 78123 Lat: 81234")));
		let mut locator = CompassLocator::fixed(DEFAULT_COORDS_ROI);
		assert_eq!(ie.compass_position(&mut locator, &compass()).unwrap(), Some((78123, 81234)));
	}

	#[test]
	fn compass_falls_back_to_the_shared_engine() {
		let ie = Ie::new(Box::new(Fixed("Lon: 1000 Lat: 2000")), DeedPanel::default());
		let mut locator = CompassLocator::fixed(DEFAULT_COORDS_ROI);
		assert_eq!(ie.compass_position(&mut locator, &compass()).unwrap(), Some((1000, 2000)));
	}

	#[test]
	fn deed_panel_uses_the_general_engine() {
		let ie = Ie::new(Box::new(Fixed("Depth: 3 m")), DeedPanel::default())
			.with_coords_recognizer(Box::new(Fixed("Lon: 1 Lat: 2")));
		let corner = RgbImage::from_pixel(445, 445, Rgb([90, 90, 90]));
		assert_eq!(ie.deed_text(&corner).unwrap(), "Depth: 3 m");
	}
}
