use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ie::screen::compass::CompassLocator;

use crate::bus::{Event, EventBus};
use crate::capture::{CaptureSource, Region};
use crate::worker::{StopToken, Worker};

/// Polls the compass readout at a fixed interval.
pub struct PositionScanner {
	capture: Box<dyn CaptureSource>,
	ie: Arc<ie::Ie>,
	locator: CompassLocator,
	compass: Region,
	interval: Duration,
	bus: EventBus,
}

impl PositionScanner {
	pub fn new(
		capture: Box<dyn CaptureSource>,
		ie: Arc<ie::Ie>,
		locator: CompassLocator,
		compass: Region,
		interval: Duration,
		bus: EventBus,
	) -> Self {
		Self { capture, ie, locator, compass, interval, bus }
	}

	pub fn spawn(self) -> std::io::Result<Worker> {
		Worker::spawn("position-scanner", move |token| self.run(token))
	}

	fn run(mut self, token: StopToken) {
		tracing::info!(templates = self.locator.uses_templates(), "position scanner running");
		loop {
			match self.poll() {
				Ok(Some((lon, lat))) => self.bus.publish(Event::PlayerPositionParsed { lon, lat }),
				Ok(None) => {}
				Err(err) => match err.downcast_ref::<ie::VisionError>() {
					Some(ie::VisionError::NotFound { best_score }) => {
						tracing::debug!(best_score, "compass not in frame");
					}
					_ => tracing::debug!("position poll failed: {err:#}"),
				},
			}

			if token.sleep(self.interval) {
				break;
			}
		}
	}

	/// One capture and read. `None` when the readout did not parse.
	pub fn poll(&mut self) -> Result<Option<(i32, i32)>> {
		let frame = self.capture.capture(self.compass).context("capture compass")?;
		self.ie.compass_position(&mut self.locator, &frame)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bus::Topic;
	use crate::capture::{Anchor, CaptureError};
	use ie::screen::deed::DeedPanel;
	use ie::{Layout, TextRecognizer};
	use image::{GrayImage, Rgb, RgbImage};

	struct Compass;

	impl CaptureSource for Compass {
		fn capture(&mut self, region: Region) -> Result<RgbImage, CaptureError> {
			Ok(RgbImage::from_pixel(region.width, region.height, Rgb([30, 60, 30])))
		}
	}

	struct Readout(&'static str);

	impl TextRecognizer for Readout {
		fn recognize(&self, _image: &GrayImage, _layout: Layout) -> anyhow::Result<String> {
			Ok(self.0.to_owned())
		}
	}

	fn scanner(text: &'static str) -> PositionScanner {
		let ie = ie::Ie::new(Box::new(Readout(text)), DeedPanel::default());
		PositionScanner::new(
			Box::new(Compass),
			Arc::new(ie),
			CompassLocator::fixed(ie::screen::compass::DEFAULT_COORDS_ROI),
			Region::new(Anchor::BottomRight, 8, 10, 370, 430),
			Duration::from_millis(5),
			EventBus::new(),
		)
	}

	#[test]
	fn poll_reads_lon_lat() {
		let mut s = scanner("Lon: 136512, Lat: 80977");
		assert_eq!(s.poll().unwrap(), Some((136512, 80977)));
	}

	#[test]
	fn garbage_is_none() {
		let mut s = scanner("Lon ?? Lat");
		assert_eq!(s.poll().unwrap(), None);
	}

	#[test]
	fn worker_publishes_every_read() {
		let s = scanner("Lon: 1000 Lat: 2000");
		let rx = s.bus.subscribe(&[Topic::PlayerPositionParsed]);
		let worker = s.spawn().unwrap();
		for _ in 0..2 {
			let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
			assert!(matches!(event, Event::PlayerPositionParsed { lon: 1000, lat: 2000 }));
		}
		worker.join();
	}
}
