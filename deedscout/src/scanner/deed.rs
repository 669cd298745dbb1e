use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use data::Deed;

use crate::bus::{Event, EventBus};
use crate::capture::{CaptureSource, Region};
use crate::worker::{StopToken, Worker};

/// How often an idle scanner checks its stop token.
const IDLE_WAKE: Duration = Duration::from_millis(100);

/// Handle used to request a deed scan.
#[derive(Clone)]
pub struct DeedTrigger(Sender<()>);

impl DeedTrigger {
	/// Returns `false` once the scanner has shut down.
	pub fn fire(&self) -> bool {
		self.0.send(()).is_ok()
	}
}

/// Reads the deed panel whenever it is triggered.
pub struct DeedScanner {
	capture: Box<dyn CaptureSource>,
	ie: Arc<ie::Ie>,
	corner: Region,
	cooldown: Duration,
	bus: EventBus,
}

impl DeedScanner {
	pub fn new(capture: Box<dyn CaptureSource>, ie: Arc<ie::Ie>, corner: Region, cooldown: Duration, bus: EventBus) -> Self {
		Self { capture, ie, corner, cooldown, bus }
	}

	pub fn spawn(self) -> std::io::Result<(Worker, DeedTrigger)> {
		let (tx, rx) = channel();
		let worker = Worker::spawn("deed-scanner", move |token| self.run(rx, token))?;
		Ok((worker, DeedTrigger(tx)))
	}

	fn run(mut self, triggers: Receiver<()>, token: StopToken) {
		let mut last_scan: Option<Instant> = None;
		while !token.is_stopped() {
			match triggers.recv_timeout(IDLE_WAKE) {
				Ok(()) => {}
				Err(RecvTimeoutError::Timeout) => continue,
				Err(RecvTimeoutError::Disconnected) => break,
			}

			let now = Instant::now();
			if last_scan.is_some_and(|at| now.duration_since(at) < self.cooldown) {
				tracing::debug!("scan trigger within cooldown ignored");
				continue;
			}
			last_scan = Some(now);

			match self.scan() {
				Ok(Some(deed)) => {
					tracing::info!(position = ?deed.position(), label = ?deed.label(), "deed read");
					self.bus.publish(Event::DeedFound(deed));
				}
				Ok(None) => tracing::info!("deed panel had no readable text"),
				Err(err) => tracing::warn!("deed scan failed: {err:#}"),
			}
		}
	}

	/// Capture, OCR and parse the panel once. `None` when OCR came back empty.
	pub fn scan(&mut self) -> Result<Option<Deed>> {
		let corner = self.capture.capture(self.corner).context("capture deed corner")?;
		let text = self.ie.deed_text(&corner)?;
		if text.trim().is_empty() {
			return Ok(None);
		}
		Ok(Some(data::parse_deed(&text)))
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
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct Panel;

	impl CaptureSource for Panel {
		fn capture(&mut self, _region: Region) -> Result<RgbImage, CaptureError> {
			Ok(RgbImage::from_pixel(445, 445, Rgb([220, 220, 220])))
		}
	}

	struct NoWindow;

	impl CaptureSource for NoWindow {
		fn capture(&mut self, _region: Region) -> Result<RgbImage, CaptureError> {
			Err(CaptureError::WindowNotFound("Entropia".into()))
		}
	}

	struct Canned {
		text: &'static str,
		calls: Arc<AtomicUsize>,
	}

	impl TextRecognizer for Canned {
		fn recognize(&self, _image: &GrayImage, _layout: Layout) -> anyhow::Result<String> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(self.text.to_owned())
		}
	}

	const PANEL: &str = "Resource: Animal Oil\nPosition: Rocktropia (136500, 81000, 120)\nTime left: 00:10:00";

	fn scanner(capture: Box<dyn CaptureSource>, text: &'static str) -> (DeedScanner, Arc<AtomicUsize>) {
		let calls = Arc::new(AtomicUsize::new(0));
		let ie = ie::Ie::new(Box::new(Canned { text, calls: calls.clone() }), DeedPanel::default());
		let corner = Region::new(Anchor::TopLeft, 0, 0, 445, 445);
		let cooldown = Duration::from_secs(60);
		(DeedScanner::new(capture, Arc::new(ie), corner, cooldown, EventBus::new()), calls)
	}

	#[test]
	fn scan_parses_the_panel() {
		let (mut s, _) = scanner(Box::new(Panel), PANEL);
		let deed = s.scan().unwrap().unwrap();
		assert_eq!(deed.position(), Some((136500, 81000)));
		assert_eq!(deed.planet.as_deref(), Some("Rocktropia"));
		assert_eq!(deed.resource.as_deref(), Some("Animal Oil"));
	}

	#[test]
	fn empty_ocr_is_none() {
		let (mut s, _) = scanner(Box::new(Panel), "   ");
		assert!(s.scan().unwrap().is_none());
	}

	#[test]
	fn capture_errors_propagate() {
		let (mut s, calls) = scanner(Box::new(NoWindow), PANEL);
		assert!(s.scan().is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn triggers_within_cooldown_scan_once() {
		let (s, calls) = scanner(Box::new(Panel), PANEL);
		let rx = s.bus.subscribe(&[Topic::DeedFound]);
		let (worker, trigger) = s.spawn().unwrap();
		assert!(trigger.fire());
		assert!(trigger.fire());

		let first = rx.recv_timeout(Duration::from_secs(10)).unwrap();
		assert!(matches!(first, Event::DeedFound(_)));
		std::thread::sleep(Duration::from_millis(300));
		worker.join();

		assert!(rx.try_recv().is_err());
		// Two OCR passes for the single scan.
		assert_eq!(calls.load(Ordering::SeqCst), 2);
		assert!(!trigger.fire());
	}
}
