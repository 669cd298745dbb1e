use std::time::{Duration, Instant};

/// A resource claim recovered from one OCR pass over the deed panel.
///
/// Every field except `raw` is optional: OCR may drop any line, and absence of
/// a field is the signal that it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deed {
	pub depth_m: Option<u32>,
	pub size_label: Option<String>,
	pub size_points: Option<u32>,
	pub resource: Option<String>,
	pub planet: Option<String>,
	pub x: Option<i32>,
	pub y: Option<i32>,
	pub z: Option<i32>,
	/// Monotonic instant after which the deed is gone.
	pub expiry: Option<Instant>,
	/// Merged OCR text, kept for diagnostics.
	pub raw: String,
}

impl Deed {
	/// Longitude/latitude pair, only when both were read.
	pub fn position(&self) -> Option<(i32, i32)> {
		Some((self.x?, self.y?))
	}

	pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
		self.expiry.map(|expiry| expiry.saturating_duration_since(now))
	}

	pub fn remaining_seconds_at(&self, now: Instant) -> Option<u64> {
		self.remaining_at(now).map(|d| d.as_secs())
	}

	pub fn remaining_seconds(&self) -> Option<u64> {
		self.remaining_seconds_at(Instant::now())
	}

	pub fn formatted_remaining_at(&self, now: Instant) -> Option<String> {
		self.remaining_seconds_at(now).map(format_hms)
	}

	pub fn formatted_remaining(&self) -> Option<String> {
		self.formatted_remaining_at(Instant::now())
	}

	/// Short caption for markers, e.g. `Animal Oil (Small)`.
	pub fn label(&self) -> Option<String> {
		match (&self.resource, &self.size_label) {
			(Some(resource), Some(size)) => Some(format!("{resource} ({size})")),
			(Some(resource), None) => Some(resource.clone()),
			(None, Some(size)) => Some(size.clone()),
			(None, None) => None,
		}
	}
}

pub fn format_hms(secs: u64) -> String {
	let h = secs / 3600;
	let m = (secs % 3600) / 60;
	let s = secs % 60;
	format!("{h:02}:{m:02}:{s:02}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remaining_counts_down_and_saturates() {
		let now = Instant::now();
		let deed = Deed {
			expiry: Some(now + Duration::from_secs(90)),
			..Default::default()
		};
		assert_eq!(deed.remaining_seconds_at(now), Some(90));
		assert_eq!(deed.remaining_seconds_at(now + Duration::from_secs(30)), Some(60));
		assert_eq!(deed.remaining_seconds_at(now + Duration::from_secs(600)), Some(0));
	}

	#[test]
	fn remaining_is_undefined_without_expiry() {
		let deed = Deed::default();
		assert_eq!(deed.remaining_seconds(), None);
		assert_eq!(deed.formatted_remaining(), None);
	}

	#[test]
	fn formats_hours_minutes_seconds() {
		assert_eq!(format_hms(0), "00:00:00");
		assert_eq!(format_hms(300), "00:05:00");
		assert_eq!(format_hms(3 * 3600 + 7 * 60 + 9), "03:07:09");
	}

	#[test]
	fn position_requires_both_axes() {
		let mut deed = Deed { x: Some(1000), ..Default::default() };
		assert_eq!(deed.position(), None);
		deed.y = Some(2000);
		assert_eq!(deed.position(), Some((1000, 2000)));
	}

	#[test]
	fn label_uses_available_parts() {
		let mut deed = Deed { resource: Some("Animal Oil".into()), ..Default::default() };
		assert_eq!(deed.label().as_deref(), Some("Animal Oil"));
		deed.size_label = Some("Small".into());
		assert_eq!(deed.label().as_deref(), Some("Animal Oil (Small)"));
		assert_eq!(Deed::default().label(), None);
	}
}
