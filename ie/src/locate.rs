//! Multi-scale masked template search.
//!
//! The radar widget is drawn at whatever UI scale the player picked, so the
//! template is swept over a range of scales and the best mean-centred
//! normalized correlation over the opaque template pixels wins. The winning scale is returned so
//! correlated widgets (the coordinate label next to the radar) can be searched
//! at that scale alone.

use image::GrayImage;

use crate::{Rect, ScaledTemplate, Template, VisionError};

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ScaleSweep {
	pub low: f32,
	pub high: f32,
	pub step: f32,
}

impl Default for ScaleSweep {
	fn default() -> Self {
		Self { low: 0.65, high: 1.35, step: 0.01 }
	}
}

impl ScaleSweep {
	pub const fn single(scale: f32) -> Self {
		Self { low: scale, high: scale, step: 1.0 }
	}

	/// Ascending scales from `low` to `high`, both inclusive.
	pub fn scales(&self) -> Vec<f32> {
		if self.step <= 0.0 || self.high <= self.low {
			return vec![self.low];
		}
		// Index-based stepping; accumulating `step` drifts past `high`.
		let n = ((self.high - self.low) / self.step + 1e-4).floor() as usize;
		(0..=n)
			.map(|i| ((self.low + i as f32 * self.step) * 10_000.0).round() / 10_000.0)
			.collect()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LocateParams {
	pub threshold: f32,
	pub sweep: ScaleSweep,
}

impl Default for LocateParams {
	fn default() -> Self {
		Self { threshold: 0.8, sweep: ScaleSweep::default() }
	}
}

/// Bounding box of a match in frame coordinates, plus the scale it matched at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
	pub top_left: (u32, u32),
	pub bottom_right: (u32, u32),
	pub scale: f32,
	pub score: f32,
}

impl Located {
	pub fn rect(&self) -> Rect {
		Rect::new(
			self.top_left.0,
			self.top_left.1,
			self.bottom_right.0 - self.top_left.0,
			self.bottom_right.1 - self.top_left.1,
		)
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
	score: f32,
	location: (u32, u32),
	size: (u32, u32),
	scale: f32,
}

/// Keeps the first candidate reaching the best score; later equal scores do not override.
pub(crate) fn best_of(
	scales: impl IntoIterator<Item = f32>,
	mut score_at: impl FnMut(f32) -> Option<Candidate>,
) -> Option<Candidate> {
	let mut best: Option<Candidate> = None;
	for scale in scales {
		let Some(candidate) = score_at(scale) else { continue };
		if best.is_none_or(|b| candidate.score > b.score) {
			best = Some(candidate);
		}
	}
	best
}

/// Opaque pixels of a scaled template as offsets into the frame buffer, with
/// the template's own sums.
struct MaskedTemplate {
	pixels: Vec<(usize, u64)>,
	sum: u64,
	sum_sq: u64,
}

impl MaskedTemplate {
	fn new(scaled: &ScaledTemplate, frame_width: u32) -> Self {
		let mut pixels = Vec::new();
		let (mut sum, mut sum_sq) = (0u64, 0u64);
		for (x, y, p) in scaled.luma.enumerate_pixels() {
			if scaled.mask.get_pixel(x, y).0[0] == 0 {
				continue;
			}
			let t = u64::from(p.0[0]);
			pixels.push((y as usize * frame_width as usize + x as usize, t));
			sum += t;
			sum_sq += t * t;
		}
		Self { pixels, sum, sum_sq }
	}

	fn n(&self) -> f64 {
		self.pixels.len() as f64
	}

	fn variance_term(&self) -> f64 {
		self.sum_sq as f64 - (self.sum as f64).powi(2) / self.n()
	}

	/// Mean-centred normalized correlation of the window starting at `origin`.
	/// `NaN` when the window is flat.
	fn score(&self, frame: &[u8], origin: usize, template_term: f64) -> f64 {
		let (mut sum_i, mut sum_i2, mut sum_it) = (0u64, 0u64, 0u64);
		for &(offset, t) in &self.pixels {
			let i = u64::from(frame[origin + offset]);
			sum_i += i;
			sum_i2 += i * i;
			sum_it += i * t;
		}
		let n = self.n();
		let frame_term = sum_i2 as f64 - (sum_i as f64).powi(2) / n;
		if frame_term <= f64::EPSILON {
			return f64::NAN;
		}
		let numerator = sum_it as f64 - self.sum as f64 * sum_i as f64 / n;
		numerator / (template_term * frame_term).sqrt()
	}
}

/// Best masked, mean-centred correlation score of `template` at one scale, or
/// `None` when the scaled template does not fit in the frame or has no contrast.
pub(crate) fn score_at_scale(frame: &GrayImage, template: &Template, scale: f32) -> Option<Candidate> {
	let scaled = match template.scaled(scale) {
		Ok(scaled) => scaled,
		Err(err) => {
			log::debug!("skipping scale {scale}: {err:#}");
			return None;
		}
	};
	let (w, h) = scaled.luma.dimensions();
	if w > frame.width() || h > frame.height() {
		return None;
	}

	let masked = MaskedTemplate::new(&scaled, frame.width());
	if masked.pixels.is_empty() {
		return None;
	}
	let template_term = masked.variance_term();
	if template_term <= f64::EPSILON {
		log::debug!("template is flat at scale {scale}");
		return None;
	}

	let raw = frame.as_raw();
	let mut best: Option<(f32, (u32, u32))> = None;
	for y in 0..=frame.height() - h {
		for x in 0..=frame.width() - w {
			let origin = y as usize * frame.width() as usize + x as usize;
			let score = masked.score(raw, origin, template_term) as f32;
			// Flat windows have no defined correlation.
			if !score.is_finite() {
				continue;
			}
			if best.is_none_or(|(b, _)| score > b) {
				best = Some((score, (x, y)));
			}
		}
	}

	best.map(|(score, location)| Candidate { score, location, size: (w, h), scale })
}

fn finish(best: Option<Candidate>, threshold: f32) -> Result<Located, VisionError> {
	let Some(best) = best else {
		return Err(VisionError::NotFound { best_score: 0.0 });
	};
	if best.score < threshold {
		return Err(VisionError::NotFound { best_score: best.score });
	}

	let (x, y) = best.location;
	let (w, h) = best.size;
	Ok(Located {
		top_left: (x, y),
		bottom_right: (x + w, y + h),
		scale: best.scale,
		score: best.score,
	})
}

/// Sweep `params.sweep` and return the best match above `params.threshold`.
pub fn locate(frame: &GrayImage, template: &Template, params: &LocateParams) -> Result<Located, VisionError> {
	let best = best_of(params.sweep.scales(), |scale| score_at_scale(frame, template, scale));
	let located = finish(best, params.threshold)?;
	log::debug!(
		"template matched at {:?} (scale {:.2}, score {:.3})",
		located.top_left,
		located.scale,
		located.score
	);
	Ok(located)
}

/// Search at a single, already known scale.
pub fn locate_at_scale(
	frame: &GrayImage,
	template: &Template,
	scale: f32,
	threshold: f32,
) -> Result<Located, VisionError> {
	finish(score_at_scale(frame, template, scale), threshold)
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::{Luma, Rgba, RgbaImage};

	fn pattern(x: u32, y: u32) -> u8 {
		((x * 37 + y * 91 + x * y * 13) % 251) as u8
	}

	fn frame() -> GrayImage {
		GrayImage::from_fn(60, 50, |x, y| Luma([pattern(x, y)]))
	}

	/// Template cut out of `frame()` at (20, 15), with a transparent corner.
	fn cutout() -> Template {
		Template::from_rgba(&RgbaImage::from_fn(12, 10, |x, y| {
			let v = pattern(x + 20, y + 15);
			let alpha = if x < 2 && y < 2 { 0 } else { 255 };
			Rgba([v, v, v, alpha])
		}))
	}

	fn candidate(score: f32, x: u32, scale: f32) -> Candidate {
		Candidate { score, location: (x, 0), size: (4, 4), scale }
	}

	#[test]
	fn sweep_is_inclusive_and_ascending() {
		let scales = ScaleSweep::default().scales();
		assert_eq!(scales.len(), 71);
		assert_eq!(scales[0], 0.65);
		assert_eq!(*scales.last().unwrap(), 1.35);
		assert!(scales.windows(2).all(|w| w[0] < w[1]));
		assert_eq!(ScaleSweep::single(1.1).scales(), vec![1.1]);
	}

	#[test]
	fn tie_keeps_first_scale() {
		let mut step = 0;
		let best = best_of([0.9, 1.0, 1.1], |scale| {
			step += 1;
			let score = if scale < 1.05 { 0.92 } else { 0.5 };
			Some(candidate(score, step, scale))
		})
		.unwrap();
		assert_eq!(best.scale, 0.9);
		assert_eq!(best.location, (1, 0));
	}

	#[test]
	fn strictly_better_later_scale_wins() {
		let best = best_of([0.9, 1.0], |scale| Some(candidate(scale, 0, scale))).unwrap();
		assert_eq!(best.scale, 1.0);
	}

	#[test]
	fn skipped_scales_do_not_stop_the_sweep() {
		let best = best_of([0.5, 0.6, 0.7], |scale| (scale > 0.55).then(|| candidate(0.9, 1, scale))).unwrap();
		assert_eq!(best.scale, 0.6);
	}

	#[test]
	fn finds_cutout_in_frame() {
		let params = LocateParams { threshold: 0.99, sweep: ScaleSweep::single(1.0) };
		let located = locate(&frame(), &cutout(), &params).unwrap();
		assert_eq!(located.top_left, (20, 15));
		assert_eq!(located.bottom_right, (32, 25));
		assert_eq!(located.rect(), Rect::new(20, 15, 12, 10));
		assert_eq!(located.scale, 1.0);
	}

	#[test]
	fn oversized_scales_are_skipped() {
		let params = LocateParams { threshold: 0.99, sweep: ScaleSweep { low: 1.0, high: 6.0, step: 1.0 } };
		let located = locate(&frame(), &cutout(), &params).unwrap();
		assert_eq!(located.top_left, (20, 15));
	}

	#[test]
	fn below_threshold_is_not_found() {
		let params = LocateParams { threshold: 1.5, sweep: ScaleSweep::single(1.0) };
		let err = locate(&frame(), &cutout(), &params).unwrap_err();
		match err {
			VisionError::NotFound { best_score } => assert!(best_score > 0.99),
			other => panic!("unexpected error {other:?}"),
		}
	}

	/// Bright ring on a dark disc, transparent outside.
	fn ring() -> Template {
		Template::from_rgba(&RgbaImage::from_fn(20, 20, |x, y| {
			let (dx, dy) = (x as f32 - 9.5, y as f32 - 9.5);
			let r = (dx * dx + dy * dy).sqrt();
			if r > 9.5 {
				Rgba([0, 0, 0, 0])
			} else if r > 6.0 {
				Rgba([220, 220, 220, 255])
			} else {
				Rgba([40, 40, 40, 255])
			}
		}))
	}

	fn noise(width: u32, height: u32) -> GrayImage {
		let mut state = 0x2545_f491_u32;
		GrayImage::from_fn(width, height, |_, _| {
			state ^= state << 13;
			state ^= state >> 17;
			state ^= state << 5;
			Luma([(state >> 24) as u8])
		})
	}

	#[test]
	fn flat_frame_is_not_found() {
		let flat = GrayImage::from_pixel(120, 100, Luma([128]));
		let err = locate(&flat, &ring(), &LocateParams::default()).unwrap_err();
		assert!(matches!(err, VisionError::NotFound { .. }));
	}

	#[test]
	fn noise_frame_is_not_found() {
		let err = locate(&noise(120, 100), &ring(), &LocateParams::default()).unwrap_err();
		match err {
			VisionError::NotFound { best_score } => assert!(best_score < 0.8),
			other => panic!("unexpected error {other:?}"),
		}
	}

	#[test]
	fn ring_is_found_in_noise() {
		let mut frame = noise(120, 100);
		let ring = ring();
		let scaled = ring.scaled(1.0).unwrap();
		for (x, y, p) in scaled.luma.enumerate_pixels() {
			if scaled.mask.get_pixel(x, y).0[0] > 0 {
				frame.put_pixel(x + 50, y + 30, *p);
			}
		}
		let params = LocateParams { threshold: 0.8, sweep: ScaleSweep::single(1.0) };
		let located = locate(&frame, &ring, &params).unwrap();
		assert_eq!(located.top_left, (50, 30));
		assert!(located.score > 0.99);
	}

	#[test]
	fn brightness_offset_does_not_change_the_match() {
		let shifted = GrayImage::from_fn(60, 50, |x, y| Luma([pattern(x, y) / 2 + 60]));
		let params = LocateParams { threshold: 0.95, sweep: ScaleSweep::single(1.0) };
		let located = locate(&shifted, &cutout(), &params).unwrap();
		assert_eq!(located.top_left, (20, 15));
	}

	#[test]
	fn template_larger_than_frame_is_not_found() {
		let tiny = GrayImage::from_pixel(5, 5, Luma([10]));
		let err = locate_at_scale(&tiny, &cutout(), 1.0, 0.5).unwrap_err();
		assert!(matches!(err, VisionError::NotFound { best_score } if best_score == 0.0));
	}
}
