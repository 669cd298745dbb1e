//! Per-planet geospatial calibration.

/// Calibration record as stored in the config file, one per planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlanetBounds {
	pub min_lon: i32,
	pub max_lon: i32,
	pub min_lat: i32,
	pub max_lat: i32,
	pub tile_count_x: u32,
	pub tile_count_y: u32,
}

/// Linear mapping between planet bounds and the rendered tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanetConfig {
	pub min_lon: i32,
	pub max_lon: i32,
	pub min_lat: i32,
	pub max_lat: i32,
	pub tile_count_x: u32,
	pub tile_count_y: u32,
	pub tile_size_px: u32,
}

impl PlanetConfig {
	pub fn new(bounds: PlanetBounds, tile_size_px: u32) -> Self {
		Self {
			min_lon: bounds.min_lon,
			max_lon: bounds.max_lon,
			min_lat: bounds.min_lat,
			max_lat: bounds.max_lat,
			tile_count_x: bounds.tile_count_x,
			tile_count_y: bounds.tile_count_y,
			tile_size_px,
		}
	}

	#[inline]
	pub fn map_width(&self) -> f64 {
		self.tile_count_x as f64 * self.tile_size_px as f64
	}

	#[inline]
	pub fn map_height(&self) -> f64 {
		self.tile_count_y as f64 * self.tile_size_px as f64
	}
}

/// Attempts to find the closest known planet name for a dirty OCR string.
///
/// Returns `None` when the string is too short to judge or when even the best
/// candidate is too far away to be a plausible misread.
pub fn find_planet_name<'a, I>(known: I, name: &str) -> Option<&'a str>
where
	I: IntoIterator<Item = &'a str>,
{
	let name = name.trim_ascii();
	if name.len() < 3 {
		return None;
	}
	let lower = name.to_ascii_lowercase();

	let mut best: Option<(&'a str, usize)> = None;
	for candidate in known {
		let lev = levenshtein::levenshtein(&lower, &candidate.to_ascii_lowercase());
		if lev == 0 {
			return Some(candidate);
		}
		if best.is_none_or(|(_, min)| lev < min) {
			best = Some((candidate, lev));
		}
	}

	let (candidate, lev) = best?;
	let max_len = name.len().max(candidate.len());
	(lev <= (max_len / 4).max(1)).then_some(candidate)
}
