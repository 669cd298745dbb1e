//! Conversion between in-game longitude/latitude and map scene coordinates.
//!
//! The mapping is affine per axis. Latitude grows northwards in game while the
//! scene's vertical axis grows downwards, so `y` is flipped.

use crate::{PlanetConfig, ScenePoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CalibrationError {
	#[error("invalid calibration: {axis} range is empty (min = max = {min})")]
	InvalidCalibration { axis: Axis, min: i32, max: i32 },
	#[error("invalid calibration: map has no extent along {0}")]
	EmptyGrid(Axis),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
	Longitude,
	Latitude,
}

impl std::fmt::Display for Axis {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Axis::Longitude => write!(f, "longitude"),
			Axis::Latitude => write!(f, "latitude"),
		}
	}
}

/// Validated planet calibration. Construction fails instead of ever dividing by zero later.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
	cfg: PlanetConfig,
	width: f64,
	height: f64,
	lon_range: f64,
	lat_range: f64,
}

impl CoordinateMapper {
	pub fn new(cfg: PlanetConfig) -> Result<Self, CalibrationError> {
		if cfg.max_lon == cfg.min_lon {
			return Err(CalibrationError::InvalidCalibration {
				axis: Axis::Longitude,
				min: cfg.min_lon,
				max: cfg.max_lon,
			});
		}
		if cfg.max_lat == cfg.min_lat {
			return Err(CalibrationError::InvalidCalibration {
				axis: Axis::Latitude,
				min: cfg.min_lat,
				max: cfg.max_lat,
			});
		}
		if cfg.tile_count_x == 0 || cfg.tile_size_px == 0 {
			return Err(CalibrationError::EmptyGrid(Axis::Longitude));
		}
		if cfg.tile_count_y == 0 {
			return Err(CalibrationError::EmptyGrid(Axis::Latitude));
		}

		Ok(Self {
			cfg,
			width: cfg.map_width(),
			height: cfg.map_height(),
			lon_range: f64::from(cfg.max_lon) - f64::from(cfg.min_lon),
			lat_range: f64::from(cfg.max_lat) - f64::from(cfg.min_lat),
		})
	}

	pub fn config(&self) -> &PlanetConfig {
		&self.cfg
	}

	pub fn to_scene(&self, lon: i32, lat: i32) -> ScenePoint {
		let nx = (f64::from(lon) - f64::from(self.cfg.min_lon)) / self.lon_range;
		let ny = (f64::from(lat) - f64::from(self.cfg.min_lat)) / self.lat_range;
		ScenePoint::new(nx * self.width, self.height - ny * self.height)
	}

	pub fn to_lonlat(&self, point: ScenePoint) -> (i32, i32) {
		let nx = point.x / self.width;
		let ny = (self.height - point.y) / self.height;
		let lon = f64::from(self.cfg.min_lon) + nx * self.lon_range;
		let lat = f64::from(self.cfg.min_lat) + ny * self.lat_range;
		(lon.round() as i32, lat.round() as i32)
	}

	/// Converts a real-world distance (in game coordinate units) into scene units.
	pub fn radius_to_scene(&self, radius_coord: f64) -> f64 {
		radius_coord / self.lon_range * self.width
	}
}

pub fn to_scene(lon: i32, lat: i32, cfg: &PlanetConfig) -> Result<ScenePoint, CalibrationError> {
	Ok(CoordinateMapper::new(*cfg)?.to_scene(lon, lat))
}

pub fn to_lonlat(x: f64, y: f64, cfg: &PlanetConfig) -> Result<(i32, i32), CalibrationError> {
	Ok(CoordinateMapper::new(*cfg)?.to_lonlat(ScenePoint::new(x, y)))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rocktropia() -> PlanetConfig {
		PlanetConfig {
			min_lon: 65536,
			max_lon: 106496,
			min_lat: 73728,
			max_lat: 106496,
			tile_count_x: 5,
			tile_count_y: 4,
			tile_size_px: 256,
		}
	}

	#[test]
	fn corners_map_to_scene_edges() {
		let cfg = rocktropia();
		let top_left = to_scene(cfg.min_lon, cfg.max_lat, &cfg).unwrap();
		assert_eq!(top_left, ScenePoint::new(0.0, 0.0));

		let bottom_right = to_scene(cfg.max_lon, cfg.min_lat, &cfg).unwrap();
		assert_eq!(bottom_right, ScenePoint::new(1280.0, 1024.0));
	}

	#[test]
	fn latitude_axis_is_flipped() {
		let mapper = CoordinateMapper::new(rocktropia()).unwrap();
		let south = mapper.to_scene(80000, 75000);
		let north = mapper.to_scene(80000, 100000);
		assert!(north.y < south.y);
		assert_eq!(north.x, south.x);
	}

	#[test]
	fn round_trip_within_one_unit() {
		let cfg = rocktropia();
		let mapper = CoordinateMapper::new(cfg).unwrap();
		for lon in (cfg.min_lon..=cfg.max_lon).step_by(997) {
			for lat in (cfg.min_lat..=cfg.max_lat).step_by(1231) {
				let (back_lon, back_lat) = mapper.to_lonlat(mapper.to_scene(lon, lat));
				assert!((back_lon - lon).abs() <= 1, "lon {lon} -> {back_lon}");
				assert!((back_lat - lat).abs() <= 1, "lat {lat} -> {back_lat}");
			}
		}
	}

	#[test]
	fn free_function_inverse_matches_mapper() {
		let cfg = rocktropia();
		let p = to_scene(78049, 96387, &cfg).unwrap();
		assert_eq!(to_lonlat(p.x, p.y, &cfg).unwrap(), (78049, 96387));
	}

	#[test]
	fn degenerate_longitude_is_rejected() {
		let mut cfg = rocktropia();
		cfg.max_lon = cfg.min_lon;
		assert_eq!(
			to_scene(70000, 80000, &cfg),
			Err(CalibrationError::InvalidCalibration { axis: Axis::Longitude, min: 65536, max: 65536 })
		);
		assert!(to_lonlat(10.0, 10.0, &cfg).is_err());
	}

	#[test]
	fn degenerate_latitude_is_rejected() {
		let mut cfg = rocktropia();
		cfg.min_lat = cfg.max_lat;
		assert!(matches!(
			CoordinateMapper::new(cfg),
			Err(CalibrationError::InvalidCalibration { axis: Axis::Latitude, .. })
		));
	}

	#[test]
	fn empty_tile_grid_is_rejected() {
		let mut cfg = rocktropia();
		cfg.tile_count_y = 0;
		assert_eq!(CoordinateMapper::new(cfg), Err(CalibrationError::EmptyGrid(Axis::Latitude)));
	}

	#[test]
	fn full_i32_range_maps_without_overflow() {
		let cfg = PlanetConfig { min_lon: i32::MIN, max_lon: i32::MAX, min_lat: i32::MIN, max_lat: i32::MAX, ..rocktropia() };
		let mapper = CoordinateMapper::new(cfg).unwrap();
		assert_eq!(mapper.to_scene(i32::MIN, i32::MAX), ScenePoint::new(0.0, 0.0));
		assert_eq!(mapper.to_scene(i32::MAX, i32::MIN), ScenePoint::new(1280.0, 1024.0));
		assert_eq!(mapper.to_lonlat(ScenePoint::new(0.0, 1024.0)), (i32::MIN, i32::MIN));
	}

	#[test]
	fn radius_scales_with_longitude_range() {
		let mapper = CoordinateMapper::new(rocktropia()).unwrap();
		// 40960 coordinate units span 1280 px.
		assert_eq!(mapper.radius_to_scene(320.0), 10.0);
	}
}
