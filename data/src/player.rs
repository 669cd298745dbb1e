use crate::{CoordinateMapper, ScenePoint, SceneRect};

/// Last known player location, in game coordinates.
///
/// Scene values are always derived through a [`CoordinateMapper`] so they can
/// never drift from the authoritative lon/lat pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerPosition {
	pub lon: i32,
	pub lat: i32,
}

impl PlayerPosition {
	pub const fn new(lon: i32, lat: i32) -> Self {
		Self { lon, lat }
	}

	pub fn scene_point(&self, mapper: &CoordinateMapper) -> ScenePoint {
		mapper.to_scene(self.lon, self.lat)
	}

	pub fn scene_radius(&self, mapper: &CoordinateMapper, radius_coord: f64) -> f64 {
		mapper.radius_to_scene(radius_coord)
	}

	pub fn scene_rect(&self, mapper: &CoordinateMapper, radius_coord: f64) -> SceneRect {
		SceneRect::around(self.scene_point(mapper), self.scene_radius(mapper, radius_coord))
	}
}
