use std::sync::Mutex;

use data::{CoordinateMapper, PlayerPosition};

use crate::bus::{Event, EventBus};

/// Turns raw compass readings into scene positions.
///
/// Every update is published, even when the coordinates did not change, so a
/// consumer can treat the event stream as a heartbeat of successful reads.
pub struct PlayerPositionTracker {
	mapper: CoordinateMapper,
	radius_coord: f64,
	current: Mutex<Option<PlayerPosition>>,
	bus: EventBus,
}

impl PlayerPositionTracker {
	pub fn new(mapper: CoordinateMapper, radius_coord: f64, bus: EventBus) -> Self {
		Self { mapper, radius_coord, current: Mutex::new(None), bus }
	}

	pub fn update(&self, lon: i32, lat: i32) {
		let position = PlayerPosition::new(lon, lat);
		*self.current.lock().expect("player lock poisoned") = Some(position);

		let point = position.scene_point(&self.mapper);
		let rect = position.scene_rect(&self.mapper, self.radius_coord);
		tracing::debug!(lon, lat, x = point.x, y = point.y, "player moved");
		self.bus.publish(Event::PlayerPositionChanged { point, rect });
	}

	pub fn current(&self) -> Option<PlayerPosition> {
		*self.current.lock().expect("player lock poisoned")
	}
}
