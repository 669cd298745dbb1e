/// Point in map scene space (pixels of the rendered tile grid).
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ScenePoint {
	pub x: f64,
	pub y: f64,
}

impl ScenePoint {
	#[inline]
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn distance(&self, other: ScenePoint, metric: DistanceMetric) -> f64 {
		let dx = self.x - other.x;
		let dy = self.y - other.y;
		match metric {
			DistanceMetric::Euclidean => dx.hypot(dy),
			DistanceMetric::Manhattan => dx.abs() + dy.abs(),
		}
	}
}

/// Axis-aligned rectangle in scene space.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct SceneRect {
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

impl SceneRect {
	/// Square bounding box of a circle.
	pub fn around(center: ScenePoint, radius: f64) -> Self {
		Self {
			x: center.x - radius,
			y: center.y - radius,
			width: radius * 2.0,
			height: radius * 2.0,
		}
	}

	pub fn center(&self) -> ScenePoint {
		ScenePoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
	#[default]
	Euclidean,
	Manhattan,
}
