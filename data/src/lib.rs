//! Domain model shared by the scanners and the lifecycle services.

mod deed;
pub use deed::{format_hms, Deed};
mod geometry;
pub use geometry::{DistanceMetric, ScenePoint, SceneRect};
pub mod mapper;
pub use mapper::{CalibrationError, CoordinateMapper};
pub mod parse;
pub use parse::{parse_deed, parse_deed_at, parse_position};
mod planet;
pub use planet::{find_planet_name, PlanetBounds, PlanetConfig};
mod player;
pub use player::PlayerPosition;
