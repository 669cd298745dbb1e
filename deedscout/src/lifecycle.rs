//! Deed markers: dedupe by proximity, countdown, expiry and depletion.
//!
//! All marker state sits behind one mutex, so `ingest`, `tick` and the removal
//! paths are serialized no matter which thread calls them. Events produced
//! while the lock is held are collected and published after it is released.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use data::{find_planet_name, CoordinateMapper, Deed, DistanceMetric, ScenePoint};

use crate::bus::{Event, EventBus};
use crate::config::MarkerConfig;

/// Read-only copy of a marker handed to consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerView {
	pub id: String,
	pub position: ScenePoint,
	pub radius: f64,
	pub label: String,
	pub deed: Deed,
}

struct Marker {
	id: String,
	position: ScenePoint,
	radius: f64,
	label: String,
	deed: Deed,
}

impl Marker {
	fn view(&self) -> MarkerView {
		MarkerView {
			id: self.id.clone(),
			position: self.position,
			radius: self.radius,
			label: self.label.clone(),
			deed: self.deed.clone(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
	pub near_px: f64,
	pub metric: DistanceMetric,
	pub radius: f64,
	pub default_ttl: Duration,
	pub depletion_max_distance: f64,
	/// Deeds resolving to another configured planet are dropped.
	pub active_planet: String,
	pub known_planets: Vec<String>,
}

impl LifecycleSettings {
	pub fn new(markers: &MarkerConfig, active_planet: impl Into<String>, known_planets: Vec<String>) -> Self {
		Self {
			near_px: markers.near_px,
			metric: markers.metric,
			radius: markers.radius,
			default_ttl: Duration::from_secs(markers.default_ttl_s),
			depletion_max_distance: markers.depletion_max_distance,
			active_planet: active_planet.into(),
			known_planets,
		}
	}
}

#[derive(Default)]
struct State {
	markers: HashMap<String, Marker>,
	seq: u64,
	player: Option<ScenePoint>,
}

pub struct DeedLifecycleManager {
	mapper: CoordinateMapper,
	settings: LifecycleSettings,
	state: Mutex<State>,
	bus: EventBus,
}

impl DeedLifecycleManager {
	pub fn new(mapper: CoordinateMapper, settings: LifecycleSettings, bus: EventBus) -> Self {
		Self { mapper, settings, state: Mutex::new(State::default()), bus }
	}

	fn publish_all(&self, events: Vec<Event>) {
		for event in events {
			self.bus.publish(event);
		}
	}

	/// Resolve the deed's planet against the configured ones. `false` when it
	/// clearly names a different planet.
	fn on_active_planet(&self, deed: &mut Deed) -> bool {
		let Some(name) = deed.planet.as_deref() else {
			return true;
		};
		let known = self.settings.known_planets.iter().map(String::as_str);
		match find_planet_name(known, name) {
			Some(resolved) if !resolved.eq_ignore_ascii_case(&self.settings.active_planet) => {
				tracing::info!(planet = resolved, active = %self.settings.active_planet, "deed is on another planet");
				false
			}
			Some(resolved) => {
				deed.planet = Some(resolved.to_string());
				true
			}
			None => {
				tracing::debug!(planet = name, "unrecognised planet name, keeping deed");
				true
			}
		}
	}

	/// Merge a parsed deed into the marker set. Returns the id of the marker it
	/// created or updated, or `None` when the deed was rejected.
	pub fn ingest(&self, mut deed: Deed, now: Instant) -> Option<String> {
		let Some((lon, lat)) = deed.position() else {
			tracing::debug!(raw = %deed.raw, "deed without position ignored");
			return None;
		};
		if !self.on_active_planet(&mut deed) {
			return None;
		}
		if deed.expiry.is_none() {
			deed.expiry = Some(now + self.settings.default_ttl);
		}
		let position = self.mapper.to_scene(lon, lat);

		let mut events = Vec::new();
		let id = {
			let mut state = self.state.lock().expect("marker lock poisoned");

			let near = state
				.markers
				.values()
				.map(|m| (m.position.distance(position, self.settings.metric), m.id.clone()))
				.filter(|(d, _)| *d <= self.settings.near_px)
				.min_by(|a, b| a.0.total_cmp(&b.0))
				.map(|(_, id)| id);

			let found = match &near {
				Some(id) => state.markers.get_mut(id),
				None => None,
			};
			match found {
				Some(marker) => {
					if let Some(label) = deed.label() {
						marker.label = label;
					}
					if deed.expiry > marker.deed.expiry {
						marker.deed = deed;
					} else {
						tracing::debug!(id = %marker.id, "stale read does not shorten countdown");
					}
					events.push(Event::DeedMarkerUpdated(marker.view()));
					marker.id.clone()
				}
				None => {
					let id = format!("{lon}-{lat}-{}", state.seq);
					state.seq += 1;
					let marker = Marker {
						id: id.clone(),
						position,
						radius: self.settings.radius,
						label: deed.label().unwrap_or_default(),
						deed,
					};
					events.push(Event::DeedMarkerAdded(marker.view()));
					state.markers.insert(id.clone(), marker);
					id
				}
			}
		};

		self.publish_all(events);
		Some(id)
	}

	/// Drop expired markers and report the countdown of the rest.
	pub fn tick(&self, now: Instant) {
		let mut events = Vec::new();
		{
			let mut state = self.state.lock().expect("marker lock poisoned");
			let mut expired = Vec::new();
			for marker in state.markers.values() {
				let remaining = marker.deed.remaining_seconds_at(now).unwrap_or(0);
				if remaining == 0 {
					expired.push(marker.id.clone());
				} else {
					events.push(Event::DeedMarkerTick { id: marker.id.clone(), remaining_seconds: remaining });
				}
			}
			for id in expired {
				if state.markers.remove(&id).is_some() {
					tracing::info!(%id, "deed expired");
					events.push(Event::DeedMarkerRemoved { id });
				}
			}
		}
		self.publish_all(events);
	}

	/// Remove the marker nearest to `reference` if it lies within the
	/// depletion distance.
	pub fn remove_nearest(&self, reference: ScenePoint) -> Option<String> {
		let removed = {
			let mut state = self.state.lock().expect("marker lock poisoned");
			let nearest = state
				.markers
				.values()
				.map(|m| (m.position.distance(reference, DistanceMetric::Euclidean), m.id.clone()))
				.min_by(|a, b| a.0.total_cmp(&b.0));

			match nearest {
				Some((distance, id)) if distance <= self.settings.depletion_max_distance => {
					state.markers.remove(&id).map(|_| id)
				}
				Some((distance, id)) => {
					tracing::debug!(%id, distance, "nearest marker too far to be the depleted one");
					None
				}
				None => None,
			}
		};

		if let Some(id) = &removed {
			tracing::info!(%id, "deed depleted");
			self.bus.publish(Event::DeedMarkerRemoved { id: id.clone() });
		}
		removed
	}

	pub fn set_player_point(&self, point: ScenePoint) {
		self.state.lock().expect("marker lock poisoned").player = Some(point);
	}

	pub fn remove_nearest_to_player(&self) -> Option<String> {
		let player = self.state.lock().expect("marker lock poisoned").player;
		match player {
			Some(point) => self.remove_nearest(point),
			None => {
				tracing::warn!("resource depleted before any player position was read");
				None
			}
		}
	}

	pub fn snapshot(&self) -> Vec<MarkerView> {
		let state = self.state.lock().expect("marker lock poisoned");
		let mut views: Vec<MarkerView> = state.markers.values().map(Marker::view).collect();
		views.sort_by(|a, b| a.id.cmp(&b.id));
		views
	}

	pub fn len(&self) -> usize {
		self.state.lock().expect("marker lock poisoned").markers.len()
	}
}
