//! Application wiring.
//!
//! Owns the services and the worker threads. Workers only publish to the bus;
//! one dispatcher thread consumes the events that mutate state, so the
//! lifecycle manager and the tracker never run inside a scanner thread.

use std::path::Path;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use data::CoordinateMapper;
use ie::screen::compass::{CompassLocator, CompassTemplates};
use ie::screen::deed::DeedPanel;
use ie::VisionError;

use crate::bus::{Event, EventBus, Topic};
use crate::capture::{CaptureSource, WindowCapture};
use crate::config::{Config, PositionScannerConfig};
use crate::lifecycle::{DeedLifecycleManager, LifecycleSettings, MarkerView};
use crate::player::PlayerPositionTracker;
use crate::scanner::{is_depletion, ChatLogListener, DeedScanner, DeedTrigger, PositionScanner};
use crate::util::assets::resolve_asset;
use crate::worker::{StopToken, Worker};

const DISPATCH_WAKE: Duration = Duration::from_millis(100);
const CHAT_LOG_POLL: Duration = Duration::from_millis(100);

pub struct App {
	bus: EventBus,
	lifecycle: Arc<DeedLifecycleManager>,
	tracker: Arc<PlayerPositionTracker>,
	deed_trigger: DeedTrigger,
	workers: Vec<Worker>,
}

impl App {
	/// Start every worker against the live game window.
	pub fn start(config: &Config) -> Result<Self> {
		let ie = ie::Ie::try_with_tesseract(config.tesseract.as_deref(), DeedPanel::new(config.deed_scanner.panel))
			.context("OCR engine unavailable")?;
		let locator = compass_locator(&config.position_scanner)?;
		let title = config.window_title.clone();
		Self::start_with(config, Arc::new(ie), locator, move || Box::new(WindowCapture::new(title.clone())))
	}

	/// Start with explicit OCR, compass locator and capture sources.
	pub fn start_with(
		config: &Config,
		ie: Arc<ie::Ie>,
		locator: CompassLocator,
		capture: impl Fn() -> Box<dyn CaptureSource>,
	) -> Result<Self> {
		let planet = config.planet()?;
		let mapper = CoordinateMapper::new(planet)
			.with_context(|| format!("calibration of {:?} is unusable", config.active_planet))?;
		tracing::info!(planet = %config.active_planet, width = planet.map_width(), height = planet.map_height(), "map calibrated");

		let bus = EventBus::new();
		let settings = LifecycleSettings::new(
			&config.markers,
			config.active_planet.clone(),
			config.planets.keys().cloned().collect(),
		);
		let lifecycle = Arc::new(DeedLifecycleManager::new(mapper, settings, bus.clone()));
		let tracker = Arc::new(PlayerPositionTracker::new(mapper, config.player.radius_coord, bus.clone()));

		let mut workers = Vec::new();

		let events = bus.subscribe(&[
			Topic::DeedFound,
			Topic::PlayerPositionParsed,
			Topic::PlayerPositionChanged,
			Topic::SystemMessage,
			Topic::ResourceDepleted,
		]);
		let dispatcher = Dispatcher { bus: bus.clone(), lifecycle: lifecycle.clone(), tracker: tracker.clone() };
		workers.push(Worker::spawn("dispatcher", move |token| dispatcher.run(events, &token)).context("spawn dispatcher")?);

		let ticker = lifecycle.clone();
		let interval = config.tick_interval();
		workers.push(
			Worker::spawn("ticker", move |token| {
				while !token.sleep(interval) {
					ticker.tick(Instant::now());
				}
			})
			.context("spawn ticker")?,
		);

		let (deed_worker, deed_trigger) = DeedScanner::new(
			capture(),
			ie.clone(),
			config.deed_scanner.corner,
			Duration::from_millis(config.deed_scanner.cooldown_ms),
			bus.clone(),
		)
		.spawn()
		.context("spawn deed scanner")?;
		workers.push(deed_worker);

		let position = PositionScanner::new(
			capture(),
			ie,
			locator,
			config.position_scanner.compass,
			config.position_scanner.poll_interval(),
			bus.clone(),
		);
		workers.push(position.spawn().context("spawn position scanner")?);

		match &config.chat_log {
			Some(path) => {
				let listener = ChatLogListener::new(path, CHAT_LOG_POLL, bus.clone());
				workers.push(listener.spawn().context("spawn chat log listener")?);
			}
			None => tracing::info!("no chat log configured; depletion tracking disabled"),
		}

		Ok(Self { bus, lifecycle, tracker, deed_trigger, workers })
	}

	pub fn bus(&self) -> &EventBus {
		&self.bus
	}

	/// Request a deed panel scan. Returns `false` if the scanner is gone.
	pub fn trigger_deed_scan(&self) -> bool {
		self.deed_trigger.fire()
	}

	pub fn markers(&self) -> Vec<MarkerView> {
		self.lifecycle.snapshot()
	}

	pub fn player(&self) -> Option<data::PlayerPosition> {
		self.tracker.current()
	}

	/// Stop every worker and wait for them, in reverse start order.
	pub fn shutdown(mut self) {
		for worker in self.workers.iter() {
			worker.stop();
		}
		while let Some(worker) = self.workers.pop() {
			let name = worker.name().to_string();
			worker.join();
			tracing::debug!(worker = %name, "joined");
		}
	}
}

/// Template mode when both assets exist, fixed rectangle when either is
/// missing. An asset that exists but does not decode is an error.
fn compass_locator(cfg: &PositionScannerConfig) -> Result<CompassLocator> {
	let (radar, coords) = match (resolve_asset(&cfg.radar_template), resolve_asset(&cfg.coords_template)) {
		(Ok(radar), Ok(coords)) => (radar, coords),
		(Err(err), _) | (_, Err(err)) => {
			tracing::warn!("compass templates unavailable, using the fixed readout rectangle: {err:#}");
			return Ok(CompassLocator::fixed(cfg.coords_roi));
		}
	};
	let templates = load_templates(&radar, &coords).context("compass template is unreadable")?;
	Ok(CompassLocator::with_templates(templates, cfg.locate_params(), cfg.relocate_after))
}

fn load_templates(radar: &Path, coords: &Path) -> Result<CompassTemplates, VisionError> {
	Ok(CompassTemplates { radar: ie::Template::load(radar)?, coords: ie::Template::load(coords)? })
}

struct Dispatcher {
	bus: EventBus,
	lifecycle: Arc<DeedLifecycleManager>,
	tracker: Arc<PlayerPositionTracker>,
}

impl Dispatcher {
	fn run(&self, events: Receiver<Event>, token: &StopToken) {
		while !token.is_stopped() {
			match events.recv_timeout(DISPATCH_WAKE) {
				Ok(event) => self.route(event),
				Err(RecvTimeoutError::Timeout) => {}
				Err(RecvTimeoutError::Disconnected) => break,
			}
		}
	}

	fn route(&self, event: Event) {
		match event {
			Event::DeedFound(deed) => {
				self.lifecycle.ingest(deed, Instant::now());
			}
			Event::PlayerPositionParsed { lon, lat } => self.tracker.update(lon, lat),
			Event::PlayerPositionChanged { point, .. } => self.lifecycle.set_player_point(point),
			Event::SystemMessage(text) => {
				if is_depletion(&text) {
					self.bus.publish(Event::ResourceDepleted(text));
				}
			}
			Event::ResourceDepleted(_) => {
				self.lifecycle.remove_nearest_to_player();
			}
			other => tracing::trace!(topic = ?other.topic(), "not routed"),
		}
	}
}
