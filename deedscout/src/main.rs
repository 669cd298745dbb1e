//! deedscout: headless runner.
//!
//! Starts the scanners and prints every published event. Commands on stdin:
//! `scan` reads the deed panel, `markers` lists live markers, `quit` exits.

mod app;
mod bus;
mod capture;
mod config;
mod lifecycle;
mod player;
mod scanner;
mod util;
mod worker;

use std::io::BufRead;

use bus::{Event, Topic};

fn main() -> anyhow::Result<()> {
	// Structured logging. Use `RUST_LOG=info` etc.
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let config = config::Config::load_or_default();
	let app = app::App::start(&config)?;
	app.bus().on(&Topic::ALL, log_event);

	tracing::info!("ready; commands: scan, markers, quit");
	for line in std::io::stdin().lock().lines() {
		let line = line?;
		match line.trim() {
			"scan" => {
				if !app.trigger_deed_scan() {
					tracing::warn!("deed scanner is not running");
				}
			}
			"markers" => {
				for marker in app.markers() {
					println!(
						"{}\t{:.1},{:.1}\t{}\t{}",
						marker.id,
						marker.position.x,
						marker.position.y,
						marker.deed.formatted_remaining().unwrap_or_default(),
						marker.label
					);
				}
			}
			"quit" | "exit" => break,
			"" => {}
			other => tracing::warn!(command = other, "unknown command"),
		}
	}

	app.shutdown();
	Ok(())
}

fn log_event(event: &Event) {
	match event {
		Event::DeedFound(deed) => tracing::info!(position = ?deed.position(), label = ?deed.label(), "deed found"),
		Event::DeedMarkerAdded(m) => tracing::info!(id = %m.id, x = m.position.x, y = m.position.y, label = %m.label, "marker added"),
		Event::DeedMarkerUpdated(m) => tracing::info!(id = %m.id, label = %m.label, "marker updated"),
		Event::DeedMarkerRemoved { id } => tracing::info!(%id, "marker removed"),
		Event::DeedMarkerTick { id, remaining_seconds } => {
			tracing::debug!(%id, remaining = %data::format_hms(*remaining_seconds), "tick")
		}
		Event::PlayerPositionParsed { lon, lat } => tracing::debug!(lon, lat, "compass read"),
		Event::PlayerPositionChanged { point, rect } => {
			tracing::info!(x = point.x, y = point.y, radius = rect.width / 2.0, "player position")
		}
		Event::SystemMessage(text) => tracing::info!(%text, "system message"),
		Event::ResourceDepleted(text) => tracing::info!(%text, "resource depleted"),
	}
}
