//! Game chat log tail.
//!
//! The file is read from its end on start; only lines written afterwards are
//! considered. A file watcher wakes the reader on writes, and a short poll
//! covers platforms where change notifications are unreliable.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecursiveMode, Watcher};
use regex::Regex;

use crate::bus::{Event, EventBus};
use crate::worker::{StopToken, Worker};

static RE_CHAT_LINE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} \[(?P<channel>\S+)\] .+$").unwrap()
});

const DEPLETED: &str = "resource is depleted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine<'a> {
	pub channel: &'a str,
	/// The whole trimmed line.
	pub line: &'a str,
}

impl ChatLine<'_> {
	pub fn is_system(&self) -> bool {
		self.channel.eq_ignore_ascii_case("system")
	}
}

pub fn parse_chat_line(line: &str) -> Option<ChatLine<'_>> {
	let line = line.trim();
	let caps = RE_CHAT_LINE.captures(line)?;
	let channel = caps.name("channel")?.as_str();
	Some(ChatLine { channel, line })
}

pub fn is_depletion(text: &str) -> bool {
	text.to_lowercase().contains(DEPLETED)
}

pub struct ChatLogListener {
	path: PathBuf,
	poll: Duration,
	bus: EventBus,
}

impl ChatLogListener {
	pub fn new(path: impl Into<PathBuf>, poll: Duration, bus: EventBus) -> Self {
		Self { path: path.into(), poll, bus }
	}

	pub fn spawn(self) -> std::io::Result<Worker> {
		Worker::spawn("chat-log", move |token| {
			if let Err(err) = self.run(&token) {
				tracing::error!("chat log listener stopped: {err:#}");
			}
		})
	}

	fn run(&self, token: &StopToken) -> Result<()> {
		let mut offset = File::open(&self.path)
			.and_then(|mut f| f.seek(SeekFrom::End(0)))
			.with_context(|| format!("open {:?}", self.path))?;

		let (tx, rx) = channel();
		let watched = self.path.clone();
		let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| match result {
			Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
				let _ = tx.send(());
			}
			Ok(_) => {}
			Err(err) => tracing::debug!(path = ?watched, "chat log watcher error: {err}"),
		})
		.context("create file watcher")?;
		if let Err(err) = watcher.watch(&self.path, RecursiveMode::NonRecursive) {
			tracing::warn!("watching {:?} failed, polling only: {err}", self.path);
		}

		tracing::info!(path = ?self.path, "tailing chat log");
		while !token.is_stopped() {
			match rx.recv_timeout(self.poll) {
				Ok(()) | Err(RecvTimeoutError::Timeout) => {}
				Err(RecvTimeoutError::Disconnected) => {
					if token.sleep(self.poll) {
						break;
					}
				}
			}
			if let Err(err) = read_new_lines(&self.path, &mut offset, |line| self.dispatch(line)) {
				tracing::warn!("reading chat log failed: {err:#}");
			}
		}
		Ok(())
	}

	fn dispatch(&self, raw: &str) {
		if let Some(line) = parse_chat_line(raw)
			&& line.is_system()
		{
			self.bus.publish(Event::SystemMessage(line.line.to_string()));
		}
	}
}

/// Read complete lines after `offset`, advancing it. A file shorter than the
/// offset was rotated and is read from the start.
fn read_new_lines(path: &Path, offset: &mut u64, mut on_line: impl FnMut(&str)) -> Result<()> {
	let mut file = File::open(path).with_context(|| format!("open {:?}", path))?;
	let len = file.metadata().context("stat chat log")?.len();
	if len < *offset {
		*offset = 0;
	}
	file.seek(SeekFrom::Start(*offset)).context("seek chat log")?;

	let mut reader = BufReader::new(file);
	let mut buf = Vec::new();
	loop {
		buf.clear();
		let n = reader.read_until(b'\n', &mut buf).context("read chat log")?;
		// Partial lines are left for the next round.
		if n == 0 || buf.last() != Some(&b'\n') {
			break;
		}
		*offset += n as u64;
		on_line(&String::from_utf8_lossy(&buf));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bus::Topic;
	use std::io::Write;

	#[test]
	fn parses_channel_lines() {
		let line = parse_chat_line("2024-03-01 12:30:05 [System] [] This resource is depleted\r\n").unwrap();
		assert_eq!(line.channel, "System");
		assert!(line.is_system());
		assert_eq!(line.line, "2024-03-01 12:30:05 [System] [] This resource is depleted");

		assert!(!parse_chat_line("2024-03-01 12:30:05 [Globals] [] Someone found something").unwrap().is_system());
		assert!(parse_chat_line("not a chat line").is_none());
		assert!(parse_chat_line("2024-03-01 12:30 [System] x").is_none());
	}

	#[test]
	fn depletion_is_case_insensitive() {
		assert!(is_depletion("This Resource Is Depleted"));
		assert!(!is_depletion("You received Animal Oil"));
	}

	#[test]
	fn reads_only_complete_new_lines() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "old line\n").unwrap();
		let mut offset = file.as_file().metadata().unwrap().len();

		write!(file, "first\nsecond\npart").unwrap();
		file.flush().unwrap();

		let mut lines = Vec::new();
		read_new_lines(file.path(), &mut offset, |l| lines.push(l.trim().to_string())).unwrap();
		assert_eq!(lines, ["first", "second"]);

		write!(file, "ial\n").unwrap();
		file.flush().unwrap();
		lines.clear();
		read_new_lines(file.path(), &mut offset, |l| lines.push(l.trim().to_string())).unwrap();
		assert_eq!(lines, ["partial"]);
	}

	#[test]
	fn truncated_file_restarts_from_the_top() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "fresh\n").unwrap();
		file.flush().unwrap();
		let mut offset = 1_000;
		let mut lines = Vec::new();
		read_new_lines(file.path(), &mut offset, |l| lines.push(l.trim().to_string())).unwrap();
		assert_eq!(lines, ["fresh"]);
	}

	#[test]
	fn listener_publishes_new_system_lines() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "2024-03-01 12:00:00 [System] [] Old news, resource is depleted").unwrap();
		file.flush().unwrap();

		let bus = EventBus::new();
		let rx = bus.subscribe(&[Topic::SystemMessage]);
		let worker = ChatLogListener::new(file.path(), Duration::from_millis(20), bus).spawn().unwrap();
		std::thread::sleep(Duration::from_millis(200));

		writeln!(file, "2024-03-01 12:00:01 [Globals] [] Not for us").unwrap();
		writeln!(file, "2024-03-01 12:00:02 [System] [] This resource is depleted").unwrap();
		file.flush().unwrap();

		let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
		assert!(matches!(event, Event::SystemMessage(ref t) if t.ends_with("This resource is depleted")));
		worker.join();
		assert!(rx.try_recv().is_err());
	}
}
