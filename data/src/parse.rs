//! Regex extraction of deed and compass fields from OCR text.
//!
//! Parsers never fail: a field that no pattern matched is left unset.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::Deed;

static RE_DEPTH: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?im)^Depth:\s*([0-9]{1,4})\s*m$").unwrap());
static RE_SIZE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?im)^Size:\s*([A-Za-z]+)\s*\((\d+)\)$").unwrap());
static RE_RESOURCE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?im)^Resource:\s*([A-Za-z][A-Za-z \-']+)$").unwrap());
static RE_TIME: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?im)^Time\s*left:\s*([0-2]?\d:[0-5]\d:[0-5]\d)$").unwrap());
static RE_POS_WITH_PLANET: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?im)^Position:\s*([A-Za-z]+)\s*\(\s*(\d{3,6})\s*,\s*(\d{3,6})\s*,\s*(\d{1,4})\s*\)$").unwrap()
});
static RE_POS_NUMBERS_ONLY: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?im)^Position:\s*\(\s*(\d{3,6})\s*,\s*(\d{3,6})\s*,\s*(\d{1,4})\s*\)$").unwrap()
});
static RE_LONLAT: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)Lon:\s*(\d{1,6})[\s,;]+Lat:\s*(\d{1,6})").unwrap());

const POSITION_LABEL: &str = "position:";

/// Joins a `Position:` line with the following line when OCR wrapped the field.
/// A label line that already closes its coordinate tuple is left alone.
fn merge_position_lines(lines: Vec<&str>) -> Vec<String> {
	let mut merged = Vec::with_capacity(lines.len());
	let mut iter = lines.into_iter().peekable();
	while let Some(line) = iter.next() {
		let is_label = line
			.get(..POSITION_LABEL.len())
			.is_some_and(|head| head.eq_ignore_ascii_case(POSITION_LABEL));
		if is_label
			&& !line.contains(')')
			&& let Some(next) = iter.peek()
			&& next.chars().any(|c| c.is_ascii_digit() || c == ',' || c == ')')
		{
			merged.push(format!("{line} {next}"));
			iter.next();
			continue;
		}
		merged.push(line.to_owned());
	}
	merged
}

/// Normalizes OCR text into the blob the field patterns run against.
pub fn normalize_lines(text: &str) -> String {
	let lines = text
		.split('\n')
		.map(|line| line.trim_matches(|c: char| c.is_whitespace()))
		.filter(|line| !line.is_empty())
		.collect::<Vec<_>>();
	merge_position_lines(lines).join("\n")
}

fn title_case(word: &str) -> String {
	let lower = word.to_lowercase();
	let mut chars = lower.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

/// Parses `H:MM:SS` / `HH:MM:SS`.
pub fn parse_countdown(text: &str) -> Option<Duration> {
	let mut parts = text.trim().splitn(3, ':');
	let h: u64 = parts.next()?.parse().ok()?;
	let m: u64 = parts.next()?.parse().ok()?;
	let s: u64 = parts.next()?.parse().ok()?;
	if m >= 60 || s >= 60 {
		return None;
	}
	Some(Duration::from_secs(h * 3600 + m * 60 + s))
}

/// Parses a deed panel, reading the countdown against the current monotonic clock.
pub fn parse_deed(text: &str) -> Deed {
	parse_deed_at(text, Instant::now())
}

/// Parses a deed panel with an explicit clock reading for the countdown.
pub fn parse_deed_at(text: &str, now: Instant) -> Deed {
	let blob = normalize_lines(&text.replace('\r', ""));
	let mut deed = Deed::default();

	if let Some(c) = RE_DEPTH.captures(&blob) {
		deed.depth_m = c[1].parse().ok();
	}

	if let Some(c) = RE_SIZE.captures(&blob) {
		deed.size_label = Some(title_case(&c[1]));
		deed.size_points = c[2].parse().ok();
	}

	if let Some(c) = RE_RESOURCE.captures(&blob) {
		deed.resource = Some(c[1].split_whitespace().collect::<Vec<_>>().join(" "));
	}

	if let Some(c) = RE_TIME.captures(&blob) {
		deed.expiry = parse_countdown(&c[1]).map(|ttl| now + ttl);
	}

	if let Some(c) = RE_POS_WITH_PLANET.captures(&blob) {
		deed.planet = Some(title_case(&c[1]));
		deed.x = c[2].parse().ok();
		deed.y = c[3].parse().ok();
		deed.z = c[4].parse().ok();
	} else if let Some(c) = RE_POS_NUMBERS_ONLY.captures(&blob) {
		deed.x = c[1].parse().ok();
		deed.y = c[2].parse().ok();
		deed.z = c[3].parse().ok();
	}

	if deed.position().is_none() {
		log::debug!("deed text has no readable position: {blob:?}");
	}

	deed.raw = blob;
	deed
}

/// Extracts `(lon, lat)` from the compass coordinate readout.
pub fn parse_position(text: &str) -> Option<(i32, i32)> {
	let c = RE_LONLAT.captures(text)?;
	Some((c[1].parse().ok()?, c[2].parse().ok()?))
}
