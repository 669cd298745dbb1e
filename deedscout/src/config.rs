//! Persistent application configuration.
//!
//! Stored as JSON in a platform-appropriate config directory. The
//! `DEEDSCOUT_CONFIG` environment variable points at an alternative file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use data::{DistanceMetric, PlanetBounds, PlanetConfig};
use serde::{Deserialize, Serialize};

use crate::capture::{Anchor, Region};

const CONFIG_ENV: &str = "DEEDSCOUT_CONFIG";

/// On-disk configuration for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Case-insensitive substring of the game window title.
    pub window_title: String,

    /// Key into `planets` for the map currently being played.
    pub active_planet: String,

    /// Edge length of one map tile in scene pixels.
    pub tile_size: u32,

    pub planets: BTreeMap<String, PlanetBounds>,

    pub deed_scanner: DeedScannerConfig,
    pub position_scanner: PositionScannerConfig,
    pub markers: MarkerConfig,
    pub player: PlayerConfig,

    /// Game chat log. Depletion messages are only tracked when this is set.
    pub chat_log: Option<PathBuf>,

    /// Explicit tesseract executable; otherwise it is searched for.
    pub tesseract: Option<PathBuf>,

    /// How often marker countdowns are advanced.
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeedScannerConfig {
    /// Capture of the window corner holding the deed panel.
    pub corner: Region,
    /// Text block inside `corner`.
    pub panel: ie::Rect,
    /// Triggers arriving sooner than this after a scan are dropped.
    pub cooldown_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionScannerConfig {
    pub compass: Region,
    /// Readout rectangle inside `compass`, used when the templates are unavailable.
    pub coords_roi: ie::Rect,
    pub poll_interval_ms: u64,
    pub radar_template: PathBuf,
    pub coords_template: PathBuf,
    pub threshold: f32,
    pub scale_low: f32,
    pub scale_high: f32,
    pub scale_step: f32,
    /// Consecutive unreadable frames before the readout is searched for again.
    pub relocate_after: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Detections closer than this to an existing marker update it.
    pub near_px: f64,
    pub metric: DistanceMetric,
    /// Drawn radius of a deed marker, in scene units.
    pub radius: f64,
    /// Lifetime given to deeds that carry no countdown.
    pub default_ttl_s: u64,
    /// A depletion only removes a marker within this distance of the player.
    pub depletion_max_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Radius around the player, in planet coordinates.
    pub radius_coord: f64,
}

impl Default for Config {
    fn default() -> Self {
        let planets = BTreeMap::from([
            (
                "Arkadia".to_string(),
                PlanetBounds {
                    min_lon: 8192,
                    max_lon: 40960,
                    min_lat: 8192,
                    max_lat: 40960,
                    tile_count_x: 4,
                    tile_count_y: 4,
                },
            ),
            (
                "Rocktropia".to_string(),
                PlanetBounds {
                    min_lon: 131072,
                    max_lon: 147456,
                    min_lat: 73728,
                    max_lat: 90112,
                    tile_count_x: 2,
                    tile_count_y: 2,
                },
            ),
        ]);

        Self {
            window_title: "Entropia Universe".to_string(),
            active_planet: "Rocktropia".to_string(),
            tile_size: 512,
            planets,
            deed_scanner: DeedScannerConfig::default(),
            position_scanner: PositionScannerConfig::default(),
            markers: MarkerConfig::default(),
            player: PlayerConfig::default(),
            chat_log: None,
            tesseract: None,
            tick_interval_ms: 1000,
        }
    }
}

impl Default for DeedScannerConfig {
    fn default() -> Self {
        Self {
            corner: Region::new(Anchor::TopLeft, 0, 0, 445, 445),
            panel: ie::screen::deed::DEFAULT_PANEL,
            cooldown_ms: 500,
        }
    }
}

impl Default for PositionScannerConfig {
    fn default() -> Self {
        let params = ie::LocateParams::default();
        Self {
            compass: Region::new(Anchor::BottomRight, 8, 10, 370, 430),
            coords_roi: ie::screen::compass::DEFAULT_COORDS_ROI,
            poll_interval_ms: 800,
            radar_template: PathBuf::from("radar_template.png"),
            coords_template: PathBuf::from("coords_template.png"),
            threshold: params.threshold,
            scale_low: params.sweep.low,
            scale_high: params.sweep.high,
            scale_step: params.sweep.step,
            relocate_after: 5,
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            near_px: 10.0,
            metric: DistanceMetric::Manhattan,
            radius: 50.0,
            default_ttl_s: 5000,
            depletion_max_distance: 120.0,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self { radius_coord: 55.0 }
    }
}

impl PositionScannerConfig {
    pub fn locate_params(&self) -> ie::LocateParams {
        ie::LocateParams {
            threshold: self.threshold,
            sweep: ie::ScaleSweep { low: self.scale_low, high: self.scale_high, step: self.scale_step },
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Path to the config file.
    pub fn path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let base = dirs::config_dir().context("config_dir() unavailable")?;
        Ok(base.join("deedscout.json"))
    }

    /// Load configuration from disk, falling back to defaults on missing or invalid file.
    pub fn load_or_default() -> Self {
        match Self::try_load() {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load config; using defaults");
                Self::default()
            }
        }
    }

    /// Try to load configuration from disk.
    pub fn try_load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        let cfg = serde_json::from_str(&json).with_context(|| format!("parse {:?}", path))?;
        Ok(cfg)
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, json).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }

    /// Calibration of the active planet.
    pub fn planet(&self) -> Result<PlanetConfig> {
        let bounds = self.planets.get(&self.active_planet).with_context(|| {
            format!(
                "planet {:?} is not configured (known: {})",
                self.active_planet,
                self.planets.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })?;
        Ok(PlanetConfig::new(*bounds, self.tile_size))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
