//! Configuration for the player core
//!
//! Compile-time constants grouped by concern, plus the serde-backed
//! `PlayerConfig` handed to `RadioPlayer::mount`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PlayerError, Result};
use crate::media::{CrossOrigin, MediaSource, Preload};

/// Audio-processing configuration
pub mod audio {
    /// Analyzer FFT window size
    pub const FFT_SIZE: usize = 512;

    /// Number of frequency bins exposed by the analyzer (half the FFT size)
    pub const FREQUENCY_BIN_COUNT: usize = FFT_SIZE / 2;

    /// Analyzer smoothing between successive frames (0.0-1.0, higher = slower)
    pub const SMOOTHING_TIME_CONSTANT: f32 = 0.85;

    /// Magnitude mapped to byte 0
    pub const MIN_DECIBELS: f32 = -100.0;

    /// Magnitude mapped to byte 255
    pub const MAX_DECIBELS: f32 = -30.0;

    /// Volume restored on unmute when nothing better is remembered
    pub const DEFAULT_VOLUME: f32 = 0.7;
}

/// Equalizer configuration
pub mod eq {
    /// Number of equalizer bands
    pub const BAND_COUNT: usize = 5;

    /// Lowest allowed band gain in dB
    pub const MIN_GAIN_DB: f32 = -12.0;

    /// Highest allowed band gain in dB
    pub const MAX_GAIN_DB: f32 = 12.0;

    /// Slider step in dB
    pub const GAIN_STEP_DB: f32 = 1.0;

    /// Q factor of peaking stages
    pub const PEAKING_Q: f32 = 1.0;

    /// Q of shelving stages (shelf slope S = 1)
    pub const SHELF_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

    /// Audio frames between checks for changed band gains
    pub const PARAM_REFRESH_FRAMES: usize = 64;
}

/// Reconnection configuration
pub mod reconnect {
    /// Delay before retrying after a network-class failure
    pub const RECONNECT_DELAY_MS: u64 = 3000;
}

/// Network-related configuration
pub mod network {
    /// User agent for stream requests
    pub const USER_AGENT: &str = concat!("Airwave/", env!("CARGO_PKG_VERSION"));

    /// Connection timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Maximum time to connect and detect the stream format
    pub const OPEN_TIMEOUT_SECS: u64 = 20;
}

/// Network read-ahead between the HTTP response and the decoder
pub mod buffer {
    /// Chunk size for producer reads from the response (bytes)
    pub const PRODUCER_CHUNK_SIZE: usize = 8 * 1024;

    /// Chunks the producer may queue ahead of the decoder (512 KiB)
    pub const PRODUCER_QUEUE_CHUNKS: usize = 64;

    /// Maximum time the consumer blocks before rechecking for cancellation
    pub const CONSUMER_WAIT_TIMEOUT_MS: u64 = 500;
}

/// Stream element timing
pub mod timeouts {
    /// Engine thread tick when idle
    pub const ENGINE_TICK_MS: u64 = 100;

    /// Time without decoded audio before the stream counts as stalled
    pub const STALL_TIMEOUT_MS: u64 = 2500;
}

/// Spectrum renderer configuration
pub mod visual {
    /// Fraction of the canvas height a full-scale bin may occupy
    pub const BAR_HEADROOM: f32 = 0.9;

    /// Relative height above which a bar is drawn in the mid tier
    pub const MID_TIER: f32 = 0.4;

    /// Relative height above which a bar is drawn in the high tier
    pub const HIGH_TIER: f32 = 0.7;
}

/// Player configuration (mount-time properties)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Stream URL (required)
    pub stream_url: String,

    // === Display metadata ===
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_station")]
    pub station: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork: Option<String>,

    // === Behaviour ===
    /// Start playing after the first user interaction
    #[serde(default)]
    pub auto_play: bool,

    /// Mount the spectrum renderer
    #[serde(default = "default_true")]
    pub show_visualizer: bool,

    /// Mount the equalizer control surface
    #[serde(default = "default_true")]
    pub show_equalizer: bool,

    /// Initial volume (0.0 - 1.0)
    #[serde(default = "default_volume")]
    pub initial_volume: f32,

    // === Media element ===
    #[serde(default)]
    pub preload: Preload,

    #[serde(default)]
    pub cross_origin: CrossOrigin,

    // === Reconnection ===
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Stop retrying after this many consecutive attempts (unbounded when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,
}

fn default_title() -> String {
    "Live Radio Stream".to_string()
}

fn default_station() -> String {
    "My Radio Station".to_string()
}

fn default_true() -> bool {
    true
}

fn default_volume() -> f32 {
    audio::DEFAULT_VOLUME
}

fn default_reconnect_delay_ms() -> u64 {
    reconnect::RECONNECT_DELAY_MS
}

impl PlayerConfig {
    /// Config for the given stream with every other field at its default
    pub fn new(stream_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            title: default_title(),
            station: default_station(),
            artwork: None,
            auto_play: false,
            show_visualizer: true,
            show_equalizer: true,
            initial_volume: default_volume(),
            preload: Preload::default(),
            cross_origin: CrossOrigin::default(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: None,
        }
    }

    /// Load a config from a JSON file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PlayerError::Config(format!("Config file not found: {:?}", path)),
            ErrorKind::PermissionDenied => {
                PlayerError::Config(format!("Permission denied: cannot read {:?}", path))
            }
            _ => PlayerError::Io(e),
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config as pretty-printed JSON
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject configs the player cannot mount
    pub fn validate(&self) -> Result<()> {
        if self.stream_url.trim().is_empty() {
            return Err(PlayerError::Config("stream_url must not be empty".to_string()));
        }
        if !self.initial_volume.is_finite() {
            return Err(PlayerError::Config("initial_volume must be a number".to_string()));
        }
        Ok(())
    }

    /// The media source described by this config
    pub fn media_source(&self) -> MediaSource {
        MediaSource {
            url: self.stream_url.clone(),
            preload: self.preload,
            cross_origin: self.cross_origin,
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
