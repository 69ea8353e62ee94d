//! Receiver configuration.
//!
//! One immutable [`TunerConfig`] is handed to every component at construction.
//! Config files are TOML; every field is optional and falls back to its default.
//!
//! ```toml
//! top_k = 2
//! fade_duration_ms = 800
//!
//! [whistle]
//! ceiling_hz = 6000.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Upper bound of the dial; the lower bound is 0.
    pub max_dial: f32,
    /// Maximum number of station sources playing at once.
    pub top_k: usize,
    /// Create every source at init instead of on first selection.
    pub preload_sources: bool,
    #[serde(rename = "fade_duration_ms", with = "millis")]
    pub fade_duration: Duration,
    #[serde(rename = "fade_interval_ms", with = "millis")]
    pub fade_interval: Duration,
    /// A source that has not reported loaded by then is force-marked ready.
    #[serde(rename = "ready_timeout_ms", with = "millis")]
    pub ready_timeout: Duration,
    #[serde(rename = "play_retry_delay_ms", with = "millis")]
    pub play_retry_delay: Duration,
    pub noise: NoiseConfig,
    pub whistle: WhistleConfig,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            max_dial: 100.0,
            top_k: 3,
            preload_sources: false,
            fade_duration: Duration::from_millis(1500),
            fade_interval: Duration::from_millis(16),
            ready_timeout: Duration::from_secs(5),
            play_retry_delay: Duration::from_millis(250),
            noise: NoiseConfig::default(),
            whistle: WhistleConfig::default(),
        }
    }
}

/// Levels of the two noise beds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Ether level when nothing is tuned in.
    pub max_ether_volume: f32,
    /// Constant bed, scaled only by master volume.
    pub background_volume: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            max_ether_volume: 0.35,
            background_volume: 0.03,
        }
    }
}

/// Heterodyne whistle parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhistleConfig {
    pub enabled: bool,
    /// No whistle closer than this to a station's center (dial units).
    pub deadband: f32,
    pub scale_hz_per_unit: f32,
    /// Whistle pitch safety ceiling; above it gain is reduced by `sqrt(ceiling / f)`.
    pub ceiling_hz: f32,
    pub max_gain: f32,
    /// Width of the edge Gaussian (dial units).
    pub edge_width: f32,
    pub max_simultaneous: usize,
    /// Ceiling on the summed gain of all audible whistles.
    pub total_gain_ceiling: f32,
    #[serde(rename = "ramp_time_constant_ms", with = "millis")]
    pub ramp_time_constant: Duration,
    /// Hard clamp applied to every frequency sent to an oscillator.
    pub max_audio_hz: f32,
}

impl Default for WhistleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            deadband: 0.25,
            scale_hz_per_unit: 1000.0,
            ceiling_hz: 8000.0,
            max_gain: 0.06,
            edge_width: 1.5,
            max_simultaneous: 3,
            total_gain_ceiling: 0.1,
            ramp_time_constant: Duration::from_millis(60),
            max_audio_hz: 20_000.0,
        }
    }
}

impl TunerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TunerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_dial.is_finite() && self.max_dial > 0.0) {
            return Err(invalid(format!("max_dial {} must be positive", self.max_dial)));
        }
        if self.top_k == 0 {
            return Err(invalid("top_k must be at least 1".into()));
        }
        if self.fade_interval.is_zero() {
            return Err(invalid("fade_interval must be non-zero".into()));
        }
        if self.ready_timeout.is_zero() {
            return Err(invalid("ready_timeout must be non-zero".into()));
        }
        check_unit("noise.max_ether_volume", self.noise.max_ether_volume)?;
        check_unit("noise.background_volume", self.noise.background_volume)?;

        let w = &self.whistle;
        check_positive("whistle.scale_hz_per_unit", w.scale_hz_per_unit)?;
        check_positive("whistle.ceiling_hz", w.ceiling_hz)?;
        check_positive("whistle.edge_width", w.edge_width)?;
        check_positive("whistle.total_gain_ceiling", w.total_gain_ceiling)?;
        check_positive("whistle.max_audio_hz", w.max_audio_hz)?;
        check_unit("whistle.max_gain", w.max_gain)?;
        if !(w.deadband.is_finite() && w.deadband >= 0.0) {
            return Err(invalid(format!("whistle.deadband {} must be >= 0", w.deadband)));
        }
        if w.ramp_time_constant.is_zero() {
            return Err(invalid("whistle.ramp_time_constant must be non-zero".into()));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> Error {
    Error::InvalidConfig(msg)
}

fn check_positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} {value} must be positive")))
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} {value} out of range (0-1)")))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
