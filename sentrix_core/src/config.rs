//! Workspace configuration, loaded from TOML.
//!
//! Every section falls back to its defaults, so an empty file is a valid
//! configuration:
//!
//! ```toml
//! [globe]
//! radius = 2.0
//!
//! [feed]
//! capacity = 20
//! target_label = "SENTRIX SYSTEM"
//!
//! [scene]
//! eviction = "fade_out"
//!
//! [runtime]
//! poll_interval_ms = 500
//! min_auto_select_level = "High"
//! ```

use crate::arc_animator::AnimationConfig;
use crate::arc_path::PathParams;
use crate::feed_controller::FeedConfig;
use crate::runtime::RuntimeConfig;
use crate::scene::SceneConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sphere geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobeConfig {
    /// Sphere radius in scene units (default: 2.0)
    pub radius: f64,
    /// Fixed arc lift above the surface (default: 0.15)
    pub base_altitude: f64,
    /// Arc lift per unit of chord distance (default: 0.2)
    pub altitude_factor: f64,
}

impl GlobeConfig {
    pub fn path_params(&self) -> PathParams {
        PathParams {
            base_altitude: self.base_altitude,
            altitude_factor: self.altitude_factor,
        }
    }
}

impl Default for GlobeConfig {
    fn default() -> Self {
        let path = PathParams::default();
        Self {
            radius: 2.0,
            base_altitude: path.base_altitude,
            altitude_factor: path.altitude_factor,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentrixConfig {
    pub globe: GlobeConfig,
    pub animation: AnimationConfig,
    pub feed: FeedConfig,
    pub scene: SceneConfig,
    pub runtime: RuntimeConfig,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be a positive number, got {}", value)))
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be >= 0, got {}", value)))
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be within [0, 1], got {}", value)))
    }
}

impl SentrixConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SentrixConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serializes back to TOML (`--print-config` on both CLIs).
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("globe.radius", self.globe.radius)?;
        check_non_negative("globe.base_altitude", self.globe.base_altitude)?;
        check_non_negative("globe.altitude_factor", self.globe.altitude_factor)?;

        let anim = &self.animation;
        check_positive("animation.speed_min", anim.speed_min)?;
        check_positive("animation.speed_max", anim.speed_max)?;
        if anim.speed_max < anim.speed_min {
            return Err(invalid(
                "animation.speed_max",
                format!("{} is below speed_min {}", anim.speed_max, anim.speed_min),
            ));
        }
        check_positive("animation.fade_rate", anim.fade_rate)?;
        if anim.path_segments == 0 {
            return Err(invalid("animation.path_segments", "must be at least 1"));
        }
        check_unit("animation.opacity.arc_normal", anim.opacity.arc_normal)?;
        check_unit("animation.opacity.arc_dimmed", anim.opacity.arc_dimmed)?;
        check_unit("animation.opacity.packet_fading", anim.opacity.packet_fading)?;
        check_unit("animation.opacity.packet_dimmed", anim.opacity.packet_dimmed)?;

        let feed = &self.feed;
        if feed.capacity == 0 {
            return Err(invalid("feed.capacity", "must be at least 1"));
        }
        if !(0.0..=90.0).contains(&feed.source_lat_limit) {
            return Err(invalid(
                "feed.source_lat_limit",
                format!("must be within [0, 90], got {}", feed.source_lat_limit),
            ));
        }
        let target = feed.target_coord;
        if !(-90.0..=90.0).contains(&target.lat) || !(-180.0..=180.0).contains(&target.lon) {
            return Err(invalid(
                "feed.target_coord",
                format!("({}, {}) is not a valid coordinate", target.lat, target.lon),
            ));
        }

        if self.runtime.poll_interval_ms == 0 {
            return Err(invalid("runtime.poll_interval_ms", "must be at least 1"));
        }
        if self.runtime.frame_rate_hz == 0 {
            return Err(invalid("runtime.frame_rate_hz", "must be at least 1"));
        }

        Ok(())
    }
}
