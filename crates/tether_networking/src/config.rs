//! # Replication Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! tick_rate = 30
//! compensation_factor = 1.5
//! easing = "smooth_step"
//! max_clients = 64
//! default_spawn_profile = 1
//! relevance_radius = 150.0
//! log_level = "debug"
//! ```

use std::path::Path;

use serde::Deserialize;
use tether_shared::{DEFAULT_COMPENSATION_FACTOR, TICK_RATE};

use crate::error::ConfigError;
use crate::interpolation::Easing;

fn default_tick_rate() -> u32 {
    TICK_RATE
}

fn default_compensation_factor() -> f32 {
    DEFAULT_COMPENSATION_FACTOR
}

fn default_max_clients() -> usize {
    256
}

fn default_spawn_profile() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Tunables shared by server and client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplicationConfig {
    /// Server ticks per second. Clients use it as the expected sample interval.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    /// Interpolation overshoot factor.
    #[serde(default = "default_compensation_factor")]
    pub compensation_factor: f32,
    /// Interpolation curve.
    #[serde(default)]
    pub easing: Easing,
    /// Connections beyond this are refused.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Profile given to newly connected avatars.
    #[serde(default = "default_spawn_profile")]
    pub default_spawn_profile: u64,
    /// Distance culling; `None` makes every avatar relevant to everyone.
    #[serde(default)]
    pub relevance_radius: Option<f32>,
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
            compensation_factor: default_compensation_factor(),
            easing: Easing::default(),
            max_clients: default_max_clients(),
            default_spawn_profile: default_spawn_profile(),
            relevance_radius: None,
            log_level: default_log_level(),
        }
    }
}

impl ReplicationConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `Parse` for malformed TOML, `Invalid` for out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise as [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded replication config from {}", path.display());
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// The first field found out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_rate",
                reason: "must be non-zero".into(),
            });
        }
        if !self.compensation_factor.is_finite() || self.compensation_factor <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "compensation_factor",
                reason: format!("must be positive, got {}", self.compensation_factor),
            });
        }
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid {
                field: "max_clients",
                reason: "must be non-zero".into(),
            });
        }
        if self.default_spawn_profile == 0 {
            return Err(ConfigError::Invalid {
                field: "default_spawn_profile",
                reason: "zero is reserved for \"no profile\"".into(),
            });
        }
        if let Some(radius) = self.relevance_radius {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(ConfigError::Invalid {
                    field: "relevance_radius",
                    reason: format!("must be positive, got {radius}"),
                });
            }
        }
        Ok(())
    }

    /// Seconds between server ticks.
    #[must_use]
    pub fn tick_interval(&self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let rate = self.tick_rate.max(1) as f32;
        1.0 / rate
    }
}
