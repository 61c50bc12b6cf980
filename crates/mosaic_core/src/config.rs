//! # World Configuration
//!
//! Sizing and timing knobs for a [`World`](crate::World). Loaded once at
//! startup, either built in code or parsed from a TOML document:
//!
//! ```toml
//! entity_capacity = 4096
//! max_delta_time = 0.05
//! ```
//!
//! Missing keys fall back to their defaults.

use serde::Deserialize;

use crate::error::{EcsError, EcsResult};

/// Default number of entity slots preallocated by a world.
pub const DEFAULT_ENTITY_CAPACITY: usize = 512;

/// Default upper bound for a single tick's delta time (1/30 time unit).
pub const DEFAULT_MAX_DELTA_TIME: f32 = 1.0 / 30.0;

/// Construction-time settings for a world.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Preallocation hint for entity slots and storages. Not a hard limit.
    pub entity_capacity: usize,
    /// Largest delta time handed to the scheduler in one `update`.
    pub max_delta_time: f32,
}

impl WorldConfig {
    /// Creates a config with the given capacity hint and default timing.
    #[must_use]
    pub fn with_capacity(entity_capacity: usize) -> Self {
        Self {
            entity_capacity,
            ..Self::default()
        }
    }

    /// Sets the delta-time clamp.
    #[must_use]
    pub fn max_delta_time(mut self, max_delta_time: f32) -> Self {
        self.max_delta_time = max_delta_time;
        self
    }

    /// Parses a config from a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the document does not parse
    /// or holds out-of-range values.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `max_delta_time` is not a
    /// positive number.
    pub fn validate(&self) -> EcsResult<()> {
        if self.max_delta_time.is_nan() || self.max_delta_time <= 0.0 {
            return Err(EcsError::InvalidConfig(format!(
                "max_delta_time must be positive, got {}",
                self.max_delta_time
            )));
        }
        Ok(())
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: DEFAULT_ENTITY_CAPACITY,
            max_delta_time: DEFAULT_MAX_DELTA_TIME,
        }
    }
}
