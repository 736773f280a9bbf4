//! Engine configuration.
//!
//! Loaded from TOML, then overridden by `OFFICEFLOW_*` environment variables.
//! Every field has a default, so an empty file (or no file) is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::rating::RatingScale;

pub const ENV_RATING_SCALE: &str = "OFFICEFLOW_RATING_SCALE";
pub const ENV_ALLOCATION_RETRIES: &str = "OFFICEFLOW_ALLOCATION_RETRIES";
pub const ENV_UTC_OFFSET_HOURS: &str = "OFFICEFLOW_UTC_OFFSET_HOURS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

fn invalid(key: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Scale every rating input is validated against.
    pub rating_scale: RatingScale,
    /// Extra attempts at ticket creation after a ticket number collision.
    pub allocation_retries: u32,
    /// Offset applied to the clock when deciding the ticket period.
    pub utc_offset_hours: i8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rating_scale: RatingScale::Percent,
            allocation_retries: 3,
            utc_offset_hours: 8,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path` if given, otherwise start from defaults; then apply the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_RATING_SCALE) {
            self.rating_scale = raw
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_RATING_SCALE, &raw, "expected five_point or percent"))?;
        }
        if let Some(raw) = lookup(ENV_ALLOCATION_RETRIES) {
            self.allocation_retries = raw
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_ALLOCATION_RETRIES, &raw, "expected a whole number"))?;
        }
        if let Some(raw) = lookup(ENV_UTC_OFFSET_HOURS) {
            self.utc_offset_hours = raw
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_UTC_OFFSET_HOURS, &raw, "expected whole hours"))?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(invalid(
                "utc_offset_hours",
                self.utc_offset_hours,
                "must be between -12 and 14",
            ));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}
