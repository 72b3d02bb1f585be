//! Scheduler policy constants.
//!
//! Every field has a default, so a config file only needs the values it
//! overrides:
//!
//! ```json
//! { "max_interval_days": 1825.0, "max_ease": 2.8 }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Largest interval ceiling a config may set, about a century.
pub const INTERVAL_CEILING_LIMIT_DAYS: f64 = 36_500.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub min_quality: i32,
    pub max_quality: i32,
    /// Qualities at or above this count as a recall.
    pub passing_quality: i32,
    pub initial_ease: f64,
    pub min_ease: f64,
    pub max_ease: f64,
    /// Ease gained per quality step above the passing threshold.
    pub ease_bonus_per_step: f64,
    /// Ease lost per quality step below the passing threshold.
    pub ease_penalty_per_step: f64,
    pub lapse_interval_days: f64,
    pub first_interval_days: f64,
    pub second_interval_days: f64,
    pub max_interval_days: f64,
    /// Cards at or beyond this interval count as mastered.
    pub mastery_interval_days: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_quality: 0,
            max_quality: 5,
            passing_quality: 3,
            initial_ease: 2.5,
            min_ease: 1.3,
            max_ease: 3.0,
            ease_bonus_per_step: 0.05,
            ease_penalty_per_step: 0.2,
            lapse_interval_days: 1.0,
            first_interval_days: 1.0,
            second_interval_days: 6.0,
            max_interval_days: 3650.0,
            mastery_interval_days: 21.0,
        }
    }
}

impl SchedulerConfig {
    /// Loads a JSON config file and validates it.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        log::info!("Loaded scheduler config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_quality > self.max_quality {
            return Err(invalid("min_quality is above max_quality"));
        }
        if self.passing_quality <= self.min_quality || self.passing_quality > self.max_quality {
            return Err(invalid(
                "passing_quality must leave room for a lapse and lie within the quality range",
            ));
        }

        let floats = [
            ("initial_ease", self.initial_ease),
            ("min_ease", self.min_ease),
            ("max_ease", self.max_ease),
            ("ease_bonus_per_step", self.ease_bonus_per_step),
            ("ease_penalty_per_step", self.ease_penalty_per_step),
            ("lapse_interval_days", self.lapse_interval_days),
            ("first_interval_days", self.first_interval_days),
            ("second_interval_days", self.second_interval_days),
            ("max_interval_days", self.max_interval_days),
            ("mastery_interval_days", self.mastery_interval_days),
        ];
        for (name, value) in floats {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(&format!("{name} must be a finite non-negative number")));
            }
        }

        if self.min_ease < 1.0 {
            // below 1.0 later intervals would shrink
            return Err(invalid("min_ease must be at least 1.0"));
        }
        if self.min_ease > self.max_ease {
            return Err(invalid("min_ease is above max_ease"));
        }
        if self.initial_ease < self.min_ease || self.initial_ease > self.max_ease {
            return Err(invalid("initial_ease must lie between min_ease and max_ease"));
        }
        if self.lapse_interval_days <= 0.0 {
            return Err(invalid("lapse_interval_days must be positive"));
        }
        if self.first_interval_days > self.second_interval_days {
            return Err(invalid("first_interval_days is above second_interval_days"));
        }
        if self.max_interval_days < self.lapse_interval_days
            || self.max_interval_days < self.second_interval_days
        {
            return Err(invalid("max_interval_days is below the fixed learning intervals"));
        }
        if self.max_interval_days > INTERVAL_CEILING_LIMIT_DAYS {
            return Err(invalid(&format!(
                "max_interval_days must not exceed {INTERVAL_CEILING_LIMIT_DAYS}"
            )));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}
