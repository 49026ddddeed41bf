//! Run configuration for a risk forecast
//!
//! `RiskConfig` carries every tunable of a run. It deserializes from JSON with
//! missing keys falling back to defaults, so a config file only needs the
//! values it changes.

use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a burned value is recorded when several trials seed the same cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedPolicy {
    /// The latest trial seeded at the cell replaces earlier results
    #[default]
    Overwrite,
    /// Burned values of every trial seeded at the cell are summed
    Accumulate,
}

/// Event-count preset trading statistical confidence for run time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPreset {
    /// 100 events, for previews
    Quick,
    /// 1000 events
    Standard,
    /// 10000 events
    Thorough,
}

impl RunPreset {
    /// Number of Monte-Carlo events for this preset
    #[must_use]
    pub const fn event_count(&self) -> usize {
        match self {
            Self::Quick => 100,
            Self::Standard => 1000,
            Self::Thorough => 10_000,
        }
    }
}

/// Parameters of a Monte-Carlo risk run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Number of simulated ignitions (at least 1)
    pub event_count: usize,
    /// Burn duration limit of each simulated fire in minutes (at least 1)
    pub fire_duration_minutes: f64,
    /// Seed for the ignition generator; `None` seeds from OS entropy
    pub seed: Option<u64>,
    /// Handling of repeated seeds on one cell
    pub seed_policy: SeedPolicy,
    /// Run trials on the rayon pool
    pub parallel: bool,
    /// Maximum per-sweep change at which gap-closing relaxation stops
    pub gap_closing_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            event_count: RunPreset::Standard.event_count(),
            fire_duration_minutes: 100.0,
            seed: None,
            seed_policy: SeedPolicy::default(),
            parallel: false,
            gap_closing_threshold: 0.1,
        }
    }
}

impl RiskConfig {
    /// Default configuration with the event count of a preset
    #[must_use]
    pub fn from_preset(preset: RunPreset) -> Self {
        Self {
            event_count: preset.event_count(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::Io`] if the file cannot be read,
    /// [`RiskError::Config`] if it is not valid JSON for this type, and
    /// [`RiskError::InvalidParameter`] if a value is out of range.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.event_count < 1 {
            return Err(RiskError::invalid_parameter(
                "event_count",
                self.event_count,
                "at least one event is required",
            ));
        }
        if !(self.fire_duration_minutes.is_finite() && self.fire_duration_minutes >= 1.0) {
            return Err(RiskError::invalid_parameter(
                "fire_duration_minutes",
                self.fire_duration_minutes,
                "must be at least 1 minute",
            ));
        }
        if !(self.gap_closing_threshold.is_finite() && self.gap_closing_threshold > 0.0) {
            return Err(RiskError::invalid_parameter(
                "gap_closing_threshold",
                self.gap_closing_threshold,
                "must be finite and positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tool_defaults() {
        let config = RiskConfig::default();
        assert_eq!(config.event_count, 1000);
        assert_eq!(config.fire_duration_minutes, 100.0);
        assert_eq!(config.seed_policy, SeedPolicy::Overwrite);
        assert_eq!(config.gap_closing_threshold, 0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        assert_eq!(RunPreset::Quick.event_count(), 100);
        assert_eq!(RunPreset::Thorough.event_count(), 10_000);
        assert_eq!(
            RiskConfig::from_preset(RunPreset::Quick).event_count,
            100
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RiskConfig =
            serde_json::from_str(r#"{ "event_count": 50, "seed_policy": "accumulate" }"#).unwrap();
        assert_eq!(config.event_count, 50);
        assert_eq!(config.seed_policy, SeedPolicy::Accumulate);
        assert_eq!(config.fire_duration_minutes, 100.0);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let zero_events = RiskConfig {
            event_count: 0,
            ..RiskConfig::default()
        };
        assert!(matches!(
            zero_events.validate(),
            Err(RiskError::InvalidParameter { name: "event_count", .. })
        ));

        let short_fire = RiskConfig {
            fire_duration_minutes: 0.5,
            ..RiskConfig::default()
        };
        assert!(short_fire.validate().is_err());

        let bad_threshold = RiskConfig {
            gap_closing_threshold: 0.0,
            ..RiskConfig::default()
        };
        assert!(bad_threshold.validate().is_err());
    }
}
