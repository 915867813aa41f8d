//! Engine-wide configuration.
//!
//! [`EngineConfig`] bundles the per-component settings. Every field has a
//! default, so hosts may deserialize partial JSON and only override what they
//! need:
//!
//! ```rust
//! use geo_progress::config::EngineConfig;
//!
//! let config = EngineConfig::default();
//! assert_eq!(config.tracker.checkpoint_arrival_threshold.value(), 20.0);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checkpoints::CheckpointConfig;
use crate::path_recorder::RecorderConfig;
use crate::spot::{RadiusDial, SpotConfig};
use crate::tracker::TrackerConfig;
use crate::Meters;

/// Settings that would make a component misbehave.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{dial} dial has min radius {min} above max radius {max}")]
    InvertedDial { dial: &'static str, min: f64, max: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub recorder: RecorderConfig,
    pub checkpoints: CheckpointConfig,
    pub spot: SpotConfig,
    pub tracker: TrackerConfig,
}

fn positive(field: &'static str, value: Meters) -> Result<(), ConfigError> {
    if value.value() > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value: value.value() })
    }
}

fn check_dial(dial: &'static str, d: &RadiusDial) -> Result<(), ConfigError> {
    positive("step", d.step)?;
    positive("min_radius", d.min_radius)?;
    if !(d.sensitivity > 0.0) {
        return Err(ConfigError::NotPositive { field: "sensitivity", value: d.sensitivity });
    }
    if d.min_radius.value() > d.max_radius.value() {
        return Err(ConfigError::InvertedDial {
            dial,
            min: d.min_radius.value(),
            max: d.max_radius.value(),
        });
    }
    Ok(())
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("step_threshold", self.recorder.step_threshold)?;
        positive("path_finish_threshold", self.tracker.path_finish_threshold)?;
        positive("checkpoint_arrival_threshold", self.tracker.checkpoint_arrival_threshold)?;
        check_dial("geo hunt", &self.spot.geo_hunt_dial)?;
        check_dial("timed zone", &self.spot.timed_zone_dial)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "tracker": { "pathFinishThreshold": 50.0 }, "recorder": { "resumeTolerance": 5.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.tracker.path_finish_threshold, Meters(50.0));
        assert_eq!(config.tracker.checkpoint_arrival_threshold, Meters(20.0));
        assert_eq!(config.recorder.resume_tolerance, Meters(5.0));
        assert_eq!(config.recorder.step_threshold, Meters(1.0));
        assert_eq!(config.checkpoints, CheckpointConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.tracker.checkpoint_arrival_threshold = Meters(0.0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive { field: "checkpoint_arrival_threshold", value: 0.0 })
        );

        let mut config = EngineConfig::default();
        config.spot.timed_zone_dial.max_radius = Meters(5.0);
        assert!(matches!(config.validate(), Err(ConfigError::InvertedDial { dial: "timed zone", .. })));
    }
}
