//! Mixed-signal director parameters
//!
//! ```
//! use nestor_ct::MixedSignalConfig;
//!
//! let config = MixedSignalConfig::from_ron("(stop_time: 4.0, run_ahead_length: 0.5)").unwrap();
//! assert_eq!(config.run_ahead_length, 0.5);
//! assert_eq!(config.step_size, 0.1);
//! ```

use crate::error::{Error, Result};
use nestor_core::{Resolution, Time, NEVER};
use serde::{Deserialize, Serialize};

/// Parameters of a [`MixedSignalDirector`](crate::MixedSignalDirector)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixedSignalConfig {
    /// Start time when running at the top of a model
    pub start_time: Time,
    /// Stop time when running at the top of a model
    pub stop_time: Time,
    /// How far past the outer time an embedded run may proceed
    pub run_ahead_length: f64,
    /// Nominal integration step
    pub step_size: f64,
    /// Tolerance for time comparisons
    pub time_resolution: f64,
}

impl MixedSignalConfig {
    /// Parse and validate a RON document
    pub fn from_ron(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the run-ahead length
    pub fn with_run_ahead_length(mut self, length: f64) -> Self {
        self.run_ahead_length = length;
        self
    }

    /// Set the integration step
    pub fn with_step_size(mut self, step: f64) -> Self {
        self.step_size = step;
        self
    }

    /// Set the top-level stop time
    pub fn with_stop_time(mut self, stop_time: Time) -> Self {
        self.stop_time = stop_time;
        self
    }

    /// The comparison tolerance
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.time_resolution)
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.run_ahead_length > 0.0) {
            return Err(Error::InvalidParameter {
                name: "run_ahead_length",
                reason: format!("{} is not positive", self.run_ahead_length),
            });
        }
        if !(self.step_size > 0.0) {
            return Err(Error::InvalidParameter {
                name: "step_size",
                reason: format!("{} is not positive", self.step_size),
            });
        }
        if !(self.time_resolution > 0.0) {
            return Err(Error::InvalidParameter {
                name: "time_resolution",
                reason: format!("{} is not positive", self.time_resolution),
            });
        }
        if self.stop_time < self.start_time {
            return Err(Error::InvalidParameter {
                name: "stop_time",
                reason: format!("{} is before start time {}", self.stop_time, self.start_time),
            });
        }
        Ok(())
    }
}

impl Default for MixedSignalConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            stop_time: NEVER,
            run_ahead_length: 1.0,
            step_size: 0.1,
            time_resolution: 1e-10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MixedSignalConfig::default();
        assert_eq!(config.run_ahead_length, 1.0);
        assert_eq!(config.step_size, 0.1);
        assert_eq!(config.time_resolution, 1e-10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_run_ahead() {
        let err = MixedSignalConfig::from_ron("(run_ahead_length: 0.0)").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameter {
                name: "run_ahead_length",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_stop_before_start() {
        let config = MixedSignalConfig {
            start_time: 2.0,
            stop_time: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ron_round_trip() {
        let config = MixedSignalConfig::default()
            .with_stop_time(3.0)
            .with_step_size(0.05);
        let text = ron::to_string(&config).unwrap();
        assert_eq!(MixedSignalConfig::from_ron(&text).unwrap(), config);
    }
}
