//! Task table for the EDF director
//!
//! Tasks are keyed by actor name within the directed composite. Actors
//! without an entry execute in zero time and carry no deadline.
//!
//! ```
//! use nestor_sched::EdfConfig;
//!
//! let config = EdfConfig::from_ron(
//!     "(stop_time: 20.0, tasks: { \
//!         \"sensor\": (relative_deadline: Some(2.0), execution_time: 0.5), \
//!         \"logger\": (execution_time: 1.0), \
//!     })",
//! )
//! .unwrap();
//! assert_eq!(config.task("sensor").relative_deadline, Some(2.0));
//! assert_eq!(config.task("logger").relative_deadline, None);
//! assert_eq!(config.task("unknown").execution_time, 0.0);
//! ```

use crate::error::{Error, Result};
use indexmap::IndexMap;
use nestor_core::{Time, NEVER};
use serde::{Deserialize, Serialize};

/// Timing parameters of one task
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TaskSpec {
    /// Deadline relative to the release time; `None` ranks last
    pub relative_deadline: Option<f64>,
    /// Processor time one firing needs
    pub execution_time: f64,
}

impl TaskSpec {
    /// A task with a deadline
    pub fn new(relative_deadline: f64, execution_time: f64) -> Self {
        Self {
            relative_deadline: Some(relative_deadline),
            execution_time,
        }
    }

    /// A task without a deadline
    pub fn background(execution_time: f64) -> Self {
        Self {
            relative_deadline: None,
            execution_time,
        }
    }
}

/// Configuration for [`EdfDirector`](crate::EdfDirector)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdfConfig {
    /// Model time after which the director stops
    pub stop_time: Time,
    /// Per-actor task parameters
    pub tasks: IndexMap<String, TaskSpec>,
}

impl EdfConfig {
    /// Parse and validate a RON document
    pub fn from_ron(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the stop time
    pub fn with_stop_time(mut self, stop_time: Time) -> Self {
        self.stop_time = stop_time;
        self
    }

    /// Add or replace the task for actor `name`
    pub fn with_task(mut self, name: impl Into<String>, spec: TaskSpec) -> Self {
        self.tasks.insert(name.into(), spec);
        self
    }

    /// Parameters for actor `name`
    pub fn task(&self, name: &str) -> TaskSpec {
        self.tasks.get(name).copied().unwrap_or_default()
    }

    /// Reject negative execution times and deadlines
    pub fn validate(&self) -> Result<()> {
        for (name, spec) in &self.tasks {
            if spec.execution_time < 0.0 {
                return Err(Error::Config(format!(
                    "task {name}: negative execution time {}",
                    spec.execution_time
                )));
            }
            if spec.relative_deadline.is_some_and(|d| d < 0.0) {
                return Err(Error::Config(format!("task {name}: negative deadline")));
            }
        }
        Ok(())
    }
}

impl Default for EdfConfig {
    fn default() -> Self {
        Self {
            stop_time: NEVER,
            tasks: IndexMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_stop_time() {
        let config = EdfConfig::default();
        assert_eq!(config.stop_time, NEVER);
        assert!(config.tasks.is_empty());
    }

    #[test]
    fn test_ron_round_trip_keeps_task_order() {
        let config = EdfConfig::default()
            .with_stop_time(5.0)
            .with_task("b", TaskSpec::new(2.0, 1.0))
            .with_task("a", TaskSpec::background(0.5));
        let text = ron::to_string(&config).unwrap();
        let parsed = EdfConfig::from_ron(&text).unwrap();
        assert_eq!(parsed, config);
        let names: Vec<&str> = parsed.tasks.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_negative_execution_time_rejected() {
        let err = EdfConfig::from_ron("(tasks: { \"a\": (execution_time: -1.0) })").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_document_is_config_error() {
        let err = EdfConfig::from_ron("(stop_time: \"soon\")").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
