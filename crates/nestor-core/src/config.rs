//! Kernel configuration
//!
//! Configuration is plain data with serde derives so it can be embedded in
//! larger RON documents or loaded standalone with [`KernelConfig::from_ron`].
//!
//! ```
//! use nestor_core::{HistoryCapacity, KernelConfig, ReceiverConfig};
//!
//! let config = KernelConfig::from_ron(
//!     "(time_resolution: 1e-9, max_iterations: Some(10), \
//!       default_receiver: Fifo(capacity: Some(4), history: Bounded(2)))",
//! )
//! .unwrap();
//! assert_eq!(config.max_iterations, Some(10));
//! assert_eq!(
//!     config.default_receiver,
//!     ReceiverConfig::Fifo { capacity: Some(4), history: HistoryCapacity::Bounded(2) }
//! );
//! ```

use crate::error::Result;
use crate::time::Resolution;
use serde::{Deserialize, Serialize};

/// Retention policy for items consumed from a FIFO queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HistoryCapacity {
    /// Consumed items are discarded
    #[default]
    Disabled,
    /// Keep at most this many consumed items, evicting the oldest
    Bounded(usize),
    /// Keep every consumed item
    Unbounded,
}

impl HistoryCapacity {
    /// Whether consumed items are retained at all
    pub fn is_enabled(&self) -> bool {
        !matches!(self, HistoryCapacity::Disabled | HistoryCapacity::Bounded(0))
    }
}

/// Which receiver discipline a director hands out for a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReceiverConfig {
    /// First-in first-out, optionally bounded, optionally keeping history
    Fifo {
        #[serde(default)]
        capacity: Option<usize>,
        #[serde(default)]
        history: HistoryCapacity,
    },
    /// Ordered by timestamp, ties broken by token value
    TimeOrdered,
    /// Ordered by timestamp, tagged with a receiver priority
    PriorityOrdered { priority: i32 },
}

impl ReceiverConfig {
    /// Unbounded FIFO without history
    pub fn fifo() -> Self {
        ReceiverConfig::Fifo {
            capacity: None,
            history: HistoryCapacity::Disabled,
        }
    }

    /// FIFO holding at most `capacity` pending tokens
    pub fn bounded(capacity: usize) -> Self {
        ReceiverConfig::Fifo {
            capacity: Some(capacity),
            history: HistoryCapacity::Disabled,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self::fifo()
    }
}

/// Configuration shared by the kernel and the driver loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Tolerance used for every time comparison
    #[serde(default)]
    pub time_resolution: Resolution,
    /// Stop the driver loop after this many iterations (`None` = unlimited)
    #[serde(default)]
    pub max_iterations: Option<u64>,
    /// Receiver discipline used by directors that do not pick their own
    #[serde(default)]
    pub default_receiver: ReceiverConfig,
}

impl KernelConfig {
    /// Parse a configuration from RON text
    pub fn from_ron(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Serialize this configuration as pretty RON
    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Limit the number of driver iterations
    pub fn with_max_iterations(mut self, limit: u64) -> Self {
        self.max_iterations = Some(limit);
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            time_resolution: Resolution::DEFAULT,
            max_iterations: None,
            default_receiver: ReceiverConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.max_iterations, None);
        assert_eq!(config.default_receiver, ReceiverConfig::fifo());
        assert_eq!(config.time_resolution, Resolution::DEFAULT);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = KernelConfig::from_ron("()").unwrap();
        assert_eq!(config, KernelConfig::default());
    }

    #[test]
    fn test_ron_round_trip() {
        let config = KernelConfig {
            time_resolution: Resolution::new(1e-6),
            max_iterations: Some(50),
            default_receiver: ReceiverConfig::PriorityOrdered { priority: 3 },
        };
        let text = config.to_ron().unwrap();
        assert_eq!(KernelConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_ron_is_config_error() {
        let err = KernelConfig::from_ron("(max_iterations: \"lots\")").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }

    #[test]
    fn test_history_enabled() {
        assert!(!HistoryCapacity::Disabled.is_enabled());
        assert!(!HistoryCapacity::Bounded(0).is_enabled());
        assert!(HistoryCapacity::Bounded(2).is_enabled());
        assert!(HistoryCapacity::Unbounded.is_enabled());
    }
}
