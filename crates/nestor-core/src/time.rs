//! Model time and time resolution
//!
//! Time is continuous (`f64` seconds of model time). Two instants closer
//! than the configured [`Resolution`] are treated as the same instant
//! everywhere in the kernel.

use serde::{Deserialize, Serialize};

/// A point in model time
pub type Time = f64;

/// Time that is never reached
pub const NEVER: Time = f64::INFINITY;

/// Comparison tolerance for model time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resolution(f64);

impl Resolution {
    /// Default resolution
    pub const DEFAULT: Resolution = Resolution(1e-10);

    /// Create a resolution, clamping non-positive values to the smallest
    /// positive `f64`
    pub fn new(epsilon: f64) -> Self {
        if epsilon > 0.0 {
            Self(epsilon)
        } else {
            Self(f64::MIN_POSITIVE)
        }
    }

    /// Get the raw epsilon
    pub fn epsilon(&self) -> f64 {
        self.0
    }

    /// `a` and `b` denote the same instant
    pub fn equal(&self, a: Time, b: Time) -> bool {
        if a == b {
            return true;
        }
        (a - b).abs() < self.0
    }

    /// `a` is strictly before `b` by more than the resolution
    pub fn before(&self, a: Time, b: Time) -> bool {
        a < b - self.0
    }

    /// `a` is strictly after `b` by more than the resolution
    pub fn after(&self, a: Time, b: Time) -> bool {
        a > b + self.0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Clock state a director publishes for the directors nested below it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    /// Current model time
    pub current: Time,
    /// Time of the next iteration, `NEVER` if none is pending
    pub next_iteration: Time,
    /// Step size of the iteration in progress (0 for discrete domains)
    pub step_size: f64,
}

impl Clock {
    /// A clock at time zero with nothing scheduled
    pub fn new() -> Self {
        Self {
            current: 0.0,
            next_iteration: NEVER,
            step_size: 0.0,
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
