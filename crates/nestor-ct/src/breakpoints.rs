//! Ordered set of predictable breakpoints
//!
//! A breakpoint is a future instant the integrator must land on exactly.
//! Two breakpoints closer than the resolution are the same breakpoint.

use nestor_core::{Resolution, Time};
use std::cmp::Ordering;

/// Ascending set of breakpoint times
#[derive(Debug, Clone, Default)]
pub struct BreakpointTable {
    times: Vec<Time>,
    resolution: Resolution,
}

impl BreakpointTable {
    /// Create an empty table
    pub fn new(resolution: Resolution) -> Self {
        Self {
            times: Vec::new(),
            resolution,
        }
    }

    /// Add a breakpoint; returns `false` if an equal one is already present
    pub fn insert(&mut self, time: Time) -> bool {
        let index = self
            .times
            .partition_point(|t| t.total_cmp(&time) == Ordering::Less);
        let near = |i: usize| {
            self.times
                .get(i)
                .is_some_and(|t| self.resolution.equal(*t, time))
        };
        if near(index) || (index > 0 && near(index - 1)) {
            return false;
        }
        self.times.insert(index, time);
        true
    }

    /// Earliest breakpoint
    pub fn first(&self) -> Option<Time> {
        self.times.first().copied()
    }

    /// Remove and return the earliest breakpoint
    pub fn remove_first(&mut self) -> Option<Time> {
        if self.times.is_empty() {
            None
        } else {
            Some(self.times.remove(0))
        }
    }

    /// Discard breakpoints strictly before `time`
    pub fn drop_before(&mut self, time: Time) -> usize {
        let keep = self
            .times
            .iter()
            .position(|t| !self.resolution.before(*t, time))
            .unwrap_or(self.times.len());
        self.times.drain(..keep).count()
    }

    /// Whether the earliest breakpoint is at `time`
    pub fn is_at(&self, time: Time) -> bool {
        self.first()
            .is_some_and(|t| self.resolution.equal(t, time))
    }

    /// Earliest breakpoint strictly after `time`
    pub fn next_after(&self, time: Time) -> Option<Time> {
        self.times
            .iter()
            .copied()
            .find(|t| self.resolution.after(*t, time))
    }

    /// Number of breakpoints
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Remove every breakpoint
    pub fn clear(&mut self) {
        self.times.clear();
    }

    /// Iterate in ascending order
    pub fn iter(&self) -> impl Iterator<Item = Time> + '_ {
        self.times.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_insert_dedups_within_resolution() {
        let mut table = BreakpointTable::new(Resolution::new(1e-6));
        assert!(table.insert(1.0));
        assert!(!table.insert(1.0 + 1e-9));
        assert!(table.insert(0.5));
        assert_eq!(table.iter().collect::<Vec<_>>(), vec![0.5, 1.0]);
    }

    #[test]
    fn test_drop_before_keeps_current() {
        let mut table = BreakpointTable::new(Resolution::new(1e-6));
        for t in [0.1, 0.2, 0.3] {
            table.insert(t);
        }
        assert_eq!(table.drop_before(0.2), 1);
        assert!(table.is_at(0.2));
        assert_eq!(table.next_after(0.2), Some(0.3));
    }

    proptest! {
        #[test]
        fn test_iteration_is_ascending(times in prop::collection::vec(0.0f64..10.0, 0..32)) {
            let mut table = BreakpointTable::new(Resolution::new(1e-9));
            for t in &times {
                table.insert(*t);
            }
            let sorted: Vec<Time> = table.iter().collect();
            prop_assert!(sorted.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(sorted.len() <= times.len());
        }
    }
}
