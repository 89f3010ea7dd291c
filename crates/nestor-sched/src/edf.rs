//! Earliest-deadline-first scheduling
//!
//! EDF is fixed-priority dispatch where the priority key of each request
//! is its absolute deadline. An actor's deadline is recorded when it is
//! scheduled while not executing, and cleared once its execution
//! completes. Requests without a deadline rank last.

use crate::error::Result;
use crate::fixed_priority::{FixedPriorityScheduler, LOWEST_PRIORITY};
use indexmap::IndexMap;
use nestor_core::{ActorId, Resolution, Time};

/// Preemptive EDF scheduler on a single resource
#[derive(Debug, Clone, Default)]
pub struct EdfScheduler {
    core: FixedPriorityScheduler,
    deadlines: IndexMap<ActorId, Option<Time>>,
}

impl EdfScheduler {
    /// Create an idle scheduler
    pub fn new(resolution: Resolution) -> Self {
        Self {
            core: FixedPriorityScheduler::new(resolution),
            deadlines: IndexMap::new(),
        }
    }

    /// Forget every execution and deadline
    pub fn reset(&mut self) {
        self.core.reset();
        self.deadlines.clear();
    }

    /// The underlying dispatch state
    pub fn core(&self) -> &FixedPriorityScheduler {
        &self.core
    }

    /// Recorded deadline of `actor`
    pub fn deadline(&self, actor: ActorId) -> Option<Time> {
        self.deadlines.get(&actor).copied().flatten()
    }

    /// Priority key of `actor`: its deadline, or the lowest priority
    pub fn priority(&self, actor: ActorId) -> f64 {
        self.deadline(actor).unwrap_or(LOWEST_PRIORITY)
    }

    /// Whether `actor` holds the resource or is preempted
    pub fn is_executing(&self, actor: ActorId) -> bool {
        self.core.is_executing(actor)
    }

    /// Whether the previous `schedule` call completed its actor
    pub fn last_scheduled_actor_finished(&self) -> bool {
        self.core.last_scheduled_actor_finished()
    }

    /// Dispatch `actor` with `deadline` as its priority key
    ///
    /// The deadline is only taken into account when the actor is not
    /// already executing; an execution keeps the deadline it was admitted
    /// with. See [`FixedPriorityScheduler::schedule_with`] for the return
    /// value.
    pub fn schedule(
        &mut self,
        actor: ActorId,
        now: Time,
        deadline: Option<Time>,
        execution_time: f64,
    ) -> Result<Option<Time>> {
        if !self.core.is_executing(actor) {
            self.deadlines.insert(actor, deadline);
        }
        let priority = self.priority(actor);
        let next = self
            .core
            .schedule_with(actor, now, execution_time, priority)?;
        if self.core.last_scheduled_actor_finished() {
            self.deadlines.insert(actor, None);
        }
        Ok(next)
    }

    /// Pick the candidate with the earliest deadline
    ///
    /// Ties go to the earliest candidate in the list; candidates without a
    /// deadline are only chosen when no candidate has one.
    pub fn select<I>(candidates: I) -> Option<ActorId>
    where
        I: IntoIterator<Item = (ActorId, Option<Time>)>,
    {
        FixedPriorityScheduler::select(
            candidates
                .into_iter()
                .map(|(actor, deadline)| (actor, deadline.unwrap_or(LOWEST_PRIORITY))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(n: u64) -> ActorId {
        ActorId::new(n)
    }

    #[test]
    fn test_picks_earliest_deadline() {
        let picked = EdfScheduler::select([(id(3), Some(3.0)), (id(1), Some(1.0)), (id(2), Some(2.0))]);
        assert_eq!(picked, Some(id(1)));
    }

    #[test]
    fn test_undeadlined_never_ahead_of_deadlined() {
        let picked = EdfScheduler::select([(id(1), None), (id(2), Some(100.0))]);
        assert_eq!(picked, Some(id(2)));
        assert_eq!(EdfScheduler::select([(id(1), None), (id(2), None)]), Some(id(1)));
    }

    #[test]
    fn test_earlier_deadline_preempts() {
        let mut s = EdfScheduler::default();
        assert_eq!(s.schedule(id(1), 0.0, Some(10.0), 4.0).unwrap(), Some(4.0));
        assert_eq!(s.schedule(id(2), 1.0, Some(3.0), 1.0).unwrap(), Some(2.0));
        assert_eq!(s.core().running().unwrap().actor, id(2));
        assert_eq!(s.schedule(id(2), 2.0, Some(3.0), 1.0).unwrap(), None);
        assert_eq!(s.deadline(id(2)), None);
        assert_eq!(s.core().completion_time(), Some(5.0));
    }

    #[test]
    fn test_undeadlined_execution_is_preempted_by_deadlined() {
        let mut s = EdfScheduler::default();
        s.schedule(id(1), 0.0, None, 4.0).unwrap();
        s.schedule(id(2), 1.0, Some(50.0), 1.0).unwrap();
        assert_eq!(s.core().running().unwrap().actor, id(2));
    }

    #[test]
    fn test_deadline_kept_while_executing() {
        let mut s = EdfScheduler::default();
        s.schedule(id(1), 0.0, Some(5.0), 2.0).unwrap();
        s.schedule(id(1), 1.0, Some(99.0), 2.0).unwrap();
        assert_eq!(s.deadline(id(1)), Some(5.0));
        s.schedule(id(1), 2.0, Some(99.0), 2.0).unwrap();
        assert!(s.last_scheduled_actor_finished());
        assert_eq!(s.deadline(id(1)), None);
    }

    proptest! {
        #[test]
        fn test_select_returns_a_minimal_deadline(
            deadlines in prop::collection::vec(prop::option::of(0.0f64..100.0), 1..16)
        ) {
            let candidates: Vec<(ActorId, Option<Time>)> = deadlines
                .iter()
                .enumerate()
                .map(|(i, d)| (id(i as u64), *d))
                .collect();
            let picked = EdfScheduler::select(candidates.clone()).unwrap();
            let picked_deadline = candidates[picked.raw() as usize].1;
            let best = deadlines.iter().flatten().fold(f64::INFINITY, |a, b| a.min(*b));
            prop_assert_eq!(picked_deadline.unwrap_or(f64::INFINITY), best);
        }
    }
}
