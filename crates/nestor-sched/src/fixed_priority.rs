//! Preemptive fixed-priority dispatch on a single resource
//!
//! The scheduler models one processor shared by a set of actors. Each
//! call to [`FixedPriorityScheduler::schedule_with`] accounts for the time
//! elapsed since the previous call, then either continues, preempts or
//! defers the requesting actor. Lower priority values are more urgent.
//!
//! ```text
//! stack (top runs)        schedule(c, prio 1) at t
//! ┌──────────────┐        ┌──────────────┐
//! │ b  prio 3    │  ───►  │ c  prio 1    │ ← now running
//! │ a  prio 5    │        │ b  prio 3    │ ← preempted, keeps remaining
//! └──────────────┘        │ a  prio 5    │
//!                         └──────────────┘
//! ```

use crate::error::{Error, Result};
use indexmap::IndexMap;
use nestor_core::{ActorId, Resolution, Time, NEVER};
use tracing::debug;

/// Priority of an actor with no explicit priority
pub const LOWEST_PRIORITY: f64 = f64::INFINITY;

/// An actor holding the resource or preempted on the stack
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Execution {
    /// The executing actor
    pub actor: ActorId,
    /// Execution time still owed
    pub remaining: f64,
    /// Priority the execution was admitted with
    pub priority: f64,
}

/// Fixed-priority preemptive scheduler
#[derive(Debug, Clone)]
pub struct FixedPriorityScheduler {
    stack: Vec<Execution>,
    priorities: IndexMap<ActorId, f64>,
    last_invocation: Option<Time>,
    last_finished: bool,
    resolution: Resolution,
}

impl FixedPriorityScheduler {
    /// Create an idle scheduler
    pub fn new(resolution: Resolution) -> Self {
        Self {
            stack: Vec::new(),
            priorities: IndexMap::new(),
            last_invocation: None,
            last_finished: false,
            resolution,
        }
    }

    /// Forget every execution while keeping configured priorities
    pub fn reset(&mut self) {
        self.stack.clear();
        self.last_invocation = None;
        self.last_finished = false;
    }

    /// Assign a fixed priority to `actor`
    pub fn set_priority(&mut self, actor: ActorId, priority: f64) {
        self.priorities.insert(actor, priority);
    }

    /// Configured priority of `actor`, [`LOWEST_PRIORITY`] if none
    pub fn priority(&self, actor: ActorId) -> f64 {
        self.priorities
            .get(&actor)
            .copied()
            .unwrap_or(LOWEST_PRIORITY)
    }

    /// Whether `actor` holds the resource or is preempted on the stack
    pub fn is_executing(&self, actor: ActorId) -> bool {
        self.stack.iter().any(|e| e.actor == actor)
    }

    /// The execution currently holding the resource
    pub fn running(&self) -> Option<&Execution> {
        self.stack.last()
    }

    /// All admitted executions, bottom of the stack first
    pub fn executions(&self) -> &[Execution] {
        &self.stack
    }

    /// When the running execution completes if it is not preempted
    pub fn completion_time(&self) -> Option<Time> {
        let top = self.stack.last()?;
        let since = self.last_invocation.unwrap_or(0.0);
        Some(since + top.remaining)
    }

    /// Whether the previous `schedule` call completed its actor
    pub fn last_scheduled_actor_finished(&self) -> bool {
        self.last_finished
    }

    /// Schedule `actor` with its configured priority
    pub fn schedule(
        &mut self,
        actor: ActorId,
        now: Time,
        execution_time: f64,
    ) -> Result<Option<Time>> {
        let priority = self.priority(actor);
        self.schedule_with(actor, now, execution_time, priority)
    }

    /// Account for elapsed time and dispatch `actor`
    ///
    /// Returns when the scheduler must be invoked again for this actor:
    /// its completion time when it holds the resource, the running
    /// execution's completion time when it has to wait, and `None` once
    /// it has finished.
    pub fn schedule_with(
        &mut self,
        actor: ActorId,
        now: Time,
        execution_time: f64,
        priority: f64,
    ) -> Result<Option<Time>> {
        if execution_time < 0.0 {
            return Err(Error::NegativeExecutionTime {
                actor,
                execution_time,
            });
        }
        self.advance(now)?;
        self.last_finished = false;

        if let Some(top) = self.stack.last() {
            if top.actor == actor {
                if top.remaining <= self.resolution.epsilon() {
                    self.finish(now);
                    return Ok(None);
                }
                return Ok(Some(now + top.remaining));
            }
            if self.is_executing(actor) || priority >= top.priority {
                return Ok(Some(now + top.remaining));
            }
            debug!(%actor, preempted = %top.actor, now, "preempting");
        }

        self.stack.push(Execution {
            actor,
            remaining: execution_time,
            priority,
        });
        if execution_time <= self.resolution.epsilon() {
            self.finish(now);
            return Ok(None);
        }
        Ok(Some(now + execution_time))
    }

    /// Pick the most urgent candidate; ties go to the earliest in the list
    pub fn select<I>(candidates: I) -> Option<ActorId>
    where
        I: IntoIterator<Item = (ActorId, f64)>,
    {
        let mut best: Option<(ActorId, f64)> = None;
        for (actor, priority) in candidates {
            match best {
                Some((_, p)) if priority >= p => {}
                _ => best = Some((actor, priority)),
            }
        }
        best.map(|(actor, _)| actor)
    }

    fn advance(&mut self, now: Time) -> Result<()> {
        if let Some(last) = self.last_invocation {
            if self.resolution.before(now, last) {
                return Err(Error::TimeWentBackward { now, last });
            }
            let elapsed = (now - last).max(0.0);
            if let Some(top) = self.stack.last_mut() {
                top.remaining = (top.remaining - elapsed).max(0.0);
            }
        }
        self.last_invocation = Some(now);
        Ok(())
    }

    fn finish(&mut self, now: Time) {
        if let Some(done) = self.stack.pop() {
            debug!(actor = %done.actor, now, "execution finished");
        }
        self.last_finished = true;
    }
}

impl Default for FixedPriorityScheduler {
    fn default() -> Self {
        Self::new(Resolution::DEFAULT)
    }
}

/// Completion time of a stack, `NEVER` when idle
pub(crate) fn completion_or_never(scheduler: &FixedPriorityScheduler) -> Time {
    scheduler.completion_time().unwrap_or(NEVER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ActorId {
        ActorId::new(n)
    }

    #[test]
    fn test_runs_to_completion() {
        let mut s = FixedPriorityScheduler::default();
        assert_eq!(s.schedule(id(1), 0.0, 2.0).unwrap(), Some(2.0));
        assert!(s.is_executing(id(1)));
        assert_eq!(s.schedule(id(1), 1.0, 2.0).unwrap(), Some(2.0));
        assert_eq!(s.schedule(id(1), 2.0, 2.0).unwrap(), None);
        assert!(s.last_scheduled_actor_finished());
        assert!(s.running().is_none());
    }

    #[test]
    fn test_zero_execution_time_finishes_immediately() {
        let mut s = FixedPriorityScheduler::default();
        assert_eq!(s.schedule(id(1), 0.0, 0.0).unwrap(), None);
        assert!(s.last_scheduled_actor_finished());
    }

    #[test]
    fn test_higher_priority_preempts() {
        let mut s = FixedPriorityScheduler::default();
        s.set_priority(id(1), 5.0);
        s.set_priority(id(2), 1.0);
        s.schedule(id(1), 0.0, 4.0).unwrap();
        assert_eq!(s.schedule(id(2), 1.0, 1.0).unwrap(), Some(2.0));
        assert_eq!(s.running().unwrap().actor, id(2));
        assert_eq!(s.schedule(id(2), 2.0, 1.0).unwrap(), None);
        // id(1) ran for one unit before preemption
        assert_eq!(s.running().unwrap().remaining, 3.0);
        assert_eq!(s.completion_time(), Some(5.0));
    }

    #[test]
    fn test_lower_priority_waits() {
        let mut s = FixedPriorityScheduler::default();
        s.set_priority(id(1), 1.0);
        s.set_priority(id(2), 5.0);
        s.schedule(id(1), 0.0, 3.0).unwrap();
        assert_eq!(s.schedule(id(2), 1.0, 1.0).unwrap(), Some(3.0));
        assert!(!s.is_executing(id(2)));
        assert!(!s.last_scheduled_actor_finished());
    }

    #[test]
    fn test_equal_priority_does_not_preempt() {
        let mut s = FixedPriorityScheduler::default();
        s.schedule_with(id(1), 0.0, 2.0, 1.0).unwrap();
        s.schedule_with(id(2), 0.5, 2.0, 1.0).unwrap();
        assert_eq!(s.running().unwrap().actor, id(1));
    }

    #[test]
    fn test_rejects_negative_execution_time() {
        let mut s = FixedPriorityScheduler::default();
        let err = s.schedule(id(1), 0.0, -1.0).unwrap_err();
        assert!(matches!(err, Error::NegativeExecutionTime { .. }));
    }

    #[test]
    fn test_rejects_time_going_backward() {
        let mut s = FixedPriorityScheduler::default();
        s.schedule(id(1), 2.0, 1.0).unwrap();
        let err = s.schedule(id(1), 1.0, 1.0).unwrap_err();
        assert!(matches!(err, Error::TimeWentBackward { .. }));
    }

    #[test]
    fn test_select_prefers_lowest_then_first() {
        let picked = FixedPriorityScheduler::select([(id(1), 3.0), (id(2), 1.0), (id(3), 1.0)]);
        assert_eq!(picked, Some(id(2)));
        assert_eq!(FixedPriorityScheduler::select(Vec::<(ActorId, f64)>::new()), None);
    }
}
