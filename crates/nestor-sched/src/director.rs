//! Real-time domain with earliest-deadline-first dispatch
//!
//! Firing requests (`fire_at`) are releases. A released actor competes for
//! a single simulated processor with priority equal to its absolute
//! deadline, `release + relative_deadline`. The actor body fires when its
//! execution completes, so outputs appear `execution_time` after dispatch
//! at the earliest, later when it is preempted.

use crate::config::{EdfConfig, TaskSpec};
use crate::edf::EdfScheduler;
use crate::fixed_priority::completion_or_never;
use indexmap::IndexMap;
use nestor_core::receiver::TimedQueue;
use nestor_core::{
    ActorId, Clock, Director, DirectorContext, DirectorKind, Resolution, Result, Time, NEVER,
};
use std::any::Any;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// A release waiting for the processor
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ready {
    released_at: Time,
    deadline: Option<Time>,
}

/// Director that dispatches released actors by earliest deadline
#[derive(Debug, Clone)]
pub struct EdfDirector {
    name: String,
    config: EdfConfig,
    scheduler: EdfScheduler,
    releases: TimedQueue<ActorId>,
    ready: IndexMap<ActorId, VecDeque<Ready>>,
    executing: IndexMap<ActorId, Ready>,
    specs: IndexMap<ActorId, TaskSpec>,
    time: Time,
    next_time: Time,
    deadline_misses: u64,
    completions: u64,
    resolution: Resolution,
}

impl EdfDirector {
    /// Create a director from a task table
    pub fn new(name: impl Into<String>, config: EdfConfig) -> Self {
        Self {
            name: name.into(),
            config,
            scheduler: EdfScheduler::default(),
            releases: TimedQueue::new(),
            ready: IndexMap::new(),
            executing: IndexMap::new(),
            specs: IndexMap::new(),
            time: 0.0,
            next_time: NEVER,
            deadline_misses: 0,
            completions: 0,
            resolution: Resolution::DEFAULT,
        }
    }

    /// The task table
    pub fn config(&self) -> &EdfConfig {
        &self.config
    }

    /// Dispatch state
    pub fn scheduler(&self) -> &EdfScheduler {
        &self.scheduler
    }

    /// Executions that completed after their deadline
    pub fn deadline_misses(&self) -> u64 {
        self.deadline_misses
    }

    /// Executions completed since initialize
    pub fn completions(&self) -> u64 {
        self.completions
    }

    /// Releases not yet admitted to the processor
    pub fn pending(&self) -> usize {
        self.releases.len() + self.ready.values().map(VecDeque::len).sum::<usize>()
    }

    fn spec(&self, actor: ActorId) -> TaskSpec {
        self.specs.get(&actor).copied().unwrap_or_default()
    }

    fn release(&mut self, actor: ActorId, time: Time) {
        let time = time.max(self.time);
        self.releases.put(actor, time);
    }

    fn drain_requests(&mut self, cx: &mut DirectorContext<'_>) {
        for (actor, time) in cx.take_refire_requests() {
            self.release(actor, time);
        }
    }

    /// Move due releases into the ready set
    ///
    /// Releases of one actor queue up behind each other. Only the oldest
    /// competes for the processor; the next one becomes a candidate once
    /// it completes.
    fn admit_due(&mut self) {
        while let Some(t) = self.releases.next_time() {
            if self.resolution.after(t, self.time) {
                break;
            }
            let Ok((released_at, actor)) = self.releases.take() else {
                break;
            };
            let deadline = self.spec(actor).relative_deadline.map(|d| released_at + d);
            let queue = self.ready.entry(actor).or_default();
            queue.push_back(Ready {
                released_at,
                deadline,
            });
            if queue.len() > 1 {
                debug!(%actor, released_at, waiting = queue.len(), "release queued behind earlier one");
            }
        }
    }

    fn complete(&mut self, cx: &mut DirectorContext<'_>, actor: ActorId, ready: Ready) -> Result<()> {
        self.completions += 1;
        if ready
            .deadline
            .is_some_and(|d| self.resolution.after(self.time, d))
        {
            self.deadline_misses += 1;
            warn!(
                actor = %cx.graph().actor_path(actor),
                released = ready.released_at,
                deadline = ready.deadline,
                finished = self.time,
                "deadline missed"
            );
        }
        if cx.prefire_actor(actor)? {
            cx.fire_actor(actor)?;
            cx.postfire_actor(actor, self)?;
        }
        Ok(())
    }

    /// Poll the running execution; fire its actor if it has completed
    fn progress_running(&mut self, cx: &mut DirectorContext<'_>) -> Result<bool> {
        let Some(running) = self.scheduler.core().running().copied() else {
            return Ok(false);
        };
        if self.resolution.after(completion_or_never(self.scheduler.core()), self.time) {
            return Ok(false);
        }
        let spec = self.spec(running.actor);
        let deadline = self.scheduler.deadline(running.actor);
        self.scheduler
            .schedule(running.actor, self.time, deadline, spec.execution_time)?;
        if !self.scheduler.last_scheduled_actor_finished() {
            return Ok(false);
        }
        let ready = self.executing.shift_remove(&running.actor).unwrap_or(Ready {
            released_at: self.time,
            deadline,
        });
        self.complete(cx, running.actor, ready)?;
        Ok(true)
    }

    /// Offer the processor to the most urgent waiting release
    fn dispatch(&mut self, cx: &mut DirectorContext<'_>) -> Result<bool> {
        let candidates: Vec<(ActorId, Option<Time>)> = self
            .ready
            .iter()
            .filter(|(actor, _)| !self.scheduler.is_executing(**actor))
            .filter_map(|(actor, queue)| queue.front().map(|ready| (*actor, ready.deadline)))
            .collect();
        let Some(best) = EdfScheduler::select(candidates) else {
            return Ok(false);
        };
        let Some(ready) = self.ready.get(&best).and_then(|q| q.front()).copied() else {
            return Ok(false);
        };
        let spec = self.spec(best);
        self.scheduler
            .schedule(best, self.time, ready.deadline, spec.execution_time)?;
        if self.scheduler.last_scheduled_actor_finished() {
            self.pop_ready(best);
            debug!(actor = %best, time = self.time, "dispatched and completed");
            self.complete(cx, best, ready)?;
            return Ok(true);
        }
        if self.scheduler.is_executing(best) {
            self.pop_ready(best);
            self.executing.insert(best, ready);
            debug!(actor = %best, time = self.time, deadline = ready.deadline, "dispatched");
            return Ok(true);
        }
        Ok(false)
    }

    fn pop_ready(&mut self, actor: ActorId) {
        if let Some(queue) = self.ready.get_mut(&actor) {
            queue.pop_front();
            if queue.is_empty() {
                self.ready.shift_remove(&actor);
            }
        }
    }

    fn refresh_next_time(&mut self) {
        let release = self.releases.next_time().unwrap_or(NEVER);
        self.next_time = release.min(completion_or_never(self.scheduler.core()));
    }

    fn publish(&self, cx: &mut DirectorContext<'_>) {
        cx.publish(Clock {
            current: self.time,
            next_iteration: self.next_time,
            step_size: 0.0,
        });
    }
}

impl Director for EdfDirector {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DirectorKind {
        DirectorKind::LocalOnly
    }

    fn initialize(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        self.config.validate()?;
        self.resolution = cx.resolution();
        self.scheduler = EdfScheduler::new(self.resolution);
        self.releases = TimedQueue::with_resolution(self.resolution);
        self.ready.clear();
        self.executing.clear();
        self.time = 0.0;
        self.next_time = NEVER;
        self.deadline_misses = 0;
        self.completions = 0;

        self.specs.clear();
        for actor in cx.governed_actors() {
            let name = cx.graph().actor(actor)?.name.clone();
            self.specs.insert(actor, self.config.task(&name));
        }

        self.publish(cx);
        for actor in cx.governed_actors() {
            cx.initialize_actor(actor)?;
        }
        self.drain_requests(cx);
        self.refresh_next_time();
        self.publish(cx);
        Ok(())
    }

    fn prefire(&mut self, cx: &mut DirectorContext<'_>) -> Result<bool> {
        self.drain_requests(cx);
        self.refresh_next_time();
        if self.next_time < NEVER && self.next_time > self.time {
            self.time = self.next_time;
        }
        self.publish(cx);
        Ok(!self.resolution.after(self.time, self.config.stop_time))
    }

    fn fire(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        loop {
            self.admit_due();
            let completed = self.progress_running(cx)?;
            let dispatched = self.dispatch(cx)?;
            self.drain_requests(cx);
            if !completed && !dispatched {
                break;
            }
        }
        Ok(())
    }

    fn postfire(&mut self, cx: &mut DirectorContext<'_>) -> Result<bool> {
        self.drain_requests(cx);
        self.refresh_next_time();
        self.publish(cx);
        let more = self.next_time < NEVER
            && !self.resolution.after(self.next_time, self.config.stop_time);
        if !more {
            debug!(director = %cx.path(), time = self.time, "nothing left to dispatch");
        }
        Ok(more)
    }

    fn current_time(&self) -> Time {
        self.time
    }

    fn next_iteration_time(&self) -> Time {
        self.next_time
    }

    fn fire_at(&mut self, actor: ActorId, time: Time) -> Result<()> {
        self.release(actor, time);
        Ok(())
    }

    fn deregister_actor(&mut self, actor: ActorId) {
        let dropped = self.releases.remove_where(|a| *a == actor);
        self.ready.shift_remove(&actor);
        self.specs.shift_remove(&actor);
        if dropped > 0 {
            debug!(%actor, dropped, "pending releases dropped");
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
