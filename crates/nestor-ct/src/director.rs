//! Mixed-signal director: continuous time under an event-driven executive
//!
//! Embedded in a discrete-event model, the director runs its continuous
//! subsystem ahead of the outer clock by at most the run-ahead length and
//! asks the executive for a firing at the end of each run. If the
//! executive comes back earlier than that (an outer event arrived in the
//! meantime), local time is ahead of outer time and the director rolls its
//! stateful actors back to the last known-good snapshot, then catches up
//! to the outer time.
//!
//! ```text
//!          known-good        outer now        local
//!              │                 │              │
//!  ────────────●─────────────────┼──────────────●─────►
//!              └── restore ──────┘ catch up     rolled back
//! ```
//!
//! Snapshots are only taken where local time equals outer time: at the
//! start of a run that begins on a breakpoint, and after an event phase.
//! At the top of a model the director simply integrates from the start
//! time to the stop time, one step per iteration.

use crate::breakpoints::BreakpointTable;
use crate::config::MixedSignalConfig;
use indexmap::IndexSet;
use nestor_core::{
    ActorId, Clock, Director, DirectorContext, DirectorKind, Error, PortId, Resolution, Result,
    Side, Time, NEVER,
};
use std::any::Any;
use tracing::{debug, info};

/// Execution state of a [`MixedSignalDirector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// At the top of the model
    TopLevelRun,
    /// Embedded, integrating toward the iteration end
    EmbeddedNormal,
    /// Embedded, handling a discontinuity or an outer input at one instant
    EmbeddedEventPhase,
}

/// Continuous-time director with rollback and catch-up
#[derive(Debug, Clone)]
pub struct MixedSignalDirector {
    name: String,
    config: MixedSignalConfig,
    resolution: Resolution,
    time: Time,
    step: f64,
    breakpoints: BreakpointTable,
    event_phase: bool,
    known_good_time: Option<Time>,
    outside_time: Time,
    iteration_end: Time,
    rollback_count: u64,
    top_level: Option<(u64, bool)>,
    schedule: Option<(u64, Vec<ActorId>)>,
}

impl MixedSignalDirector {
    /// Create a director with the given parameters
    pub fn new(name: impl Into<String>, config: MixedSignalConfig) -> Self {
        Self {
            name: name.into(),
            resolution: config.resolution(),
            time: config.start_time,
            step: 0.0,
            breakpoints: BreakpointTable::new(config.resolution()),
            event_phase: false,
            known_good_time: None,
            outside_time: config.start_time,
            iteration_end: config.start_time,
            rollback_count: 0,
            top_level: None,
            schedule: None,
            config,
        }
    }

    /// Director parameters
    pub fn config(&self) -> &MixedSignalConfig {
        &self.config
    }

    /// Current execution state
    pub fn mode(&self) -> Mode {
        match (self.top_level.map_or(true, |(_, top)| top), self.event_phase) {
            (true, _) => Mode::TopLevelRun,
            (false, false) => Mode::EmbeddedNormal,
            (false, true) => Mode::EmbeddedEventPhase,
        }
    }

    /// End of the current embedded run
    pub fn iteration_end(&self) -> Time {
        self.iteration_end
    }

    /// Outer time seen by the last `prefire`
    pub fn outside_time(&self) -> Time {
        self.outside_time
    }

    /// Time of the last state snapshot
    pub fn known_good_time(&self) -> Option<Time> {
        self.known_good_time
    }

    /// Rollbacks performed since initialize
    pub fn rollback_count(&self) -> u64 {
        self.rollback_count
    }

    /// Pending breakpoints
    pub fn breakpoints(&self) -> &BreakpointTable {
        &self.breakpoints
    }

    fn is_top_level(&mut self, cx: &DirectorContext<'_>) -> bool {
        let version = cx.graph().version();
        match self.top_level {
            Some((cached, top)) if cached == version => top,
            _ => {
                let top = cx.is_top_level();
                self.top_level = Some((version, top));
                top
            }
        }
    }

    /// Governed actors ordered so that producers fire before consumers
    ///
    /// Feedback loops are broken at a stateful actor when there is one.
    fn schedule(&mut self, cx: &mut DirectorContext<'_>) -> Result<Vec<ActorId>> {
        let version = cx.graph().version();
        if let Some((cached, order)) = &self.schedule {
            if *cached == version {
                return Ok(order.clone());
            }
        }

        let actors = cx.governed_actors();
        let governed: IndexSet<ActorId> = actors.iter().copied().collect();
        let mut edges: Vec<(ActorId, ActorId)> = Vec::new();
        for actor in &actors {
            for port in cx.output_ports(*actor) {
                for destination in cx.graph().destinations(port, Side::Outside) {
                    let owner = cx.graph().port(destination.port)?.owner;
                    if owner != *actor && governed.contains(&owner) {
                        edges.push((*actor, owner));
                    }
                }
            }
        }

        let mut remaining: IndexSet<ActorId> = governed;
        let mut order = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let ready = remaining
                .iter()
                .copied()
                .find(|a| !edges.iter().any(|(from, to)| to == a && remaining.contains(from)));
            let next = match ready {
                Some(actor) => actor,
                None => {
                    let stateful = remaining.iter().copied().find(|a| cx.is_stateful(*a));
                    let Some(actor) = stateful.or_else(|| remaining.first().copied()) else {
                        break;
                    };
                    debug!(actor = %cx.graph().actor_path(actor), "feedback loop broken");
                    actor
                }
            };
            remaining.shift_remove(&next);
            order.push(next);
        }

        self.schedule = Some((version, order.clone()));
        Ok(order)
    }

    fn publish(&self, cx: &mut DirectorContext<'_>, step: f64) {
        cx.publish(Clock {
            current: self.time,
            next_iteration: self.iteration_end,
            step_size: step,
        });
    }

    fn drain_requests(&mut self, cx: &mut DirectorContext<'_>) {
        for (_, time) in cx.take_refire_requests() {
            self.breakpoints.insert(time);
        }
    }

    /// Largest step toward `limit` that does not cross a breakpoint
    fn step_toward(&self, limit: Time) -> f64 {
        let mut step = self.config.step_size;
        if let Some(bp) = self.breakpoints.next_after(self.time) {
            step = step.min(bp - self.time);
        }
        step.min(limit - self.time).max(0.0)
    }

    /// Fire every actor over one step of size `step`
    ///
    /// With `detect` set, an actor reporting a current event aborts the
    /// step before any state is committed and `true` is returned.
    fn pass(&mut self, cx: &mut DirectorContext<'_>, step: f64, detect: bool) -> Result<bool> {
        let order = self.schedule(cx)?;
        self.step = step;
        self.publish(cx, step);

        let mut fired = Vec::with_capacity(order.len());
        for actor in &order {
            if cx.prefire_actor(*actor)? {
                cx.fire_actor(*actor)?;
                fired.push(*actor);
            }
        }
        if detect && order.iter().any(|a| cx.has_current_event(*a)) {
            self.drain_requests(cx);
            return Ok(true);
        }
        for actor in &fired {
            cx.postfire_actor(*actor, self)?;
        }
        self.drain_requests(cx);

        self.time += step;
        let landed = self
            .breakpoints
            .iter()
            .find(|bp| self.resolution.equal(*bp, self.time));
        if let Some(bp) = landed {
            self.time = bp;
        }
        Ok(false)
    }

    /// Consume a breakpoint at the current time; `true` if there was one
    fn process_breakpoints(&mut self) -> bool {
        self.breakpoints.drop_before(self.time);
        if self.breakpoints.is_at(self.time) {
            self.breakpoints.remove_first();
            true
        } else {
            false
        }
    }

    /// Whether the step just taken landed on a breakpoint short of `end`
    fn stopped_on_breakpoint(&mut self, end: Time) -> bool {
        self.breakpoints.drop_before(self.time);
        self.breakpoints.is_at(self.time) && self.resolution.before(self.time, end)
    }

    fn mark_states(&mut self, cx: &mut DirectorContext<'_>) {
        for actor in cx.governed_actors() {
            cx.mark_state(actor);
        }
        self.known_good_time = Some(self.time);
        debug!(director = %cx.path(), time = self.time, "states marked");
    }

    fn rollback(&mut self, cx: &mut DirectorContext<'_>, target: Time) -> Result<()> {
        let known_good = match self.known_good_time {
            Some(t) if !self.resolution.after(t, target) => t,
            other => {
                return Err(Error::RollbackUnavailable {
                    director: cx.path(),
                    target,
                    known_good: other,
                })
            }
        };
        info!(
            director = %cx.path(),
            from = self.time,
            to = known_good,
            outer = target,
            "rolling back"
        );
        for actor in cx.governed_actors() {
            cx.restore_marked_state(actor);
        }
        self.time = known_good;
        self.rollback_count += 1;
        self.breakpoints.insert(target);
        self.catch_up(cx, target)
    }

    /// Integrate to `target` without reporting breakpoints or events
    fn catch_up(&mut self, cx: &mut DirectorContext<'_>, target: Time) -> Result<()> {
        while self.resolution.before(self.time, target) {
            let step = self.step_toward(target);
            self.pass(cx, step, false)?;
        }
        self.time = target;
        debug!(director = %cx.path(), time = self.time, "caught up");
        Ok(())
    }

    fn event_phase_execution(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        debug!(director = %cx.path(), time = self.time, "event phase");
        self.pass(cx, 0.0, false)?;
        Ok(())
    }

    fn set_iteration_end(&mut self, cx: &DirectorContext<'_>, end: Time) -> Result<()> {
        if self.resolution.before(end, self.time) {
            return Err(Error::IterationEndInPast {
                director: cx.path(),
                end,
                current: self.time,
            });
        }
        self.iteration_end = end;
        Ok(())
    }

    /// Drop output samples that do not belong to the outer instant
    ///
    /// Only samples computed where local time equals outer time leave the
    /// container. Samples from running ahead may still be rolled back, and
    /// samples replayed during catch-up were already seen outside.
    fn hold_back_outputs(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        let outer = self.outside_time;
        let resolution = self.resolution;
        for port in cx.output_ports(cx.container()) {
            let dropped = cx
                .graph_mut()
                .retain_inside_events(port, |event| resolution.equal(event.time, outer))?;
            if dropped > 0 {
                debug!(
                    port = %cx.graph().port_path(port),
                    dropped,
                    outer,
                    "output samples off the outer instant held back"
                );
            }
        }
        Ok(())
    }

    fn prefire_embedded(&mut self, cx: &mut DirectorContext<'_>) -> Result<bool> {
        let outer = cx.executive_clock().ok_or_else(|| Error::NoDirector {
            actor: cx.graph().actor_path(cx.container()),
            operation: "read the outer clock",
        })?;
        self.outside_time = outer.current;
        let next = outer.next_iteration;
        let run_length = next - outer.current;

        if run_length < 0.0 {
            return Err(Error::OuterTimeRegressed {
                director: cx.path(),
                current: outer.current,
                next,
            });
        }
        if run_length == 0.0 {
            return Ok(false);
        }
        if run_length < self.resolution.epsilon() {
            debug!(director = %cx.path(), next, "next outer iteration too near");
            cx.request_refire(next)?;
            return Ok(false);
        }
        if self.resolution.equal(outer.current, self.time) {
            self.time = outer.current;
        }
        if outer.current > self.time {
            return Err(Error::TimeCollapse {
                director: cx.path(),
                outer: outer.current,
                local: self.time,
            });
        }
        if outer.current < self.time {
            self.rollback(cx, outer.current)?;
        }

        let end = if run_length < self.config.run_ahead_length {
            next
        } else {
            outer.current + self.config.run_ahead_length
        };
        self.set_iteration_end(cx, end)?;
        debug!(
            director = %cx.path(),
            outer = outer.current,
            iteration_end = self.iteration_end,
            "iteration planned"
        );
        self.publish(cx, 0.0);
        Ok(true)
    }

    fn fire_embedded(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        if self.event_phase {
            self.event_phase_execution(cx)?;
            self.mark_states(cx);
            self.event_phase = false;
            cx.request_refire(self.outside_time)?;
            return Ok(());
        }
        loop {
            if self.process_breakpoints() {
                self.mark_states(cx);
            }
            self.breakpoints.insert(self.iteration_end);
            let step = self.step_toward(self.iteration_end);
            let event = self.pass(cx, step, true)?;
            if event || self.stopped_on_breakpoint(self.iteration_end) {
                debug!(director = %cx.path(), time = self.time, "stopped by event");
                cx.request_refire(self.time)?;
                self.event_phase = true;
                return Ok(());
            }
            if !self.resolution.before(self.time, self.iteration_end) {
                self.time = self.iteration_end;
                cx.request_refire(self.iteration_end)?;
                return Ok(());
            }
        }
    }

    fn fire_top_level(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        if self.event_phase {
            self.event_phase_execution(cx)?;
            self.event_phase = false;
            return Ok(());
        }
        self.process_breakpoints();
        let stop = self.config.stop_time;
        let step = self.step_toward(stop);
        let event = self.pass(cx, step, true)?;
        if event || self.stopped_on_breakpoint(stop) {
            debug!(director = %cx.path(), time = self.time, "stopped by event");
            self.event_phase = true;
        }
        Ok(())
    }
}

impl Director for MixedSignalDirector {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DirectorKind {
        DirectorKind::TimeSynchronizing
    }

    fn initialize(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        self.config.validate()?;
        self.resolution = self.config.resolution();
        self.breakpoints = BreakpointTable::new(self.resolution);
        self.event_phase = false;
        self.known_good_time = None;
        self.rollback_count = 0;
        self.step = 0.0;
        self.top_level = None;
        self.schedule = None;

        let top = self.is_top_level(cx);
        self.time = match cx.executive_clock() {
            Some(outer) if !top => outer.current,
            _ => self.config.start_time,
        };
        self.outside_time = self.time;
        self.iteration_end = self.time;
        self.breakpoints.insert(self.time);
        if top && self.config.stop_time < NEVER {
            self.breakpoints.insert(self.config.stop_time);
        }
        self.publish(cx, 0.0);

        for actor in cx.governed_actors() {
            cx.initialize_actor(actor)?;
        }
        self.drain_requests(cx);
        if !top {
            cx.request_refire(self.time)?;
        }
        Ok(())
    }

    fn prefire(&mut self, cx: &mut DirectorContext<'_>) -> Result<bool> {
        if self.is_top_level(cx) {
            self.publish(cx, 0.0);
            return Ok(self.event_phase || self.resolution.before(self.time, self.config.stop_time));
        }
        self.prefire_embedded(cx)
    }

    fn fire(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        if self.is_top_level(cx) {
            self.fire_top_level(cx)
        } else {
            self.fire_embedded(cx)
        }
    }

    fn postfire(&mut self, cx: &mut DirectorContext<'_>) -> Result<bool> {
        if !self.is_top_level(cx) {
            self.hold_back_outputs(cx)?;
            return Ok(true);
        }
        Ok(self.event_phase || self.resolution.before(self.time, self.config.stop_time))
    }

    fn current_time(&self) -> Time {
        self.time
    }

    fn next_iteration_time(&self) -> Time {
        match self.mode() {
            Mode::TopLevelRun => {
                let next_bp = self.breakpoints.next_after(self.time).unwrap_or(NEVER);
                next_bp.min(self.time + self.config.step_size)
            }
            _ => self.iteration_end,
        }
    }

    fn step_size(&self) -> f64 {
        self.step
    }

    fn fire_at(&mut self, _actor: ActorId, time: Time) -> Result<()> {
        self.breakpoints.insert(time);
        Ok(())
    }

    fn transfer_inputs(&mut self, cx: &mut DirectorContext<'_>, port: PortId) -> Result<bool> {
        let moved = cx.graph_mut().transfer_inputs(port)?;
        if moved {
            self.event_phase = true;
        }
        Ok(moved)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
