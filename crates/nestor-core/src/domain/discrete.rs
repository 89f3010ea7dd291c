//! Discrete-event director
//!
//! Actors are fired when a firing request for the current time comes due
//! or when one of their input ports holds an event stamped at or before
//! the current time. Receivers are time-ordered, so events are consumed in
//! timestamp order regardless of the order in which they were sent.
//!
//! At the top of a model the director advances time to the earliest
//! pending request or input event and stops once nothing is left before
//! the stop time. Embedded, it follows the executive director's clock and
//! asks it for a firing at its own next event time.

use crate::config::{KernelConfig, ReceiverConfig};
use crate::director::{Director, DirectorKind};
use crate::error::Result;
use crate::graph::PortNode;
use crate::identity::ActorId;
use crate::kernel::DirectorContext;
use crate::receiver::{self, Receiver, TimedQueue};
use crate::time::{Clock, Resolution, Time, NEVER};
use indexmap::IndexSet;
use std::any::Any;
use tracing::debug;

/// Discrete-event execution
#[derive(Debug, Clone)]
pub struct EventDirector {
    name: String,
    start_time: Time,
    stop_time: Time,
    time: Time,
    requests: TimedQueue<ActorId>,
    due: IndexSet<ActorId>,
    next_time: Time,
    resolution: Resolution,
}

impl EventDirector {
    /// Create a director starting at 0 with no stop time
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_time: 0.0,
            stop_time: NEVER,
            time: 0.0,
            requests: TimedQueue::new(),
            due: IndexSet::new(),
            next_time: NEVER,
            resolution: Resolution::DEFAULT,
        }
    }

    /// Do not advance past `stop_time`
    pub fn with_stop_time(mut self, stop_time: Time) -> Self {
        self.stop_time = stop_time;
        self
    }

    /// Start the clock at `start_time` (top level only)
    pub fn with_start_time(mut self, start_time: Time) -> Self {
        self.start_time = start_time;
        self
    }

    /// Configured stop time
    pub fn stop_time(&self) -> Time {
        self.stop_time
    }

    /// Number of pending firing requests
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    fn schedule(&mut self, actor: ActorId, time: Time) {
        let time = if self.resolution.before(time, self.time) {
            debug!(%actor, requested = time, now = self.time, "request in the past fires now");
            self.time
        } else {
            time
        };
        self.requests.put(actor, time);
    }

    fn drain_requests(&mut self, cx: &mut DirectorContext<'_>) {
        for (actor, time) in cx.take_refire_requests() {
            self.schedule(actor, time);
        }
    }

    /// Earliest input event over the governed actors
    fn earliest_input(&self, cx: &mut DirectorContext<'_>, after: Option<Time>) -> Time {
        let mut earliest = NEVER;
        for actor in cx.governed_actors() {
            for port in cx.input_ports(actor) {
                if let Some(t) = cx.graph().next_input_time(port) {
                    let counts = after.map_or(true, |after| self.resolution.after(t, after));
                    if counts && t < earliest {
                        earliest = t;
                    }
                }
            }
        }
        earliest
    }

    fn has_due_input(&self, cx: &mut DirectorContext<'_>, actor: ActorId) -> bool {
        cx.input_ports(actor).into_iter().any(|port| {
            cx.graph()
                .next_input_time(port)
                .is_some_and(|t| !self.resolution.after(t, self.time))
        })
    }

    fn refresh_next_time(&mut self, cx: &mut DirectorContext<'_>) {
        let queued = self.requests.next_time().unwrap_or(NEVER);
        let input = self.earliest_input(cx, Some(self.time));
        self.next_time = queued.min(input);
    }

    fn pop_due(&mut self) {
        while let Some(t) = self.requests.next_time() {
            if self.resolution.after(t, self.time) {
                break;
            }
            if let Ok((_, actor)) = self.requests.take() {
                self.due.insert(actor);
            }
        }
    }

    fn drop_stale_input(&self, cx: &mut DirectorContext<'_>, actor: ActorId) {
        for port in cx.input_ports(actor) {
            while cx
                .graph()
                .next_input_time(port)
                .is_some_and(|t| !self.resolution.after(t, self.time))
            {
                if cx.graph_mut().get(port).is_err() {
                    break;
                }
            }
        }
        debug!(actor = %cx.graph().actor_path(actor), "unconsumed input discarded");
    }

    fn publish(&self, cx: &mut DirectorContext<'_>) {
        cx.publish(Clock {
            current: self.time,
            next_iteration: self.next_time,
            step_size: 0.0,
        });
    }
}

impl Director for EventDirector {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DirectorKind {
        DirectorKind::Wormhole
    }

    fn initialize(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        self.resolution = cx.resolution();
        self.requests = TimedQueue::with_resolution(self.resolution);
        self.due.clear();
        self.time = match cx.executive_clock() {
            Some(outer) => outer.current,
            None => self.start_time,
        };
        self.next_time = NEVER;
        self.publish(cx);

        for actor in cx.governed_actors() {
            cx.initialize_actor(actor)?;
        }
        self.drain_requests(cx);
        self.refresh_next_time(cx);
        if !cx.is_top_level() && self.next_time < NEVER {
            cx.request_refire(self.next_time)?;
        }
        Ok(())
    }

    fn prefire(&mut self, cx: &mut DirectorContext<'_>) -> Result<bool> {
        self.drain_requests(cx);
        match cx.executive_clock() {
            Some(outer) => self.time = outer.current,
            None => {
                let queued = self.requests.next_time().unwrap_or(NEVER);
                let next = queued.min(self.earliest_input(cx, None));
                if next < NEVER && next > self.time {
                    self.time = next;
                }
            }
        }
        self.pop_due();
        self.refresh_next_time(cx);
        self.publish(cx);
        Ok(!self.resolution.after(self.time, self.stop_time))
    }

    fn fire(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        loop {
            let ready: Vec<ActorId> = cx
                .governed_actors()
                .into_iter()
                .filter(|actor| self.due.contains(actor) || self.has_due_input(cx, *actor))
                .collect();
            if ready.is_empty() {
                break;
            }
            for actor in ready {
                self.due.shift_remove(&actor);
                if cx.prefire_actor(actor)? {
                    cx.fire_actor(actor)?;
                    cx.postfire_actor(actor, self)?;
                }
                // Actors that did not consume their input must not be
                // retried in this iteration
                if self.has_due_input(cx, actor) {
                    self.drop_stale_input(cx, actor);
                }
            }
            self.drain_requests(cx);
        }
        Ok(())
    }

    fn postfire(&mut self, cx: &mut DirectorContext<'_>) -> Result<bool> {
        self.drain_requests(cx);
        self.refresh_next_time(cx);
        self.publish(cx);
        if !cx.is_top_level() {
            if self.next_time < NEVER {
                cx.request_refire(self.next_time)?;
            }
            return Ok(true);
        }
        let more = self.next_time < NEVER && !self.resolution.after(self.next_time, self.stop_time);
        if !more {
            debug!(director = %cx.path(), time = self.time, "no events left");
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
        self.schedule(actor, time);
        Ok(())
    }

    fn new_receiver(&self, port: &PortNode, config: &KernelConfig) -> Box<dyn Receiver> {
        let discipline = match &port.receiver_config {
            Some(requested @ ReceiverConfig::PriorityOrdered { .. }) => requested.clone(),
            _ => ReceiverConfig::TimeOrdered,
        };
        receiver::new_receiver(&discipline, config.time_resolution)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorBody, ActorContext};
    use crate::kernel::Kernel;
    use crate::manager::Manager;
    use crate::token::Token;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Trace = Rc<RefCell<Vec<(Time, i64)>>>;

    /// Emits an increasing counter at each requested time
    #[derive(Debug)]
    struct Ticker {
        times: Vec<Time>,
        next: i64,
    }

    impl ActorBody for Ticker {
        fn initialize(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
            for t in &self.times {
                cx.fire_at(*t)?;
            }
            Ok(())
        }

        fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
            let out = cx.port("out")?;
            cx.send(out, Token::Int(self.next))?;
            self.next += 1;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Recorder {
        trace: Trace,
    }

    impl ActorBody for Recorder {
        fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
            let input = cx.port("in")?;
            while cx.has_token(input)? {
                let event = cx.get_event(input)?;
                let value = event.token.as_int().unwrap_or_default();
                self.trace.borrow_mut().push((cx.time(), value));
            }
            Ok(())
        }
    }

    fn ticker_model(times: Vec<Time>, stop: Time) -> (Manager, Trace) {
        let trace = Trace::default();
        let mut kernel = Kernel::default();
        let top = kernel.add_top_level("top").unwrap();
        let ticker = kernel.add_actor(top, "ticker", Ticker { times, next: 0 }).unwrap();
        let out = kernel.add_output(ticker, "out").unwrap();
        let recorder = kernel
            .add_actor(top, "recorder", Recorder { trace: trace.clone() })
            .unwrap();
        let input = kernel.add_input(recorder, "in").unwrap();
        kernel.connect(out, input).unwrap();
        kernel
            .set_director(top, EventDirector::new("de").with_stop_time(stop))
            .unwrap();
        (Manager::new(kernel, top), trace)
    }

    #[test]
    fn test_fires_at_requested_times_in_order() {
        let (mut manager, trace) = ticker_model(vec![2.0, 0.5, 1.0], 10.0);
        let report = manager.run().unwrap();
        assert_eq!(*trace.borrow(), vec![(0.5, 0), (1.0, 1), (2.0, 2)]);
        assert_eq!(report.iterations, 3);
    }

    #[test]
    fn test_stop_time_bounds_run() {
        let (mut manager, trace) = ticker_model(vec![1.0, 2.0, 3.0], 2.0);
        manager.run().unwrap();
        assert_eq!(*trace.borrow(), vec![(1.0, 0), (2.0, 1)]);
    }

    #[test]
    fn test_receivers_are_time_ordered() {
        let (mut manager, _) = ticker_model(vec![1.0], 2.0);
        manager.initialize().unwrap();
        let kernel = manager.kernel();
        let recorder = kernel.graph().child_by_name(manager.top(), "recorder").unwrap();
        let input = kernel.graph().port_by_name(recorder, "in").unwrap();
        let relation = kernel.graph().port(input).unwrap().relations[0];
        let receiver = kernel.graph().receiver(input, relation).unwrap();
        assert!(receiver.kind().is_time_ordered());
    }

    #[test]
    fn test_past_request_fires_now() {
        let mut director = EventDirector::new("de");
        director.time = 5.0;
        director.fire_at(ActorId::new(1), 1.0).unwrap();
        assert_eq!(director.requests.next_time(), Some(5.0));
    }
}
