//! Actor bodies and the context they run in
//!
//! An actor body is opaque computation behind the standard lifecycle:
//! `initialize`, then any number of `prefire`/`fire`/`postfire` rounds,
//! then `wrapup`. Bodies exchange tokens only through their ports, via the
//! [`ActorContext`] handed to every call.

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::identity::{ActorId, DirectorId, PortId};
use crate::port::Delivery;
use crate::receiver::Event;
use crate::time::{Resolution, Time};
use crate::token::Token;
use std::fmt;

/// State that can be snapshotted and restored by a rollback controller
///
/// `mark_state` is only ever called when local time equals the outer
/// time, so a restored actor is consistent with its environment.
pub trait Stateful {
    /// Record the current state as known-good
    fn mark_state(&mut self);

    /// Return to the last recorded state
    fn restore_marked_state(&mut self);
}

/// Behavior of an atomic actor
pub trait ActorBody: fmt::Debug {
    /// Prepare for execution; ports already have their receivers
    fn initialize(&mut self, _cx: &mut ActorContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Check whether the actor is ready to fire
    fn prefire(&mut self, _cx: &mut ActorContext<'_>) -> Result<bool> {
        Ok(true)
    }

    /// Compute outputs from inputs and state
    fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()>;

    /// Commit state; `false` asks not to be fired again
    fn postfire(&mut self, _cx: &mut ActorContext<'_>) -> Result<bool> {
        Ok(true)
    }

    /// Release resources at the end of a run
    fn wrapup(&mut self, _cx: &mut ActorContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Rollback support, if the actor has state
    fn stateful(&mut self) -> Option<&mut dyn Stateful> {
        None
    }

    /// Whether the actor detected a discontinuity during the last step
    fn has_current_event(&self) -> bool {
        false
    }
}

/// What an actor body can see and do during a lifecycle call
pub struct ActorContext<'a> {
    graph: &'a mut Graph,
    actor: ActorId,
    director: Option<DirectorId>,
    time: Time,
    step_size: f64,
    resolution: Resolution,
}

impl<'a> ActorContext<'a> {
    pub(crate) fn new(
        graph: &'a mut Graph,
        actor: ActorId,
        director: Option<DirectorId>,
        time: Time,
        step_size: f64,
        resolution: Resolution,
    ) -> Self {
        Self {
            graph,
            actor,
            director,
            time,
            step_size,
            resolution,
        }
    }

    /// The actor being executed
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Dotted path of the actor being executed
    pub fn path(&self) -> String {
        self.graph.actor_path(self.actor)
    }

    /// Model time of the governing director
    pub fn time(&self) -> Time {
        self.time
    }

    /// Step size of the current iteration (0 in discrete domains)
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Time resolution of the kernel
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Read-only view of the model
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// Find one of this actor's ports by name
    pub fn port(&self, name: &str) -> Result<PortId> {
        self.graph
            .port_by_name(self.actor, name)
            .ok_or_else(|| Error::UnknownEntity(format!("port {}.{}", self.path(), name)))
    }

    /// Take the next token from an input port
    pub fn get(&mut self, port: PortId) -> Result<Token> {
        self.graph.get(port)
    }

    /// Take the next event (token and timestamp) from an input port
    pub fn get_event(&mut self, port: PortId) -> Result<Event> {
        self.graph.get_event(port)
    }

    /// Take the next token from one channel of an input port
    pub fn get_channel(&mut self, port: PortId, channel: usize) -> Result<Token> {
        self.graph.get_channel(port, channel)
    }

    /// Whether any channel of an input port holds a token
    pub fn has_token(&self, port: PortId) -> Result<bool> {
        self.graph.has_token(port)
    }

    /// Send a token stamped with the current time
    pub fn send(&mut self, port: PortId, token: impl Into<Token>) -> Result<Delivery> {
        self.graph.send(port, token.into(), self.time)
    }

    /// Ask the governing director to fire this actor at `time`
    pub fn fire_at(&mut self, time: Time) -> Result<()> {
        let director = self.director.ok_or_else(|| Error::NoDirector {
            actor: self.graph.actor_path(self.actor),
            operation: "request a firing",
        })?;
        self.graph.push_refire(director, self.actor, time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LinkKind, PortFlags};

    #[derive(Debug)]
    struct Echo;

    impl ActorBody for Echo {
        fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
            let input = cx.port("in")?;
            let output = cx.port("out")?;
            while cx.has_token(input)? {
                let token = cx.get(input)?;
                cx.send(output, token)?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_port_lookup_by_name() {
        let mut graph = Graph::new();
        let top = graph.add_composite(None, "top").unwrap();
        let echo = graph.add_atomic(top, "echo").unwrap();
        let input = graph.add_port(echo, "in", PortFlags::INPUT, LinkKind::Io).unwrap();

        let cx = ActorContext::new(&mut graph, echo, None, 0.0, 0.0, Resolution::DEFAULT);
        assert_eq!(cx.port("in").unwrap(), input);
        assert!(matches!(cx.port("missing"), Err(Error::UnknownEntity(_))));
        assert_eq!(cx.path(), ".top.echo");
    }

    #[test]
    fn test_fire_at_without_director_fails() {
        let mut graph = Graph::new();
        let top = graph.add_composite(None, "top").unwrap();
        let echo = graph.add_atomic(top, "echo").unwrap();

        let mut cx = ActorContext::new(&mut graph, echo, None, 0.0, 0.0, Resolution::DEFAULT);
        let err = cx.fire_at(1.0).unwrap_err();
        assert!(matches!(err, Error::NoDirector { .. }));
        let mut body = Echo;
        assert!(body.stateful().is_none());
        assert!(!body.has_current_event());
    }
}
