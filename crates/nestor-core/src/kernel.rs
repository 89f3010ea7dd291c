//! Kernel: owns the model, the actor bodies and the directors
//!
//! Lifecycle calls on any actor go through the kernel. For an atomic actor
//! the kernel runs its body against the clock published by the director
//! that governs it. For a composite the call is delegated to the resolved
//! director; when the composite is embedded in an outer domain, `prefire`
//! first moves inputs inside through the local director and `postfire`
//! afterwards moves outputs outside through the executive director.
//!
//! Directors and bodies are taken out of their slots while they run and put
//! back afterwards. A director re-entered while it is running reports
//! [`Error::DirectorBusy`]. Firing requests addressed to a running director
//! are queued on its record and delivered through
//! [`Director::fire_at`] as soon as the call that was running returns.

use crate::actor::{ActorBody, ActorContext};
use crate::config::KernelConfig;
use crate::director::Director;
use crate::error::{Error, Result};
use crate::graph::{Graph, LinkKind, PortFlags, PortListCache, Side};
use crate::identity::{ActorId, DirectorId, PortId, RelationId};
use crate::time::{Clock, Resolution, Time};
use indexmap::IndexMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Initialize,
    Prefire,
    Fire,
    Postfire,
    Wrapup,
}

impl Phase {
    fn verb(&self) -> &'static str {
        match self {
            Phase::Initialize => "initialize",
            Phase::Prefire => "prefire",
            Phase::Fire => "fire",
            Phase::Postfire => "postfire",
            Phase::Wrapup => "wrap up",
        }
    }
}

/// Owner of a model and everything that executes it
#[derive(Debug)]
pub struct Kernel {
    graph: Graph,
    config: KernelConfig,
    bodies: IndexMap<ActorId, Option<Box<dyn ActorBody>>>,
    directors: IndexMap<DirectorId, Option<Box<dyn Director>>>,
    port_cache: PortListCache,
}

impl Kernel {
    /// Create an empty kernel
    pub fn new(config: KernelConfig) -> Self {
        Self {
            graph: Graph::new(),
            config,
            bodies: IndexMap::new(),
            directors: IndexMap::new(),
            port_cache: PortListCache::new(),
        }
    }

    /// The model
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access to the model
    ///
    /// Prefer the kernel's own structural methods, which also notify
    /// directors.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Kernel configuration
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Time resolution used throughout the kernel
    pub fn resolution(&self) -> Resolution {
        self.config.time_resolution
    }

    // ---------------------------------------------------------------
    // Structure

    /// Add a top-level composite
    pub fn add_top_level(&mut self, name: &str) -> Result<ActorId> {
        self.graph.add_composite(None, name)
    }

    /// Add a composite inside `container`
    pub fn add_composite(&mut self, container: ActorId, name: &str) -> Result<ActorId> {
        let id = self.graph.add_composite(Some(container), name)?;
        self.notify_registered(id);
        Ok(id)
    }

    /// Add an atomic actor with the given body
    pub fn add_actor(
        &mut self,
        container: ActorId,
        name: &str,
        body: impl ActorBody + 'static,
    ) -> Result<ActorId> {
        let id = self.graph.add_atomic(container, name)?;
        let body: Box<dyn ActorBody> = Box::new(body);
        self.bodies.insert(id, Some(body));
        self.notify_registered(id);
        Ok(id)
    }

    /// Remove an actor and, for composites, everything inside it
    pub fn remove_actor(&mut self, actor: ActorId) -> Result<()> {
        let executive = self.graph.executive_director(actor);
        let removed = self.graph.remove_actor(actor)?;
        for id in &removed {
            self.bodies.shift_remove(id);
        }
        if let Some(Some(director)) = executive.and_then(|d| self.directors.get_mut(&d)) {
            for id in &removed {
                director.deregister_actor(*id);
            }
        }
        self.prune_detached_directors();
        Ok(())
    }

    fn notify_registered(&mut self, actor: ActorId) {
        if let Some(Some(director)) = self
            .graph
            .executive_director(actor)
            .and_then(|d| self.directors.get_mut(&d))
        {
            director.register_actor(actor);
        }
    }

    fn prune_detached_directors(&mut self) {
        let detached: Vec<DirectorId> = self
            .directors
            .keys()
            .copied()
            .filter(|id| {
                self.graph
                    .director(*id)
                    .map(|d| d.container.is_none() && d.executive_of.is_none())
                    .unwrap_or(true)
            })
            .collect();
        for id in detached {
            self.directors.shift_remove(&id);
            self.graph.remove_director(id);
        }
    }

    /// Add a token-carrying port
    pub fn add_port(&mut self, actor: ActorId, name: &str, flags: PortFlags) -> Result<PortId> {
        self.graph.add_port(actor, name, flags, LinkKind::Io)
    }

    /// Add an input port
    pub fn add_input(&mut self, actor: ActorId, name: &str) -> Result<PortId> {
        self.add_port(actor, name, PortFlags::INPUT)
    }

    /// Add an output port
    pub fn add_output(&mut self, actor: ActorId, name: &str) -> Result<PortId> {
        self.add_port(actor, name, PortFlags::OUTPUT)
    }

    /// Connect two ports through a new relation
    pub fn connect(&mut self, a: PortId, b: PortId) -> Result<RelationId> {
        self.graph.connect(a, b)
    }

    /// Attach `director` as the local director of `composite`
    ///
    /// A previous local director is detached and dropped. The actors the
    /// new director governs are registered with it.
    pub fn set_director(
        &mut self,
        composite: ActorId,
        director: impl Director + 'static,
    ) -> Result<DirectorId> {
        let id = self.graph.add_director(director.name(), director.kind());
        let previous = match self.graph.set_local_director(composite, id) {
            Ok(previous) => previous,
            Err(err) => {
                self.graph.remove_director(id);
                return Err(err);
            }
        };
        let director: Box<dyn Director> = Box::new(director);
        self.directors.insert(id, Some(director));
        if let Some(previous) = previous {
            self.directors.shift_remove(&previous);
            self.graph.remove_director(previous);
        }
        let governed = self.graph.governed_actors(composite);
        if let Some(Some(director)) = self.directors.get_mut(&id) {
            for actor in governed {
                director.register_actor(actor);
            }
        }
        debug!(
            director = %self.graph.director_path(id),
            "local director attached"
        );
        Ok(id)
    }

    /// Attach `director` as the explicit executive director of a top-level
    /// composite
    pub fn set_executive_director(
        &mut self,
        composite: ActorId,
        director: impl Director + 'static,
    ) -> Result<DirectorId> {
        let id = self.graph.add_director(director.name(), director.kind());
        let previous = match self.graph.set_executive_director(composite, id) {
            Ok(previous) => previous,
            Err(err) => {
                self.graph.remove_director(id);
                return Err(err);
            }
        };
        let mut director: Box<dyn Director> = Box::new(director);
        director.register_actor(composite);
        self.directors.insert(id, Some(director));
        if let Some(previous) = previous {
            self.directors.shift_remove(&previous);
            self.graph.remove_director(previous);
        }
        Ok(id)
    }

    /// Detach and return the local director of `composite`
    pub fn remove_director(&mut self, composite: ActorId) -> Result<Option<Box<dyn Director>>> {
        let Some(id) = self.graph.clear_local_director(composite)? else {
            return Ok(None);
        };
        self.graph.remove_director(id);
        Ok(self.directors.shift_remove(&id).flatten())
    }

    /// The director executing `actor`'s contents
    pub fn resolved_director(&self, actor: ActorId) -> Option<DirectorId> {
        self.graph.resolved_director(actor)
    }

    /// The director executing `actor` itself
    pub fn executive_director(&self, actor: ActorId) -> Option<DirectorId> {
        self.graph.executive_director(actor)
    }

    /// Borrow a director as its concrete type
    pub fn director_as<T: 'static>(&self, id: DirectorId) -> Option<&T> {
        self.directors
            .get(&id)?
            .as_deref()?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Mutably borrow a director as its concrete type
    pub fn director_as_mut<T: 'static>(&mut self, id: DirectorId) -> Option<&mut T> {
        self.directors
            .get_mut(&id)?
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Clock last published by a director
    pub fn clock(&self, id: DirectorId) -> Result<Clock> {
        Ok(self.graph.director(id)?.clock)
    }

    // ---------------------------------------------------------------
    // Lifecycle

    /// Initialize an actor (creating receivers for composites)
    pub fn initialize(&mut self, actor: ActorId) -> Result<()> {
        self.invoke(actor, Phase::Initialize, None).map(|_| ())
    }

    /// Prefire an actor
    pub fn prefire(&mut self, actor: ActorId) -> Result<bool> {
        self.invoke(actor, Phase::Prefire, None)
    }

    /// Fire an actor
    pub fn fire(&mut self, actor: ActorId) -> Result<()> {
        self.invoke(actor, Phase::Fire, None).map(|_| ())
    }

    /// Postfire an actor
    pub fn postfire(&mut self, actor: ActorId) -> Result<bool> {
        self.invoke(actor, Phase::Postfire, None)
    }

    /// Wrap up an actor
    pub fn wrapup(&mut self, actor: ActorId) -> Result<()> {
        self.invoke(actor, Phase::Wrapup, None).map(|_| ())
    }

    fn invoke(
        &mut self,
        actor: ActorId,
        phase: Phase,
        executive: Option<&mut dyn Director>,
    ) -> Result<bool> {
        if self.graph.actor(actor)?.is_composite() {
            self.invoke_composite(actor, phase, executive)
        } else {
            self.invoke_atomic(actor, phase)
        }
    }

    fn invoke_atomic(&mut self, actor: ActorId, phase: Phase) -> Result<bool> {
        let director = self
            .graph
            .executive_director(actor)
            .ok_or_else(|| Error::NoDirector {
                actor: self.graph.actor_path(actor),
                operation: phase.verb(),
            })?;
        let clock = self.graph.director(director)?.clock;
        let path = self.graph.actor_path(actor);
        let mut body = self
            .bodies
            .get_mut(&actor)
            .ok_or_else(|| Error::UnknownEntity(format!("body of {path}")))?
            .take()
            .ok_or_else(|| Error::actor(path, "re-entered while executing"))?;

        let result = {
            let mut cx = ActorContext::new(
                &mut self.graph,
                actor,
                Some(director),
                clock.current,
                clock.step_size,
                self.config.time_resolution,
            );
            match phase {
                Phase::Initialize => body.initialize(&mut cx).map(|_| true),
                Phase::Prefire => body.prefire(&mut cx),
                Phase::Fire => body.fire(&mut cx).map(|_| true),
                Phase::Postfire => body.postfire(&mut cx),
                Phase::Wrapup => body.wrapup(&mut cx).map(|_| true),
            }
        };
        if let Some(slot) = self.bodies.get_mut(&actor) {
            *slot = Some(body);
        }
        result
    }

    fn invoke_composite(
        &mut self,
        actor: ActorId,
        phase: Phase,
        executive: Option<&mut dyn Director>,
    ) -> Result<bool> {
        let director = self
            .graph
            .resolved_director(actor)
            .ok_or_else(|| Error::NoDirector {
                actor: self.graph.actor_path(actor),
                operation: phase.verb(),
            })?;
        let embedded = self.graph.actor(actor)?.local_director.is_some()
            && self.graph.executive_director(actor).is_some();

        match phase {
            Phase::Initialize => self.with_director(director, |dir, cx| {
                cx.create_receivers(&*dir)?;
                dir.initialize(cx).map(|_| true)
            }),
            Phase::Prefire if embedded => self.with_director(director, |dir, cx| {
                for port in cx.input_ports(actor) {
                    dir.transfer_inputs(cx, port)?;
                }
                dir.prefire(cx)
            }),
            Phase::Prefire => self.with_director(director, |dir, cx| dir.prefire(cx)),
            Phase::Fire => self.with_director(director, |dir, cx| dir.fire(cx).map(|_| true)),
            Phase::Postfire => {
                let keep_going = self.with_director(director, |dir, cx| dir.postfire(cx))?;
                if embedded {
                    self.transfer_outputs_of(actor, executive)?;
                }
                Ok(keep_going)
            }
            Phase::Wrapup => self.with_director(director, |dir, cx| dir.wrapup(cx).map(|_| true)),
        }
    }

    fn transfer_outputs_of(
        &mut self,
        actor: ActorId,
        executive: Option<&mut dyn Director>,
    ) -> Result<()> {
        let Some(exec_id) = self.graph.executive_director(actor) else {
            return Ok(());
        };
        let outputs = self.port_cache.outputs(&self.graph, actor);
        match executive {
            Some(exec) => {
                let mut cx = self.context(exec_id)?;
                for port in outputs {
                    exec.transfer_outputs(&mut cx, port)?;
                }
                Ok(())
            }
            None => self.with_director(exec_id, |dir, cx| {
                for port in outputs {
                    dir.transfer_outputs(cx, port)?;
                }
                Ok(())
            }),
        }
    }

    fn context(&mut self, director: DirectorId) -> Result<DirectorContext<'_>> {
        let record = self.graph.director(director)?;
        let container = record
            .container
            .or(record.executive_of)
            .ok_or_else(|| Error::UnknownEntity(format!("container of {director}")))?;
        Ok(DirectorContext {
            kernel: self,
            director,
            container,
        })
    }

    fn with_director<R>(
        &mut self,
        id: DirectorId,
        f: impl FnOnce(&mut dyn Director, &mut DirectorContext<'_>) -> Result<R>,
    ) -> Result<R> {
        let slot = self
            .directors
            .get_mut(&id)
            .ok_or_else(|| Error::UnknownEntity(id.to_string()))?;
        let Some(mut director) = slot.take() else {
            return Err(Error::DirectorBusy {
                director: self.graph.director_path(id),
            });
        };

        let result = match self.context(id) {
            Ok(mut cx) => f(&mut *director, &mut cx),
            Err(err) => Err(err),
        };

        let delivered = self.deliver_refires(id, &mut *director);
        if let Ok(record) = self.graph.director_mut(id) {
            record.clock = Clock {
                current: director.current_time(),
                next_iteration: director.next_iteration_time(),
                step_size: director.step_size(),
            };
        }
        if let Some(slot) = self.directors.get_mut(&id) {
            *slot = Some(director);
        }
        let value = result?;
        delivered?;
        Ok(value)
    }

    fn deliver_refires(&mut self, id: DirectorId, director: &mut dyn Director) -> Result<()> {
        for (actor, time) in self.graph.take_refires(id) {
            debug!(
                director = %self.graph.director_path(id),
                actor = %self.graph.actor_path(actor),
                time,
                "firing request delivered"
            );
            director.fire_at(actor, time)?;
        }
        Ok(())
    }

    fn body_mut(&mut self, actor: ActorId) -> Option<&mut Box<dyn ActorBody>> {
        self.bodies.get_mut(&actor)?.as_mut()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

/// What a director can see and do while one of its methods runs
pub struct DirectorContext<'a> {
    kernel: &'a mut Kernel,
    director: DirectorId,
    container: ActorId,
}

impl<'a> DirectorContext<'a> {
    /// The running director
    pub fn director(&self) -> DirectorId {
        self.director
    }

    /// The composite whose contents the director governs
    pub fn container(&self) -> ActorId {
        self.container
    }

    /// Dotted path of the running director
    pub fn path(&self) -> String {
        self.kernel.graph.director_path(self.director)
    }

    /// The model
    pub fn graph(&self) -> &Graph {
        &self.kernel.graph
    }

    /// Mutable access to the model (receivers, transfers)
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.kernel.graph
    }

    /// Kernel configuration
    pub fn config(&self) -> &KernelConfig {
        &self.kernel.config
    }

    /// Time resolution
    pub fn resolution(&self) -> Resolution {
        self.kernel.config.time_resolution
    }

    /// Actors governed by the running director, in containment order
    pub fn governed_actors(&self) -> Vec<ActorId> {
        self.kernel.graph.governed_actors(self.container)
    }

    /// Input ports of `actor`, cached per graph version
    pub fn input_ports(&mut self, actor: ActorId) -> Vec<PortId> {
        self.kernel.port_cache.inputs(&self.kernel.graph, actor)
    }

    /// Output ports of `actor`, cached per graph version
    pub fn output_ports(&mut self, actor: ActorId) -> Vec<PortId> {
        self.kernel.port_cache.outputs(&self.kernel.graph, actor)
    }

    /// The director executing the container, if embedded
    pub fn executive(&self) -> Option<DirectorId> {
        self.kernel.graph.executive_director(self.container)
    }

    /// Whether the container is the top of the model
    pub fn is_top_level(&self) -> bool {
        self.executive().is_none()
    }

    /// The clock published by the executive director
    pub fn executive_clock(&self) -> Option<Clock> {
        let exec = self.executive()?;
        self.kernel.graph.director(exec).ok().map(|d| d.clock)
    }

    /// The clock this director last published
    pub fn clock(&self) -> Clock {
        self.kernel
            .graph
            .director(self.director)
            .map(|d| d.clock)
            .unwrap_or_default()
    }

    /// Publish a clock; atomic actors fired next see this time and step
    pub fn publish(&mut self, clock: Clock) {
        if let Ok(record) = self.kernel.graph.director_mut(self.director) {
            record.clock = clock;
        }
    }

    /// Ask the executive director to fire the container at `time`
    pub fn request_refire(&mut self, time: Time) -> Result<()> {
        let exec = self.executive().ok_or_else(|| Error::NoDirector {
            actor: self.kernel.graph.actor_path(self.container),
            operation: "request a firing",
        })?;
        debug!(director = %self.path(), time, "refire requested");
        self.kernel.graph.push_refire(exec, self.container, time)
    }

    /// Firing requests made to this director during the current call
    pub fn take_refire_requests(&mut self) -> Vec<(ActorId, Time)> {
        self.kernel.graph.take_refires(self.director)
    }

    /// Create receivers for every governed input port (and the inside of
    /// the container's output ports), replacing any existing ones
    pub fn create_receivers(&mut self, director: &dyn Director) -> Result<()> {
        for actor in self.governed_actors() {
            for port in self.kernel.graph.input_ports(actor) {
                for relation in self.kernel.graph.links(port, Side::Outside) {
                    let receiver =
                        director.new_receiver(self.kernel.graph.port(port)?, &self.kernel.config);
                    self.kernel
                        .graph
                        .install_receiver(port, relation, Side::Outside, receiver)?;
                }
            }
        }
        for port in self.kernel.graph.output_ports(self.container) {
            for relation in self.kernel.graph.links(port, Side::Inside) {
                let receiver =
                    director.new_receiver(self.kernel.graph.port(port)?, &self.kernel.config);
                self.kernel
                    .graph
                    .install_receiver(port, relation, Side::Inside, receiver)?;
            }
        }
        Ok(())
    }

    /// Initialize a governed actor
    pub fn initialize_actor(&mut self, actor: ActorId) -> Result<()> {
        self.kernel.invoke(actor, Phase::Initialize, None).map(|_| ())
    }

    /// Prefire a governed actor
    pub fn prefire_actor(&mut self, actor: ActorId) -> Result<bool> {
        self.kernel.invoke(actor, Phase::Prefire, None)
    }

    /// Fire a governed actor
    pub fn fire_actor(&mut self, actor: ActorId) -> Result<()> {
        self.kernel.invoke(actor, Phase::Fire, None).map(|_| ())
    }

    /// Postfire a governed actor
    ///
    /// `executive` is the running director itself; it moves the outputs of
    /// an embedded composite to the outside.
    pub fn postfire_actor(&mut self, actor: ActorId, executive: &mut dyn Director) -> Result<bool> {
        self.kernel.invoke(actor, Phase::Postfire, Some(executive))
    }

    /// Wrap up a governed actor
    pub fn wrapup_actor(&mut self, actor: ActorId) -> Result<()> {
        self.kernel.invoke(actor, Phase::Wrapup, None).map(|_| ())
    }

    /// Whether an actor supports rollback
    pub fn is_stateful(&mut self, actor: ActorId) -> bool {
        self.kernel
            .body_mut(actor)
            .is_some_and(|b| b.stateful().is_some())
    }

    /// Snapshot an actor's state; `false` if it has none
    pub fn mark_state(&mut self, actor: ActorId) -> bool {
        match self.kernel.body_mut(actor).and_then(|b| b.stateful()) {
            Some(state) => {
                state.mark_state();
                true
            }
            None => false,
        }
    }

    /// Restore an actor's last snapshot; `false` if it has none
    pub fn restore_marked_state(&mut self, actor: ActorId) -> bool {
        match self.kernel.body_mut(actor).and_then(|b| b.stateful()) {
            Some(state) => {
                state.restore_marked_state();
                true
            }
            None => false,
        }
    }

    /// Whether an actor reports a discontinuity at the current step
    pub fn has_current_event(&mut self, actor: ActorId) -> bool {
        self.kernel
            .body_mut(actor)
            .is_some_and(|b| b.has_current_event())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::DirectorKind;
    use crate::token::Token;
    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Logs its lifecycle; with an output it forwards one token per firing
    #[derive(Debug)]
    struct Tracer {
        label: &'static str,
        log: Log,
    }

    impl ActorBody for Tracer {
        fn initialize(&mut self, _cx: &mut ActorContext<'_>) -> Result<()> {
            self.log.borrow_mut().push(format!("{}:init", self.label));
            Ok(())
        }

        fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
            self.log
                .borrow_mut()
                .push(format!("{}:fire@{}", self.label, cx.time()));
            if let Ok(out) = cx.port("out") {
                if let Ok(input) = cx.port("in") {
                    while cx.has_token(input)? {
                        cx.get(input)?;
                    }
                }
                cx.send(out, Token::Int(1))?;
            }
            Ok(())
        }
    }

    /// Fires every governed actor once per iteration, for a fixed count
    #[derive(Debug)]
    struct Looper {
        kind: DirectorKind,
        limit: u32,
        count: u32,
        registered: Vec<ActorId>,
    }

    impl Looper {
        fn new(kind: DirectorKind, limit: u32) -> Self {
            Self {
                kind,
                limit,
                count: 0,
                registered: Vec::new(),
            }
        }
    }

    impl Director for Looper {
        fn name(&self) -> &str {
            "looper"
        }

        fn kind(&self) -> DirectorKind {
            self.kind
        }

        fn initialize(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
            self.count = 0;
            for actor in cx.governed_actors() {
                cx.initialize_actor(actor)?;
            }
            Ok(())
        }

        fn fire(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
            for actor in cx.governed_actors() {
                if cx.prefire_actor(actor)? {
                    cx.fire_actor(actor)?;
                    cx.postfire_actor(actor, self)?;
                }
            }
            Ok(())
        }

        fn postfire(&mut self, _cx: &mut DirectorContext<'_>) -> Result<bool> {
            self.count += 1;
            Ok(self.count < self.limit)
        }

        fn current_time(&self) -> Time {
            f64::from(self.count)
        }

        fn register_actor(&mut self, actor: ActorId) {
            self.registered.push(actor);
        }

        fn deregister_actor(&mut self, actor: ActorId) {
            self.registered.retain(|a| *a != actor);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_resolution_recurses_to_container() {
        let mut kernel = Kernel::default();
        let top = kernel.add_top_level("top").unwrap();
        let mid = kernel.add_composite(top, "mid").unwrap();
        let inner = kernel.add_composite(mid, "inner").unwrap();
        assert_eq!(kernel.resolved_director(inner), None);

        let director = kernel
            .set_director(top, Looper::new(DirectorKind::LocalOnly, 1))
            .unwrap();
        assert_eq!(kernel.resolved_director(inner), Some(director));
        assert_eq!(kernel.executive_director(mid), Some(director));
        assert!(!kernel.graph().is_atomic(inner));
        assert!(kernel.graph().is_atomic(top));
    }

    #[test]
    fn test_lifecycle_without_director_fails() {
        let mut kernel = Kernel::default();
        let top = kernel.add_top_level("top").unwrap();
        let err = kernel.fire(top).unwrap_err();
        assert!(matches!(err, Error::NoDirector { operation: "fire", .. }));
        assert!(err.to_string().starts_with(".top"));
    }

    #[test]
    fn test_executive_director_only_at_top_level() {
        let mut kernel = Kernel::default();
        let top = kernel.add_top_level("top").unwrap();
        let inner = kernel.add_composite(top, "inner").unwrap();
        let err = kernel
            .set_executive_director(inner, Looper::new(DirectorKind::Wormhole, 1))
            .unwrap_err();
        assert!(matches!(err, Error::IllegalExecutiveDirector { .. }));

        let exec = kernel
            .set_executive_director(top, Looper::new(DirectorKind::Wormhole, 1))
            .unwrap();
        assert_eq!(kernel.resolved_director(top), Some(exec));
        assert_eq!(kernel.resolved_director(inner), Some(exec));
    }

    #[test]
    fn test_local_only_director_rejected_inside() {
        let mut kernel = Kernel::default();
        let top = kernel.add_top_level("top").unwrap();
        let inner = kernel.add_composite(top, "inner").unwrap();
        let err = kernel
            .set_director(inner, Looper::new(DirectorKind::LocalOnly, 1))
            .unwrap_err();
        assert!(matches!(err, Error::IllegalInsideDirector { .. }));
        assert_eq!(kernel.resolved_director(inner), None);
    }

    #[test]
    fn test_replacing_director_detaches_previous() {
        let mut kernel = Kernel::default();
        let top = kernel.add_top_level("top").unwrap();
        let first = kernel
            .set_director(top, Looper::new(DirectorKind::LocalOnly, 1))
            .unwrap();
        let second = kernel
            .set_director(top, Looper::new(DirectorKind::LocalOnly, 2))
            .unwrap();
        assert_eq!(kernel.resolved_director(top), Some(second));
        assert!(kernel.graph().director(first).is_err());
        assert!(kernel.director_as::<Looper>(first).is_none());

        let removed = kernel.remove_director(top).unwrap();
        assert!(removed.is_some());
        assert_eq!(kernel.resolved_director(top), None);
    }

    #[test]
    fn test_register_hooks_follow_structure() {
        let mut kernel = Kernel::default();
        let top = kernel.add_top_level("top").unwrap();
        let log = Log::default();
        let early = kernel
            .add_actor(top, "early", Tracer { label: "early", log: log.clone() })
            .unwrap();
        let director = kernel
            .set_director(top, Looper::new(DirectorKind::LocalOnly, 1))
            .unwrap();
        let late = kernel
            .add_actor(top, "late", Tracer { label: "late", log })
            .unwrap();

        let looper = kernel.director_as::<Looper>(director).unwrap();
        assert_eq!(looper.registered, vec![early, late]);

        kernel.remove_actor(early).unwrap();
        let looper = kernel.director_as::<Looper>(director).unwrap();
        assert_eq!(looper.registered, vec![late]);
    }

    #[test]
    fn test_wormhole_transfers_through_boundary() {
        let mut kernel = Kernel::default();
        let log = Log::default();
        let top = kernel.add_top_level("top").unwrap();
        let source = kernel
            .add_actor(top, "source", Tracer { label: "source", log: log.clone() })
            .unwrap();
        let source_out = kernel.add_output(source, "out").unwrap();

        let inner = kernel.add_composite(top, "inner").unwrap();
        let inner_in = kernel.add_input(inner, "in").unwrap();
        let inner_out = kernel.add_output(inner, "out").unwrap();
        let relay = kernel
            .add_actor(inner, "relay", Tracer { label: "relay", log: log.clone() })
            .unwrap();
        let relay_in = kernel.add_input(relay, "in").unwrap();
        let relay_out = kernel.add_output(relay, "out").unwrap();

        let sink = kernel
            .add_actor(top, "sink", Tracer { label: "sink", log: log.clone() })
            .unwrap();
        let sink_in = kernel.add_input(sink, "in").unwrap();

        kernel.connect(source_out, inner_in).unwrap();
        kernel.connect(inner_in, relay_in).unwrap();
        kernel.connect(relay_out, inner_out).unwrap();
        kernel.connect(inner_out, sink_in).unwrap();

        kernel
            .set_director(top, Looper::new(DirectorKind::LocalOnly, 1))
            .unwrap();
        kernel
            .set_director(inner, Looper::new(DirectorKind::Wormhole, 1))
            .unwrap();

        kernel.initialize(top).unwrap();
        assert!(kernel.prefire(top).unwrap());
        kernel.fire(top).unwrap();

        // source fired before inner, so inner moved the token inside on
        // prefire, relay consumed it, and postfire moved its output out to
        // sink
        assert!(!kernel.graph().has_token(relay_in).unwrap());
        assert!(kernel.graph().has_token(sink_in).unwrap());
        let entries = log.borrow().clone();
        assert!(entries.contains(&"relay:fire@0".to_string()));
        assert!(!kernel.postfire(top).unwrap());
    }

    #[test]
    fn test_reentering_running_director_is_refused() {
        #[derive(Debug)]
        struct Reenter {
            top: ActorId,
        }

        impl Director for Reenter {
            fn name(&self) -> &str {
                "reenter"
            }
            fn kind(&self) -> DirectorKind {
                DirectorKind::LocalOnly
            }
            fn initialize(&mut self, _cx: &mut DirectorContext<'_>) -> Result<()> {
                Ok(())
            }
            fn fire(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
                cx.kernel.fire(self.top)
            }
            fn postfire(&mut self, _cx: &mut DirectorContext<'_>) -> Result<bool> {
                Ok(false)
            }
            fn current_time(&self) -> Time {
                0.0
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let mut kernel = Kernel::default();
        let top = kernel.add_top_level("top").unwrap();
        kernel.set_director(top, Reenter { top }).unwrap();
        kernel.initialize(top).unwrap();
        assert!(matches!(kernel.fire(top), Err(Error::DirectorBusy { .. })));
        // the slot is restored after the failed call
        assert!(kernel.fire(top).is_err());
        assert!(!kernel.postfire(top).unwrap());
    }
}
