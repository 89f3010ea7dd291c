//! Graph arena: actors, ports, relations and director records
//!
//! The graph is the shared structural model. Every node lives in an
//! insertion-ordered map keyed by a stable ID; containment and director
//! links are stored as IDs in both directions.
//!
//! Every structural mutation bumps [`Graph::version`]. Readers that cache
//! derived views (for example [`PortListCache`]) compare the version they
//! computed against and refresh only when it changed. Mutation is refused
//! while an iteration is in progress.

use crate::config::ReceiverConfig;
use crate::director::DirectorKind;
use crate::error::{Error, Result};
use crate::identity::{ActorId, DirectorId, PortId, RelationId};
use crate::receiver::Receiver;
use crate::time::{Clock, Time};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Whether an actor is a leaf or aggregates other actors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorKind {
    Atomic,
    Composite,
}

/// Kind of a port or relation; only equal kinds may be linked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LinkKind {
    /// Carries tokens
    #[default]
    Io,
    /// Purely structural connection, never carries tokens
    Structural,
}

/// Direction capabilities of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortFlags {
    pub is_input: bool,
    pub is_output: bool,
}

impl PortFlags {
    /// Input-only port
    pub const INPUT: PortFlags = PortFlags {
        is_input: true,
        is_output: false,
    };
    /// Output-only port
    pub const OUTPUT: PortFlags = PortFlags {
        is_input: false,
        is_output: true,
    };
    /// Bidirectional port
    pub const INOUT: PortFlags = PortFlags {
        is_input: true,
        is_output: true,
    };
}

/// An actor node
#[derive(Debug)]
pub struct ActorNode {
    pub id: ActorId,
    pub name: String,
    pub kind: ActorKind,
    pub container: Option<ActorId>,
    pub ports: Vec<PortId>,
    /// Child actors (composites only)
    pub children: Vec<ActorId>,
    /// Relations owned by this composite
    pub relations: Vec<RelationId>,
    /// Director governing this composite's contents
    pub local_director: Option<DirectorId>,
    /// Explicitly assigned executive director (top level only)
    pub executive_director: Option<DirectorId>,
}

impl ActorNode {
    /// Check if this is a composite
    pub fn is_composite(&self) -> bool {
        self.kind == ActorKind::Composite
    }
}

/// A port node
#[derive(Debug)]
pub struct PortNode {
    pub id: PortId,
    pub name: String,
    pub owner: ActorId,
    pub flags: PortFlags,
    pub kind: LinkKind,
    pub relations: Vec<RelationId>,
    /// Receiver discipline requested by the port itself, overriding the
    /// director's default
    pub receiver_config: Option<ReceiverConfig>,
    /// Receivers for tokens arriving from outside, one per relation
    pub(crate) receivers: IndexMap<RelationId, Box<dyn Receiver>>,
    /// Receivers on the inside of an opaque composite's output port
    pub(crate) inside_receivers: IndexMap<RelationId, Box<dyn Receiver>>,
}

impl PortNode {
    /// Check if this port accepts tokens
    pub fn is_input(&self) -> bool {
        self.flags.is_input
    }

    /// Check if this port sends tokens
    pub fn is_output(&self) -> bool {
        self.flags.is_output
    }
}

/// A relation node: an undirected hyper-edge between ports
#[derive(Debug)]
pub struct RelationNode {
    pub id: RelationId,
    pub name: String,
    pub container: ActorId,
    pub kind: LinkKind,
    pub ports: Vec<PortId>,
}

/// Bookkeeping for a director, shared with the directors nested below it
#[derive(Debug)]
pub struct DirectorNode {
    pub id: DirectorId,
    pub name: String,
    pub kind: DirectorKind,
    /// Composite this director is the local director of
    pub container: Option<ActorId>,
    /// Top-level composite this director is the explicit executive of
    pub executive_of: Option<ActorId>,
    /// Clock as last published by the director
    pub clock: Clock,
    /// Firing requests waiting to be delivered to the director
    pub(crate) refire_requests: Vec<(ActorId, Time)>,
}

/// Which receivers a delivery lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The receivers that collect tokens arriving from outside the owner
    Outside,
    /// The receivers inside an opaque composite's output port
    Inside,
}

/// A receiver a token will be delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub port: PortId,
    pub relation: RelationId,
    pub side: Side,
}

/// The structural model
#[derive(Debug, Default)]
pub struct Graph {
    actors: IndexMap<ActorId, ActorNode>,
    ports: IndexMap<PortId, PortNode>,
    relations: IndexMap<RelationId, RelationNode>,
    directors: IndexMap<DirectorId, DirectorNode>,
    next_id: u64,
    version: u64,
    iterating: bool,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Structural version, bumped by every mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether an iteration is in progress
    pub fn is_iterating(&self) -> bool {
        self.iterating
    }

    pub(crate) fn set_iterating(&mut self, iterating: bool) {
        self.iterating = iterating;
    }

    fn fresh_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn bump(&mut self) {
        self.version += 1;
    }

    fn ensure_mutable(&self, subject: String, operation: &'static str) -> Result<()> {
        if self.iterating {
            return Err(Error::MutationDuringIteration { subject, operation });
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Lookups

    /// Look up an actor
    pub fn actor(&self, id: ActorId) -> Result<&ActorNode> {
        self.actors
            .get(&id)
            .ok_or_else(|| Error::UnknownEntity(id.to_string()))
    }

    fn actor_mut(&mut self, id: ActorId) -> Result<&mut ActorNode> {
        self.actors
            .get_mut(&id)
            .ok_or_else(|| Error::UnknownEntity(id.to_string()))
    }

    /// Look up a port
    pub fn port(&self, id: PortId) -> Result<&PortNode> {
        self.ports
            .get(&id)
            .ok_or_else(|| Error::UnknownEntity(id.to_string()))
    }

    pub(crate) fn port_mut(&mut self, id: PortId) -> Result<&mut PortNode> {
        self.ports
            .get_mut(&id)
            .ok_or_else(|| Error::UnknownEntity(id.to_string()))
    }

    /// Look up a relation
    pub fn relation(&self, id: RelationId) -> Result<&RelationNode> {
        self.relations
            .get(&id)
            .ok_or_else(|| Error::UnknownEntity(id.to_string()))
    }

    /// Look up a director record
    pub fn director(&self, id: DirectorId) -> Result<&DirectorNode> {
        self.directors
            .get(&id)
            .ok_or_else(|| Error::UnknownEntity(id.to_string()))
    }

    pub(crate) fn director_mut(&mut self, id: DirectorId) -> Result<&mut DirectorNode> {
        self.directors
            .get_mut(&id)
            .ok_or_else(|| Error::UnknownEntity(id.to_string()))
    }

    /// All actor IDs in insertion order
    pub fn actor_ids(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.actors.keys().copied()
    }

    /// All port IDs in insertion order
    pub fn port_ids(&self) -> impl Iterator<Item = PortId> + '_ {
        self.ports.keys().copied()
    }

    /// Find a direct child by name
    pub fn child_by_name(&self, container: ActorId, name: &str) -> Option<ActorId> {
        let node = self.actors.get(&container)?;
        node.children
            .iter()
            .copied()
            .find(|child| self.actors.get(child).is_some_and(|c| c.name == name))
    }

    /// Find a port of an actor by name
    pub fn port_by_name(&self, actor: ActorId, name: &str) -> Option<PortId> {
        let node = self.actors.get(&actor)?;
        node.ports
            .iter()
            .copied()
            .find(|port| self.ports.get(port).is_some_and(|p| p.name == name))
    }

    // ---------------------------------------------------------------
    // Paths

    /// Dotted path of an actor, e.g. `.top.plant`
    pub fn actor_path(&self, id: ActorId) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.actors.get(&current) {
                Some(node) => {
                    names.push(node.name.as_str());
                    cursor = node.container;
                }
                None => {
                    names.push("<removed>");
                    break;
                }
            }
        }
        names.reverse();
        format!(".{}", names.join("."))
    }

    /// Dotted path of a port
    pub fn port_path(&self, id: PortId) -> String {
        match self.ports.get(&id) {
            Some(port) => format!("{}.{}", self.actor_path(port.owner), port.name),
            None => id.to_string(),
        }
    }

    /// Dotted path of a relation
    pub fn relation_path(&self, id: RelationId) -> String {
        match self.relations.get(&id) {
            Some(rel) => format!("{}.{}", self.actor_path(rel.container), rel.name),
            None => id.to_string(),
        }
    }

    /// Dotted path of a director (under its container when attached)
    pub fn director_path(&self, id: DirectorId) -> String {
        match self.directors.get(&id) {
            Some(dir) => match dir.container.or(dir.executive_of) {
                Some(container) => format!("{}.{}", self.actor_path(container), dir.name),
                None => format!(".{}", dir.name),
            },
            None => id.to_string(),
        }
    }

    // ---------------------------------------------------------------
    // Structure

    /// Add a composite actor; `None` creates a top-level composite
    pub fn add_composite(&mut self, container: Option<ActorId>, name: &str) -> Result<ActorId> {
        self.add_actor_node(container, name, ActorKind::Composite)
    }

    /// Add an atomic actor inside `container`
    pub fn add_atomic(&mut self, container: ActorId, name: &str) -> Result<ActorId> {
        self.add_actor_node(Some(container), name, ActorKind::Atomic)
    }

    fn add_actor_node(
        &mut self,
        container: Option<ActorId>,
        name: &str,
        kind: ActorKind,
    ) -> Result<ActorId> {
        if let Some(parent) = container {
            self.ensure_mutable(self.actor_path(parent), "add an actor to")?;
            self.ensure_composite(parent)?;
        }
        let id = ActorId(self.fresh_id());
        self.actors.insert(
            id,
            ActorNode {
                id,
                name: name.to_string(),
                kind,
                container,
                ports: Vec::new(),
                children: Vec::new(),
                relations: Vec::new(),
                local_director: None,
                executive_director: None,
            },
        );
        if let Some(parent) = container {
            self.actor_mut(parent)?.children.push(id);
        }
        self.bump();
        Ok(id)
    }

    fn ensure_composite(&self, id: ActorId) -> Result<()> {
        if !self.actor(id)?.is_composite() {
            return Err(Error::InvalidArgument(format!(
                "{} is not a composite actor",
                self.actor_path(id)
            )));
        }
        Ok(())
    }

    /// Move an actor into another composite
    pub fn set_container(&mut self, actor: ActorId, container: ActorId) -> Result<()> {
        self.ensure_mutable(self.actor_path(actor), "move")?;
        self.ensure_composite(container)?;
        let mut cursor = Some(container);
        while let Some(current) = cursor {
            if current == actor {
                return Err(Error::RecursiveContainment {
                    actor: self.actor_path(actor),
                    container: self.actor_path(container),
                });
            }
            cursor = self.actor(current)?.container;
        }
        if self.actor(actor)?.executive_director.is_some() {
            return Err(Error::IllegalExecutiveDirector {
                actor: self.actor_path(actor),
            });
        }

        let ports = self.actor(actor)?.ports.clone();
        for port in ports {
            let outside: Vec<RelationId> = self
                .port(port)?
                .relations
                .iter()
                .copied()
                .filter(|rel| self.relations.get(rel).is_some_and(|r| r.container != actor))
                .collect();
            for rel in outside {
                self.unlink(port, rel)?;
            }
        }

        if let Some(old) = self.actor(actor)?.container {
            self.actor_mut(old)?.children.retain(|c| *c != actor);
        }
        self.actor_mut(container)?.children.push(actor);
        self.actor_mut(actor)?.container = Some(container);
        self.bump();
        Ok(())
    }

    /// Remove an actor, its ports and (for composites) everything inside it
    ///
    /// Returns the removed actor IDs, deepest first.
    pub fn remove_actor(&mut self, actor: ActorId) -> Result<Vec<ActorId>> {
        self.ensure_mutable(self.actor_path(actor), "remove")?;
        let mut removed = Vec::new();
        self.remove_actor_inner(actor, &mut removed)?;
        self.bump();
        Ok(removed)
    }

    fn remove_actor_inner(&mut self, actor: ActorId, removed: &mut Vec<ActorId>) -> Result<()> {
        let node = self.actor(actor)?;
        let children = node.children.clone();
        let relations = node.relations.clone();
        let ports = node.ports.clone();
        let container = node.container;

        for child in children {
            self.remove_actor_inner(child, removed)?;
        }
        for rel in relations {
            self.remove_relation_inner(rel)?;
        }
        for port in ports {
            let links = self.port(port)?.relations.clone();
            for rel in links {
                if let Some(r) = self.relations.get_mut(&rel) {
                    r.ports.retain(|p| *p != port);
                }
            }
            self.ports.shift_remove(&port);
        }
        if let Some(parent) = container {
            if let Some(p) = self.actors.get_mut(&parent) {
                p.children.retain(|c| *c != actor);
            }
        }
        if let Some(node) = self.actors.shift_remove(&actor) {
            for dir in [node.local_director, node.executive_director].into_iter().flatten() {
                if let Some(d) = self.directors.get_mut(&dir) {
                    if d.container == Some(actor) {
                        d.container = None;
                    }
                    if d.executive_of == Some(actor) {
                        d.executive_of = None;
                    }
                }
            }
        }
        removed.push(actor);
        Ok(())
    }

    /// Add a port to an actor
    pub fn add_port(
        &mut self,
        actor: ActorId,
        name: &str,
        flags: PortFlags,
        kind: LinkKind,
    ) -> Result<PortId> {
        self.ensure_mutable(self.actor_path(actor), "add a port to")?;
        self.actor(actor)?;
        let id = PortId(self.fresh_id());
        self.ports.insert(
            id,
            PortNode {
                id,
                name: name.to_string(),
                owner: actor,
                flags,
                kind,
                relations: Vec::new(),
                receiver_config: None,
                receivers: IndexMap::new(),
                inside_receivers: IndexMap::new(),
            },
        );
        self.actor_mut(actor)?.ports.push(id);
        self.bump();
        Ok(id)
    }

    /// Request a specific receiver discipline for a port
    pub fn set_receiver_config(&mut self, port: PortId, config: Option<ReceiverConfig>) -> Result<()> {
        self.ensure_mutable(self.port_path(port), "reconfigure")?;
        self.port_mut(port)?.receiver_config = config;
        self.bump();
        Ok(())
    }

    /// Add a relation owned by `container`
    pub fn add_relation(&mut self, container: ActorId, name: &str, kind: LinkKind) -> Result<RelationId> {
        self.ensure_mutable(self.actor_path(container), "add a relation to")?;
        self.ensure_composite(container)?;
        let id = RelationId(self.fresh_id());
        self.relations.insert(
            id,
            RelationNode {
                id,
                name: name.to_string(),
                container,
                kind,
                ports: Vec::new(),
            },
        );
        self.actor_mut(container)?.relations.push(id);
        self.bump();
        Ok(id)
    }

    /// Remove a relation, unlinking all its ports
    pub fn remove_relation(&mut self, relation: RelationId) -> Result<()> {
        self.ensure_mutable(self.relation_path(relation), "remove")?;
        self.remove_relation_inner(relation)?;
        self.bump();
        Ok(())
    }

    fn remove_relation_inner(&mut self, relation: RelationId) -> Result<()> {
        let Some(rel) = self.relations.shift_remove(&relation) else {
            return Ok(());
        };
        for port in rel.ports {
            if let Some(p) = self.ports.get_mut(&port) {
                p.relations.retain(|r| *r != relation);
                p.receivers.shift_remove(&relation);
                p.inside_receivers.shift_remove(&relation);
            }
        }
        if let Some(container) = self.actors.get_mut(&rel.container) {
            container.relations.retain(|r| *r != relation);
        }
        Ok(())
    }

    /// Link a port to a relation
    ///
    /// The relation must carry the port's kind and live either in the
    /// port owner's container (an outside link) or, for composites, in the
    /// owner itself (an inside link).
    pub fn link(&mut self, port: PortId, relation: RelationId) -> Result<()> {
        self.ensure_mutable(self.port_path(port), "link")?;
        let p = self.port(port)?;
        let r = self.relation(relation)?;
        let owner = self.actor(p.owner)?;
        let placement_ok = owner.container == Some(r.container)
            || (owner.is_composite() && r.container == owner.id);
        if p.kind != r.kind || !placement_ok {
            return Err(Error::IncompatibleLink {
                port: self.port_path(port),
                relation: self.relation_path(relation),
            });
        }
        if p.relations.contains(&relation) {
            return Ok(());
        }
        self.port_mut(port)?.relations.push(relation);
        if let Some(r) = self.relations.get_mut(&relation) {
            r.ports.push(port);
        }
        self.bump();
        Ok(())
    }

    /// Remove the link between a port and a relation
    pub fn unlink(&mut self, port: PortId, relation: RelationId) -> Result<()> {
        self.ensure_mutable(self.port_path(port), "unlink")?;
        let p = self.port_mut(port)?;
        p.relations.retain(|r| *r != relation);
        p.receivers.shift_remove(&relation);
        p.inside_receivers.shift_remove(&relation);
        if let Some(r) = self.relations.get_mut(&relation) {
            r.ports.retain(|q| *q != port);
        }
        self.bump();
        Ok(())
    }

    /// Connect two ports with a fresh relation
    ///
    /// The relation is placed in the composite both ports can see: the
    /// shared container of two siblings, or the composite whose boundary
    /// port is being wired to one of its children.
    pub fn connect(&mut self, a: PortId, b: PortId) -> Result<RelationId> {
        let owner_a = self.actor(self.port(a)?.owner)?;
        let owner_b = self.actor(self.port(b)?.owner)?;
        let container = if owner_a.container.is_some() && owner_a.container == owner_b.container {
            owner_a.container
        } else if owner_b.container == Some(owner_a.id) {
            Some(owner_a.id)
        } else if owner_a.container == Some(owner_b.id) {
            Some(owner_b.id)
        } else {
            None
        };
        let Some(container) = container else {
            return Err(Error::IncompatibleLink {
                port: self.port_path(a),
                relation: format!("<no common container with {}>", self.port_path(b)),
            });
        };
        let kind = self.port(a)?.kind;
        let name = format!("r{}", self.next_id + 1);
        let relation = self.add_relation(container, &name, kind)?;
        self.link(a, relation)?;
        self.link(b, relation)?;
        Ok(relation)
    }

    // ---------------------------------------------------------------
    // Directors

    /// Register a director record
    pub(crate) fn add_director(&mut self, name: &str, kind: DirectorKind) -> DirectorId {
        let id = DirectorId(self.fresh_id());
        self.directors.insert(
            id,
            DirectorNode {
                id,
                name: name.to_string(),
                kind,
                container: None,
                executive_of: None,
                clock: Clock::new(),
                refire_requests: Vec::new(),
            },
        );
        self.bump();
        id
    }

    /// Drop a director record, clearing any link to it
    pub(crate) fn remove_director(&mut self, id: DirectorId) {
        let Some(node) = self.directors.shift_remove(&id) else {
            return;
        };
        if let Some(actor) = node.container.and_then(|c| self.actors.get_mut(&c)) {
            if actor.local_director == Some(id) {
                actor.local_director = None;
            }
        }
        if let Some(actor) = node.executive_of.and_then(|c| self.actors.get_mut(&c)) {
            if actor.executive_director == Some(id) {
                actor.executive_director = None;
            }
        }
        self.bump();
    }

    /// Make `director` the local director of `composite`
    ///
    /// The previous local director (if any) is detached first, and the new
    /// director is detached from whatever composite it governed before.
    /// Returns the detached previous director.
    pub(crate) fn set_local_director(
        &mut self,
        composite: ActorId,
        director: DirectorId,
    ) -> Result<Option<DirectorId>> {
        self.ensure_mutable(self.actor_path(composite), "set the director of")?;
        self.ensure_composite(composite)?;
        let dir = self.director(director)?;
        if dir.kind == DirectorKind::LocalOnly && self.actor(composite)?.container.is_some() {
            return Err(Error::IllegalInsideDirector {
                director: self.director_path(director),
                actor: self.actor_path(composite),
            });
        }
        if let Some(other) = dir.container {
            if other != composite {
                self.actor_mut(other)?.local_director = None;
            }
        }
        let previous = self.actor(composite)?.local_director;
        if let Some(prev) = previous {
            self.director_mut(prev)?.container = None;
        }
        self.actor_mut(composite)?.local_director = Some(director);
        self.director_mut(director)?.container = Some(composite);
        self.bump();
        Ok(previous.filter(|prev| *prev != director))
    }

    /// Detach the local director of `composite`
    pub(crate) fn clear_local_director(&mut self, composite: ActorId) -> Result<Option<DirectorId>> {
        self.ensure_mutable(self.actor_path(composite), "clear the director of")?;
        let previous = self.actor_mut(composite)?.local_director.take();
        if let Some(prev) = previous {
            self.director_mut(prev)?.container = None;
        }
        self.bump();
        Ok(previous)
    }

    /// Make `director` the explicit executive director of a top-level
    /// composite
    pub(crate) fn set_executive_director(
        &mut self,
        composite: ActorId,
        director: DirectorId,
    ) -> Result<Option<DirectorId>> {
        self.ensure_mutable(self.actor_path(composite), "set the executive director of")?;
        if self.actor(composite)?.container.is_some() {
            return Err(Error::IllegalExecutiveDirector {
                actor: self.actor_path(composite),
            });
        }
        if let Some(other) = self.director(director)?.executive_of {
            if other != composite {
                self.actor_mut(other)?.executive_director = None;
            }
        }
        let previous = self.actor(composite)?.executive_director;
        if let Some(prev) = previous {
            self.director_mut(prev)?.executive_of = None;
        }
        self.actor_mut(composite)?.executive_director = Some(director);
        self.director_mut(director)?.executive_of = Some(composite);
        self.bump();
        Ok(previous.filter(|prev| *prev != director))
    }

    /// The director that executes `actor`'s contents
    ///
    /// The local director if set, otherwise the executive director.
    pub fn resolved_director(&self, actor: ActorId) -> Option<DirectorId> {
        let node = self.actors.get(&actor)?;
        node.local_director.or_else(|| self.executive_director(actor))
    }

    /// The director that executes `actor` itself
    ///
    /// The explicitly assigned executive director of a top-level composite,
    /// otherwise the resolved director of the container.
    pub fn executive_director(&self, actor: ActorId) -> Option<DirectorId> {
        let node = self.actors.get(&actor)?;
        if node.executive_director.is_some() {
            return node.executive_director;
        }
        node.container.and_then(|c| self.resolved_director(c))
    }

    /// Atomic actors are atomic; composites are atomic iff they have a
    /// local director
    pub fn is_atomic(&self, actor: ActorId) -> bool {
        self.actors
            .get(&actor)
            .is_some_and(|node| !node.is_composite() || node.local_director.is_some())
    }

    /// A composite with a local director nested inside another composite
    pub fn is_wormhole(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|node| {
            node.is_composite() && node.local_director.is_some() && node.container.is_some()
        })
    }

    /// A composite without a local director: flattened for execution
    pub fn is_transparent(&self, actor: ActorId) -> bool {
        self.actors
            .get(&actor)
            .is_some_and(|node| node.is_composite() && node.local_director.is_none())
    }

    /// Actors executed by the director whose container is `composite`
    ///
    /// Transparent composites are flattened: their contents are governed
    /// by the same director. Atomic actors and wormholes are returned in
    /// containment order.
    pub fn governed_actors(&self, composite: ActorId) -> Vec<ActorId> {
        let mut out = Vec::new();
        self.collect_governed(composite, &mut out);
        out
    }

    fn collect_governed(&self, composite: ActorId, out: &mut Vec<ActorId>) {
        let Some(node) = self.actors.get(&composite) else {
            return;
        };
        for child in &node.children {
            if self.is_transparent(*child) {
                self.collect_governed(*child, out);
            } else {
                out.push(*child);
            }
        }
    }

    /// Queue a firing request for `director`
    pub(crate) fn push_refire(&mut self, director: DirectorId, actor: ActorId, time: Time) -> Result<()> {
        self.director_mut(director)?.refire_requests.push((actor, time));
        Ok(())
    }

    pub(crate) fn take_refires(&mut self, director: DirectorId) -> Vec<(ActorId, Time)> {
        self.directors
            .get_mut(&director)
            .map(|d| std::mem::take(&mut d.refire_requests))
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Port lists and connectivity

    /// Input ports of an actor (uncached)
    pub fn input_ports(&self, actor: ActorId) -> Vec<PortId> {
        self.ports_matching(actor, PortNode::is_input)
    }

    /// Output ports of an actor (uncached)
    pub fn output_ports(&self, actor: ActorId) -> Vec<PortId> {
        self.ports_matching(actor, PortNode::is_output)
    }

    fn ports_matching(&self, actor: ActorId, pred: fn(&PortNode) -> bool) -> Vec<PortId> {
        self.actors
            .get(&actor)
            .map(|node| {
                node.ports
                    .iter()
                    .copied()
                    .filter(|p| self.ports.get(p).is_some_and(pred))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `relation` is on the inside of `port` (owned by the port's
    /// own composite)
    pub fn is_inside_link(&self, port: PortId, relation: RelationId) -> bool {
        match (self.ports.get(&port), self.relations.get(&relation)) {
            (Some(p), Some(r)) => r.container == p.owner,
            _ => false,
        }
    }

    /// Relations linked to `port` on the requested side
    pub fn links(&self, port: PortId, side: Side) -> Vec<RelationId> {
        self.ports
            .get(&port)
            .map(|p| {
                p.relations
                    .iter()
                    .copied()
                    .filter(|r| self.is_inside_link(port, *r) == (side == Side::Inside))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every receiver reachable from `port` through its `side` relations
    ///
    /// Transparent composites are traversed; the search stops at input
    /// ports of atomic actors and wormholes, and at the inside of output
    /// ports of opaque composites.
    pub fn destinations(&self, port: PortId, side: Side) -> Vec<Destination> {
        let mut out = Vec::new();
        let mut visited: IndexSet<RelationId> = IndexSet::new();
        let mut work: Vec<(PortId, RelationId)> = self
            .links(port, side)
            .into_iter()
            .map(|r| (port, r))
            .collect();

        while let Some((from, relation)) = work.pop() {
            if !visited.insert(relation) {
                continue;
            }
            let Some(rel) = self.relations.get(&relation) else {
                continue;
            };
            if rel.kind != LinkKind::Io {
                continue;
            }
            for &target in &rel.ports {
                if target == from {
                    continue;
                }
                let Some(tp) = self.ports.get(&target) else {
                    continue;
                };
                let inside = rel.container == tp.owner;
                let transparent = self.is_transparent(tp.owner);
                match (inside, transparent) {
                    (false, false) => {
                        if tp.is_input() {
                            out.push(Destination {
                                port: target,
                                relation,
                                side: Side::Outside,
                            });
                        }
                    }
                    (false, true) => {
                        for next in self.links(target, Side::Inside) {
                            work.push((target, next));
                        }
                    }
                    (true, false) => {
                        if tp.is_output() {
                            out.push(Destination {
                                port: target,
                                relation,
                                side: Side::Inside,
                            });
                        }
                    }
                    (true, true) => {
                        for next in self.links(target, Side::Outside) {
                            work.push((target, next));
                        }
                    }
                }
            }
        }
        // Deterministic order independent of traversal
        out.sort_by_key(|d| (d.port, d.relation));
        out.dedup();
        out
    }
}

/// Version-stamped cache of each actor's input and output port lists
///
/// The cache is owned by the reader. It is rebuilt lazily whenever the
/// graph version differs from the one it was computed against.
#[derive(Debug, Default, Clone)]
pub struct PortListCache {
    version: Option<u64>,
    inputs: IndexMap<ActorId, Vec<PortId>>,
    outputs: IndexMap<ActorId, Vec<PortId>>,
}

impl PortListCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn refresh(&mut self, graph: &Graph) {
        if self.version != Some(graph.version()) {
            self.inputs.clear();
            self.outputs.clear();
            self.version = Some(graph.version());
        }
    }

    /// Input ports of `actor` as of the current graph version
    pub fn inputs(&mut self, graph: &Graph, actor: ActorId) -> Vec<PortId> {
        self.refresh(graph);
        self.inputs
            .entry(actor)
            .or_insert_with(|| graph.input_ports(actor))
            .clone()
    }

    /// Output ports of `actor` as of the current graph version
    pub fn outputs(&mut self, graph: &Graph, actor: ActorId) -> Vec<PortId> {
        self.refresh(graph);
        self.outputs
            .entry(actor)
            .or_insert_with(|| graph.output_ports(actor))
            .clone()
    }

    /// Version the cached lists were computed against
    pub fn version(&self) -> Option<u64> {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Graph, ActorId, ActorId, ActorId) {
        let mut graph = Graph::new();
        let top = graph.add_composite(None, "top").unwrap();
        let a = graph.add_atomic(top, "a").unwrap();
        let b = graph.add_atomic(top, "b").unwrap();
        (graph, top, a, b)
    }

    #[test]
    fn test_paths() {
        let (mut graph, top, a, _) = sample();
        let inner = graph.add_composite(Some(top), "inner").unwrap();
        let leaf = graph.add_atomic(inner, "leaf").unwrap();
        let port = graph.add_port(leaf, "out", PortFlags::OUTPUT, LinkKind::Io).unwrap();

        assert_eq!(graph.actor_path(a), ".top.a");
        assert_eq!(graph.port_path(port), ".top.inner.leaf.out");
    }

    #[test]
    fn test_version_bumps_on_mutation() {
        let (mut graph, top, _, _) = sample();
        let before = graph.version();
        graph.add_relation(top, "r", LinkKind::Io).unwrap();
        assert!(graph.version() > before);
    }

    #[test]
    fn test_incompatible_link_kind() {
        let (mut graph, top, a, _) = sample();
        let port = graph.add_port(a, "out", PortFlags::OUTPUT, LinkKind::Io).unwrap();
        let rel = graph.add_relation(top, "r", LinkKind::Structural).unwrap();

        let err = graph.link(port, rel).unwrap_err();
        assert!(matches!(err, Error::IncompatibleLink { .. }));
        assert!(err.to_string().contains(".top.a.out"));
    }

    #[test]
    fn test_link_across_hierarchy_rejected() {
        let (mut graph, top, a, _) = sample();
        let inner = graph.add_composite(Some(top), "inner").unwrap();
        let port = graph.add_port(a, "out", PortFlags::OUTPUT, LinkKind::Io).unwrap();
        let rel = graph.add_relation(inner, "r", LinkKind::Io).unwrap();
        assert!(matches!(graph.link(port, rel), Err(Error::IncompatibleLink { .. })));
    }

    #[test]
    fn test_recursive_containment() {
        let (mut graph, top, _, _) = sample();
        let outer = graph.add_composite(Some(top), "outer").unwrap();
        let inner = graph.add_composite(Some(outer), "inner").unwrap();

        let err = graph.set_container(outer, inner).unwrap_err();
        assert!(matches!(err, Error::RecursiveContainment { .. }));
        assert!(matches!(
            graph.set_container(outer, outer),
            Err(Error::RecursiveContainment { .. })
        ));
    }

    #[test]
    fn test_set_container_moves_actor() {
        let (mut graph, top, a, _) = sample();
        let inner = graph.add_composite(Some(top), "inner").unwrap();
        graph.set_container(a, inner).unwrap();
        assert_eq!(graph.actor(a).unwrap().container, Some(inner));
        assert!(!graph.actor(top).unwrap().children.contains(&a));
        assert_eq!(graph.actor_path(a), ".top.inner.a");
    }

    #[test]
    fn test_mutation_refused_while_iterating() {
        let (mut graph, top, _, _) = sample();
        graph.set_iterating(true);
        let err = graph.add_atomic(top, "late").unwrap_err();
        assert!(matches!(err, Error::MutationDuringIteration { .. }));
        graph.set_iterating(false);
        assert!(graph.add_atomic(top, "late").is_ok());
    }

    #[test]
    fn test_connect_and_destinations() {
        let (mut graph, top, a, b) = sample();
        let c = graph.add_atomic(top, "c").unwrap();
        let out = graph.add_port(a, "out", PortFlags::OUTPUT, LinkKind::Io).unwrap();
        let in_b = graph.add_port(b, "in", PortFlags::INPUT, LinkKind::Io).unwrap();
        let in_c = graph.add_port(c, "in", PortFlags::INPUT, LinkKind::Io).unwrap();
        let rel = graph.connect(out, in_b).unwrap();
        graph.link(in_c, rel).unwrap();

        let targets: Vec<PortId> = graph
            .destinations(out, Side::Outside)
            .iter()
            .map(|d| d.port)
            .collect();
        assert_eq!(targets, vec![in_b, in_c]);
    }

    #[test]
    fn test_destinations_through_transparent_composite() {
        let (mut graph, top, a, _) = sample();
        let group = graph.add_composite(Some(top), "group").unwrap();
        let leaf = graph.add_atomic(group, "leaf").unwrap();
        let out = graph.add_port(a, "out", PortFlags::OUTPUT, LinkKind::Io).unwrap();
        let boundary = graph.add_port(group, "in", PortFlags::INPUT, LinkKind::Io).unwrap();
        let leaf_in = graph.add_port(leaf, "in", PortFlags::INPUT, LinkKind::Io).unwrap();
        graph.connect(out, boundary).unwrap();
        graph.connect(boundary, leaf_in).unwrap();

        let dests = graph.destinations(out, Side::Outside);
        assert_eq!(dests.len(), 1);
        assert_eq!(dests[0].port, leaf_in);
        assert_eq!(dests[0].side, Side::Outside);
    }

    #[test]
    fn test_governed_actors_flatten_transparent() {
        let (mut graph, top, a, b) = sample();
        let group = graph.add_composite(Some(top), "group").unwrap();
        let leaf = graph.add_atomic(group, "leaf").unwrap();
        assert_eq!(graph.governed_actors(top), vec![a, b, leaf]);
    }

    #[test]
    fn test_remove_actor_unlinks() {
        let (mut graph, _, a, b) = sample();
        let out = graph.add_port(a, "out", PortFlags::OUTPUT, LinkKind::Io).unwrap();
        let input = graph.add_port(b, "in", PortFlags::INPUT, LinkKind::Io).unwrap();
        let rel = graph.connect(out, input).unwrap();

        let removed = graph.remove_actor(b).unwrap();
        assert_eq!(removed, vec![b]);
        assert!(graph.port(input).is_err());
        assert_eq!(graph.relation(rel).unwrap().ports, vec![out]);
    }

    #[test]
    fn test_port_list_cache_refreshes_on_version_change() {
        let (mut graph, _, a, _) = sample();
        let mut cache = PortListCache::new();
        let first = graph.add_port(a, "in", PortFlags::INPUT, LinkKind::Io).unwrap();
        assert_eq!(cache.inputs(&graph, a), vec![first]);
        let seen = cache.version();

        let second = graph.add_port(a, "both", PortFlags::INOUT, LinkKind::Io).unwrap();
        assert_eq!(cache.inputs(&graph, a), vec![first, second]);
        assert_eq!(cache.outputs(&graph, a), vec![second]);
        assert_ne!(cache.version(), seen);
    }
}
