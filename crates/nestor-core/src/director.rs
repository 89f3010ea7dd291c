//! Directors: execution policies for a composite's contents
//!
//! A director is attached to a composite as its *local* director and
//! governs every actor inside it (transparent composites are flattened).
//! Directors are trait objects owned by the [`Kernel`](crate::Kernel); they
//! reach the model and the actors they govern only through a
//! [`DirectorContext`].
//!
//! Three capability variants exist:
//! - [`DirectorKind::LocalOnly`]: runs only at the top of a model;
//! - [`DirectorKind::Wormhole`]: may be nested inside another domain and
//!   follows the executive director's clock;
//! - [`DirectorKind::TimeSynchronizing`]: may be nested and keeps its own
//!   local time, reconciling it with the outer clock.

use crate::config::KernelConfig;
use crate::error::Result;
use crate::graph::PortNode;
use crate::identity::{ActorId, PortId};
use crate::kernel::DirectorContext;
use crate::receiver::{self, Receiver};
use crate::time::{Time, NEVER};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Capability tag of a director
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectorKind {
    LocalOnly,
    Wormhole,
    TimeSynchronizing,
}

impl DirectorKind {
    /// Whether a director of this kind may govern a nested composite
    pub fn can_be_embedded(&self) -> bool {
        !matches!(self, DirectorKind::LocalOnly)
    }
}

impl fmt::Display for DirectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectorKind::LocalOnly => "local-only",
            DirectorKind::Wormhole => "wormhole",
            DirectorKind::TimeSynchronizing => "time-synchronizing",
        };
        f.write_str(name)
    }
}

/// An execution policy
pub trait Director: fmt::Debug {
    /// Short name, used in paths and logs
    fn name(&self) -> &str;

    /// Capability variant
    fn kind(&self) -> DirectorKind;

    /// Prepare for a run; receivers of governed ports already exist
    fn initialize(&mut self, cx: &mut DirectorContext<'_>) -> Result<()>;

    /// Check whether an iteration should run now
    fn prefire(&mut self, _cx: &mut DirectorContext<'_>) -> Result<bool> {
        Ok(true)
    }

    /// Run one iteration of the governed actors
    fn fire(&mut self, cx: &mut DirectorContext<'_>) -> Result<()>;

    /// Commit the iteration; `false` ends execution of the container
    fn postfire(&mut self, cx: &mut DirectorContext<'_>) -> Result<bool>;

    /// End the run, wrapping up every governed actor
    fn wrapup(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        for actor in cx.governed_actors() {
            cx.wrapup_actor(actor)?;
        }
        Ok(())
    }

    /// Current model time
    fn current_time(&self) -> Time;

    /// Time of the next iteration this director wants, `NEVER` if none
    fn next_iteration_time(&self) -> Time {
        NEVER
    }

    /// Step size of the iteration in progress
    fn step_size(&self) -> f64 {
        0.0
    }

    /// Request that `actor` be fired at `time`
    fn fire_at(&mut self, _actor: ActorId, _time: Time) -> Result<()> {
        Ok(())
    }

    /// Create the receiver for one channel of a governed input port
    fn new_receiver(&self, port: &PortNode, config: &KernelConfig) -> Box<dyn Receiver> {
        let discipline = port
            .receiver_config
            .as_ref()
            .unwrap_or(&config.default_receiver);
        receiver::new_receiver(discipline, config.time_resolution)
    }

    /// Move data from outside an input port of the container to inside
    fn transfer_inputs(&mut self, cx: &mut DirectorContext<'_>, port: PortId) -> Result<bool> {
        cx.graph_mut().transfer_inputs(port)
    }

    /// Move data from inside an output port of a governed composite to
    /// outside it
    fn transfer_outputs(&mut self, cx: &mut DirectorContext<'_>, port: PortId) -> Result<bool> {
        cx.graph_mut().transfer_outputs(port)
    }

    /// Hook: `actor` now falls under this director
    fn register_actor(&mut self, _actor: ActorId) {}

    /// Hook: `actor` no longer falls under this director
    fn deregister_actor(&mut self, _actor: ActorId) {}

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
