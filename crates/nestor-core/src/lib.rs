//! Nestor Core - Hierarchical actor kernel
//!
//! This crate provides the structural model and execution machinery shared
//! by every nestor domain:
//! - Graph arena of actors, ports and relations with a version counter
//! - Tokens, events and per-channel receivers (FIFO, bounded, time-ordered)
//! - Director resolution: local director, inherited executive director,
//!   wormholes
//! - Kernel lifecycle (`initialize`, `prefire`, `fire`, `postfire`,
//!   `wrapup`) and the `Manager` driver loop
//! - Two general-purpose directors: sequential and discrete-event
//!
//! ## Architecture
//!
//! ```text
//! Manager (driver loop)
//!  │
//!  └── Kernel
//!       ├── Graph (arena, version counter, director records)
//!       ├── ActorBody slots   ← atomic actors
//!       └── Director slots    ← one per opaque composite
//!            └── DirectorContext → fire governed actors / nested directors
//! ```
//!
//! ## Example
//!
//! ```
//! use nestor_core::{ActorBody, ActorContext, Kernel, Manager, Result, SequentialDirector};
//!
//! #[derive(Debug)]
//! struct Hello;
//!
//! impl ActorBody for Hello {
//!     fn fire(&mut self, _cx: &mut ActorContext<'_>) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let mut kernel = Kernel::default();
//! let top = kernel.add_top_level("top").unwrap();
//! kernel.add_actor(top, "hello", Hello).unwrap();
//! kernel
//!     .set_director(top, SequentialDirector::new("seq").with_iterations(2))
//!     .unwrap();
//!
//! let report = Manager::new(kernel, top).run().unwrap();
//! assert_eq!(report.iterations, 2);
//! ```

mod actor;
pub mod config;
mod director;
pub mod domain;
mod error;
pub mod graph;
mod identity;
mod kernel;
mod manager;
mod port;
pub mod receiver;
pub mod time;
mod token;

pub use actor::{ActorBody, ActorContext, Stateful};
pub use config::{HistoryCapacity, KernelConfig, ReceiverConfig};
pub use director::{Director, DirectorKind};
pub use domain::{EventDirector, SequentialDirector};
pub use error::{Error, ErrorKind, Result};
pub use graph::{Graph, LinkKind, PortFlags, PortListCache, PortNode, Side};
pub use identity::{ActorId, DirectorId, PortId, RelationId};
pub use kernel::{DirectorContext, Kernel};
pub use manager::{Manager, RunReport};
pub use port::Delivery;
pub use receiver::{Event, Receiver, ReceiverKind};
pub use time::{Clock, Resolution, Time, NEVER};
pub use token::{Token, TokenMap};
