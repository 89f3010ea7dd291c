//! Nestor Sched - Deadline and priority scheduling
//!
//! This crate adds a real-time domain on top of `nestor-core`:
//! - [`FixedPriorityScheduler`]: preemptive dispatch of actor executions on a
//!   single simulated processor
//! - [`EdfScheduler`]: the same dispatch with absolute deadlines as the
//!   priority key
//! - [`EdfDirector`]: a director that treats `fire_at` requests as releases
//!   and fires each actor when its execution completes
//!
//! ## Architecture
//!
//! ```text
//! EdfDirector
//!  │
//!  ├── releases (TimedQueue) ← fire_at requests
//!  ├── ready set             ← due releases with absolute deadlines
//!  └── EdfScheduler
//!       └── FixedPriorityScheduler (execution stack, top runs)
//! ```
//!
//! ## Example
//!
//! ```
//! use nestor_core::{ActorBody, ActorContext, Director, Kernel, Manager, Result};
//! use nestor_sched::{EdfConfig, EdfDirector, TaskSpec};
//!
//! #[derive(Debug)]
//! struct Sample;
//!
//! impl ActorBody for Sample {
//!     fn initialize(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
//!         cx.fire_at(0.0)
//!     }
//!
//!     fn fire(&mut self, _cx: &mut ActorContext<'_>) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let config = EdfConfig::default().with_task("sample", TaskSpec::new(1.0, 0.25));
//! let mut kernel = Kernel::default();
//! let top = kernel.add_top_level("top").unwrap();
//! kernel.add_actor(top, "sample", Sample).unwrap();
//! let id = kernel.set_director(top, EdfDirector::new("edf", config)).unwrap();
//!
//! let mut manager = Manager::new(kernel, top);
//! manager.run().unwrap();
//! let director = manager.kernel().director_as::<EdfDirector>(id).unwrap();
//! assert_eq!(director.completions(), 1);
//! assert_eq!(director.current_time(), 0.25);
//! ```

mod config;
mod director;
mod edf;
mod error;
mod fixed_priority;

pub use config::{EdfConfig, TaskSpec};
pub use director::EdfDirector;
pub use edf::EdfScheduler;
pub use error::{Error, Result};
pub use fixed_priority::{Execution, FixedPriorityScheduler, LOWEST_PRIORITY};
