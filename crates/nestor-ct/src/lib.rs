//! Nestor CT - Continuous-time subsystems
//!
//! This crate provides a time-synchronizing director for continuous
//! dynamics and a few library actors to drive it:
//! - [`MixedSignalDirector`]: fixed-step integration that runs ahead of an
//!   event-driven executive, rolling back to the last known-good state when
//!   an outer event arrives inside the run
//! - [`BreakpointTable`]: instants the integration must land on exactly
//! - [`Constant`], [`Integrator`], [`ThresholdDetector`]: stateful actors
//!   that can be marked and restored
//!
//! ## Architecture
//!
//! ```text
//! EventDirector (outer clock)
//!  │  prefire: outer time, next outer iteration
//!  ▼
//! MixedSignalDirector
//!  ├── BreakpointTable     ← fire_at requests, run ends
//!  ├── known-good snapshot ← mark_state on stateful actors
//!  └── schedule (topological order of governed actors)
//! ```
//!
//! ## Example
//!
//! ```
//! use nestor_core::{Director, Kernel, Manager};
//! use nestor_ct::{Constant, Integrator, MixedSignalConfig, MixedSignalDirector};
//!
//! let mut kernel = Kernel::default();
//! let top = kernel.add_top_level("top").unwrap();
//! let config = MixedSignalConfig::default().with_stop_time(1.0);
//! let ct = kernel.set_director(top, MixedSignalDirector::new("ct", config)).unwrap();
//!
//! let slope = kernel.add_actor(top, "slope", Constant::new(2.0)).unwrap();
//! let slope_out = kernel.add_output(slope, "out").unwrap();
//! let integrator = kernel.add_actor(top, "integrator", Integrator::new(0.0)).unwrap();
//! let integrator_in = kernel.add_input(integrator, "in").unwrap();
//! kernel.add_output(integrator, "out").unwrap();
//! kernel.connect(slope_out, integrator_in).unwrap();
//!
//! let mut manager = Manager::new(kernel, top);
//! manager.run().unwrap();
//! let director = manager.kernel().director_as::<MixedSignalDirector>(ct).unwrap();
//! assert_eq!(director.current_time(), 1.0);
//! ```

mod actors;
mod breakpoints;
mod config;
mod director;
mod error;

pub use actors::{Constant, Integrator, ThresholdDetector};
pub use breakpoints::BreakpointTable;
pub use config::MixedSignalConfig;
pub use director::{MixedSignalDirector, Mode};
pub use error::{Error, Result};
