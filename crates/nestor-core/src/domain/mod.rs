//! General-purpose directors
//!
//! - [`SequentialDirector`]: fires every governed actor once per iteration,
//!   in containment order. Runs only at the top of a model.
//! - [`EventDirector`]: discrete-event semantics over time-ordered
//!   receivers; can be embedded and is the usual outer context for timed
//!   subsystems.

mod discrete;
mod sequential;

pub use discrete::EventDirector;
pub use sequential::SequentialDirector;
