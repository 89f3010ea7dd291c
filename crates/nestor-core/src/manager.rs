//! Driver loop for a top-level composite
//!
//! The manager runs `initialize`, then `prefire`/`fire`/`postfire` rounds
//! until `postfire` returns `false` or the iteration limit is reached, and
//! always finishes with `wrapup`. The graph is locked against structural
//! mutation while an iteration is in progress.

use crate::error::Result;
use crate::identity::ActorId;
use crate::kernel::Kernel;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Summary of a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of top-level iterations executed
    pub iterations: u64,
    /// Whether the run stopped because of the iteration limit
    pub hit_iteration_limit: bool,
}

/// Drives a model from its top-level composite
#[derive(Debug)]
pub struct Manager {
    kernel: Kernel,
    top: ActorId,
    iterations: u64,
}

impl Manager {
    /// Create a manager for `top`
    pub fn new(kernel: Kernel, top: ActorId) -> Self {
        Self {
            kernel,
            top,
            iterations: 0,
        }
    }

    /// The top-level composite
    pub fn top(&self) -> ActorId {
        self.top
    }

    /// The kernel being driven
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Mutable access to the kernel (between iterations only)
    pub fn kernel_mut(&mut self) -> &mut Kernel {
        &mut self.kernel
    }

    /// Give the kernel back
    pub fn into_kernel(self) -> Kernel {
        self.kernel
    }

    /// Iterations executed since the last `initialize`
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Initialize the model
    pub fn initialize(&mut self) -> Result<()> {
        self.iterations = 0;
        self.kernel.initialize(self.top)
    }

    /// Run one top-level iteration; `false` means execution is over
    ///
    /// A `prefire` that declines does not end the run: the iteration is
    /// counted and skipped.
    pub fn iterate(&mut self) -> Result<bool> {
        self.kernel.graph_mut().set_iterating(true);
        let result = self.iterate_inner();
        self.kernel.graph_mut().set_iterating(false);
        self.iterations += 1;
        result
    }

    fn iterate_inner(&mut self) -> Result<bool> {
        if !self.kernel.prefire(self.top)? {
            debug!(iteration = self.iterations, "top level not ready");
            return Ok(true);
        }
        self.kernel.fire(self.top)?;
        self.kernel.postfire(self.top)
    }

    /// Wrap up the model
    pub fn wrapup(&mut self) -> Result<()> {
        self.kernel.wrapup(self.top)
    }

    /// Run the model to completion
    ///
    /// `wrapup` runs even when an iteration fails; the first error is
    /// returned.
    pub fn run(&mut self) -> Result<RunReport> {
        let path = self.kernel.graph().actor_path(self.top);
        info!(model = %path, "run started");
        let outcome = self.initialize().and_then(|_| self.run_iterations());
        let wrapup = self.wrapup();
        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                warn!(model = %path, error = %err, "run aborted");
                return Err(err);
            }
        };
        wrapup?;
        info!(model = %path, iterations = report.iterations, "run finished");
        Ok(report)
    }

    fn run_iterations(&mut self) -> Result<RunReport> {
        let limit = self.kernel.config().max_iterations;
        loop {
            if limit.is_some_and(|max| self.iterations >= max) {
                return Ok(RunReport {
                    iterations: self.iterations,
                    hit_iteration_limit: true,
                });
            }
            if !self.iterate()? {
                return Ok(RunReport {
                    iterations: self.iterations,
                    hit_iteration_limit: false,
                });
            }
        }
    }
}
