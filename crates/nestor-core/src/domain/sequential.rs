//! Fixed-order director

use crate::director::{Director, DirectorKind};
use crate::error::Result;
use crate::kernel::DirectorContext;
use crate::time::{Clock, Time};
use std::any::Any;
use tracing::debug;

/// Fires each governed actor once per iteration, in containment order
///
/// Model time advances by `period` after every iteration. The run ends
/// after the configured number of iterations, or as soon as any actor's
/// `postfire` returns `false`.
#[derive(Debug, Clone)]
pub struct SequentialDirector {
    name: String,
    period: f64,
    iterations: Option<u64>,
    count: u64,
    time: Time,
    stop_requested: bool,
}

impl SequentialDirector {
    /// Create a director with period 1 and no iteration limit
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            period: 1.0,
            iterations: None,
            count: 0,
            time: 0.0,
            stop_requested: false,
        }
    }

    /// Stop after `limit` iterations
    pub fn with_iterations(mut self, limit: u64) -> Self {
        self.iterations = Some(limit);
        self
    }

    /// Advance model time by `period` per iteration
    pub fn with_period(mut self, period: f64) -> Self {
        self.period = period;
        self
    }

    /// Iterations completed since initialize
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Director for SequentialDirector {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DirectorKind {
        DirectorKind::LocalOnly
    }

    fn initialize(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        self.count = 0;
        self.time = 0.0;
        self.stop_requested = false;
        cx.publish(Clock {
            current: self.time,
            next_iteration: self.time,
            step_size: 0.0,
        });
        for actor in cx.governed_actors() {
            cx.initialize_actor(actor)?;
        }
        Ok(())
    }

    fn fire(&mut self, cx: &mut DirectorContext<'_>) -> Result<()> {
        for actor in cx.governed_actors() {
            if !cx.prefire_actor(actor)? {
                continue;
            }
            cx.fire_actor(actor)?;
            if !cx.postfire_actor(actor, self)? {
                debug!(actor = %cx.graph().actor_path(actor), "actor asked to stop");
                self.stop_requested = true;
            }
        }
        Ok(())
    }

    fn postfire(&mut self, _cx: &mut DirectorContext<'_>) -> Result<bool> {
        self.count += 1;
        self.time += self.period;
        let limit_reached = self.iterations.is_some_and(|limit| self.count >= limit);
        Ok(!limit_reached && !self.stop_requested)
    }

    fn current_time(&self) -> Time {
        self.time
    }

    fn next_iteration_time(&self) -> Time {
        self.time
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
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Stamp {
        label: &'static str,
        log: Rc<RefCell<Vec<(String, Time)>>>,
        stop_after: Option<u32>,
        fired: u32,
    }

    impl ActorBody for Stamp {
        fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
            self.fired += 1;
            self.log.borrow_mut().push((self.label.to_string(), cx.time()));
            Ok(())
        }

        fn postfire(&mut self, _cx: &mut ActorContext<'_>) -> Result<bool> {
            Ok(self.stop_after.map_or(true, |n| self.fired < n))
        }
    }

    fn stamp(
        label: &'static str,
        log: &Rc<RefCell<Vec<(String, Time)>>>,
        stop_after: Option<u32>,
    ) -> Stamp {
        Stamp {
            label,
            log: log.clone(),
            stop_after,
            fired: 0,
        }
    }

    #[test]
    fn test_fires_in_containment_order_each_period() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut kernel = Kernel::default();
        let top = kernel.add_top_level("top").unwrap();
        kernel.add_actor(top, "a", stamp("a", &log, None)).unwrap();
        kernel.add_actor(top, "b", stamp("b", &log, None)).unwrap();
        kernel
            .set_director(top, SequentialDirector::new("seq").with_period(0.5))
            .unwrap();

        kernel.initialize(top).unwrap();
        for _ in 0..2 {
            assert!(kernel.prefire(top).unwrap());
            kernel.fire(top).unwrap();
            assert!(kernel.postfire(top).unwrap());
        }

        let expected = vec![
            ("a".to_string(), 0.0),
            ("b".to_string(), 0.0),
            ("a".to_string(), 0.5),
            ("b".to_string(), 0.5),
        ];
        assert_eq!(*log.borrow(), expected);
    }

    #[test]
    fn test_actor_postfire_false_ends_run() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut kernel = Kernel::default();
        let top = kernel.add_top_level("top").unwrap();
        kernel.add_actor(top, "a", stamp("a", &log, Some(2))).unwrap();
        let id = kernel.set_director(top, SequentialDirector::new("seq")).unwrap();

        kernel.initialize(top).unwrap();
        kernel.fire(top).unwrap();
        assert!(kernel.postfire(top).unwrap());
        kernel.fire(top).unwrap();
        assert!(!kernel.postfire(top).unwrap());
        assert_eq!(kernel.director_as::<SequentialDirector>(id).unwrap().count(), 2);
    }
}
