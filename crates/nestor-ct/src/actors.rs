//! Continuous-time library actors
//!
//! Continuous signals are sampled: when several tokens are waiting at an
//! input, the most recent one is the current value. Discrete inputs (the
//! `set` port of [`Constant`]) are only read in the event phase, where the
//! step size is zero.

use nestor_core::{ActorBody, ActorContext, Error, PortId, Result, Stateful, Token};

/// Drain `port` and return the last numeric value, if any
fn latest_value(cx: &mut ActorContext<'_>, port: PortId) -> Result<Option<f64>> {
    let mut latest = None;
    while cx.has_token(port)? {
        let token = cx.get(port)?;
        let value = token
            .as_float()
            .ok_or_else(|| Error::actor(cx.path(), format!("expected a number, got {}", token.type_name())))?;
        latest = Some(value);
    }
    Ok(latest)
}

/// Emits a constant value on `out`
///
/// If the actor has an input port named `set`, a token arriving there in
/// the event phase replaces the value.
#[derive(Debug, Clone)]
pub struct Constant {
    value: f64,
    marked: f64,
}

impl Constant {
    /// Create a source emitting `value`
    pub fn new(value: f64) -> Self {
        Self {
            value,
            marked: value,
        }
    }

    /// Current output value
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl ActorBody for Constant {
    fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
        if cx.step_size() == 0.0 {
            if let Some(set) = cx.graph().port_by_name(cx.actor(), "set") {
                if let Some(value) = latest_value(cx, set)? {
                    self.value = value;
                }
            }
        }
        let out = cx.port("out")?;
        cx.send(out, self.value)?;
        Ok(())
    }

    fn stateful(&mut self) -> Option<&mut dyn Stateful> {
        Some(self)
    }
}

impl Stateful for Constant {
    fn mark_state(&mut self) {
        self.marked = self.value;
    }

    fn restore_marked_state(&mut self) {
        self.value = self.marked;
    }
}

/// Forward-Euler integrator
///
/// Emits its state on `out` when fired and integrates the derivative
/// present on `in` over the current step in `postfire`. A step with no
/// derivative leaves the state unchanged.
#[derive(Debug, Clone)]
pub struct Integrator {
    state: f64,
    marked: f64,
}

impl Integrator {
    /// Create an integrator starting at `initial`
    pub fn new(initial: f64) -> Self {
        Self {
            state: initial,
            marked: initial,
        }
    }

    /// Current state
    pub fn state(&self) -> f64 {
        self.state
    }
}

impl ActorBody for Integrator {
    fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
        let out = cx.port("out")?;
        cx.send(out, self.state)?;
        Ok(())
    }

    fn postfire(&mut self, cx: &mut ActorContext<'_>) -> Result<bool> {
        let input = cx.port("in")?;
        if let Some(derivative) = latest_value(cx, input)? {
            self.state += cx.step_size() * derivative;
        }
        Ok(true)
    }

    fn stateful(&mut self) -> Option<&mut dyn Stateful> {
        Some(self)
    }
}

impl Stateful for Integrator {
    fn mark_state(&mut self) {
        self.marked = self.state;
    }

    fn restore_marked_state(&mut self) {
        self.state = self.marked;
    }
}

/// Reports an event when its input rises through a threshold
///
/// A crossing seen during a regular step is reported as a current event,
/// which stops the director's step at the crossing sample. The sampled
/// value is sent on `out` in the event phase that follows, where the step
/// size is zero and local time agrees with the outer clock.
#[derive(Debug, Clone)]
pub struct ThresholdDetector {
    threshold: f64,
    previous: Option<f64>,
    marked: Option<f64>,
    event: bool,
}

impl ThresholdDetector {
    /// Create a detector for upward crossings of `threshold`
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            previous: None,
            marked: None,
            event: false,
        }
    }

    /// The threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl ActorBody for ThresholdDetector {
    fn initialize(&mut self, _cx: &mut ActorContext<'_>) -> Result<()> {
        self.previous = None;
        self.marked = None;
        self.event = false;
        Ok(())
    }

    fn fire(&mut self, cx: &mut ActorContext<'_>) -> Result<()> {
        self.event = false;
        let input = cx.port("in")?;
        let Some(value) = latest_value(cx, input)? else {
            return Ok(());
        };
        let crossed = self
            .previous
            .is_some_and(|p| p < self.threshold && value >= self.threshold);
        if crossed && cx.step_size() > 0.0 {
            self.event = true;
            return Ok(());
        }
        self.previous = Some(value);
        if crossed {
            let out = cx.port("out")?;
            cx.send(out, Token::Float(value))?;
        }
        Ok(())
    }

    fn stateful(&mut self) -> Option<&mut dyn Stateful> {
        Some(self)
    }

    fn has_current_event(&self) -> bool {
        self.event
    }
}

impl Stateful for ThresholdDetector {
    fn mark_state(&mut self) {
        self.marked = self.previous;
    }

    fn restore_marked_state(&mut self) {
        self.previous = self.marked;
        self.event = false;
    }
}
