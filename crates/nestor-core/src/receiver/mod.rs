//! Per-port communication buffers
//!
//! A receiver sits at the input end of every port/relation pairing and
//! decides the order in which pending [`Event`]s are consumed. Directors
//! choose the variant through [`Director::new_receiver`](crate::Director::new_receiver).
//!
//! | kind | ordering | capacity |
//! |------|----------|----------|
//! | `Fifo` | send order | unbounded |
//! | `Bounded` | send order | fixed, `put` returns `false` when full |
//! | `TimeOrdered` | `(timestamp, value)` | unbounded |
//! | `PriorityOrdered` | `(timestamp, value)`, receiver carries a priority | unbounded |

mod fifo;
mod timed;

pub use fifo::{FifoQueue, FifoReceiver};
pub use timed::{TieBreak, TimedQueue, TimedReceiver};

use crate::config::ReceiverConfig;
use crate::error::Result;
use crate::time::{Resolution, Time};
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// A token together with its ordering key
///
/// `time` is the timestamp for time-ordered receivers and the deadline for
/// deadline-ordered ones; FIFO receivers carry it along unused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub token: Token,
    pub time: Time,
}

impl Event {
    /// Create an event
    pub fn new(token: Token, time: Time) -> Self {
        Self { token, time }
    }
}

/// Receiver discipline tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiverKind {
    Fifo,
    Bounded,
    TimeOrdered,
    PriorityOrdered,
}

impl ReceiverKind {
    /// Whether events come out in timestamp order
    pub fn is_time_ordered(&self) -> bool {
        matches!(self, ReceiverKind::TimeOrdered | ReceiverKind::PriorityOrdered)
    }
}

impl fmt::Display for ReceiverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReceiverKind::Fifo => "fifo",
            ReceiverKind::Bounded => "bounded",
            ReceiverKind::TimeOrdered => "time-ordered",
            ReceiverKind::PriorityOrdered => "priority-ordered",
        };
        f.write_str(name)
    }
}

/// Buffer for tokens arriving at one channel of an input port
pub trait Receiver: fmt::Debug {
    /// The discipline this receiver implements
    fn kind(&self) -> ReceiverKind;

    /// Offer an event
    ///
    /// Returns `false` (and stores nothing) when the receiver has no room.
    fn put(&mut self, event: Event) -> bool;

    /// Remove the next event in this receiver's order
    fn take_event(&mut self) -> Result<Event>;

    /// Remove the next token in this receiver's order
    fn take(&mut self) -> Result<Token> {
        self.take_event().map(|event| event.token)
    }

    /// Whether at least one event is pending
    fn has_token(&self) -> bool;

    /// Whether another `put` would be accepted
    fn has_room(&self) -> bool;

    /// Number of pending events
    fn len(&self) -> usize;

    /// Check if no events are pending
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordering key of the next event, if any
    fn next_time(&self) -> Option<Time>;

    /// Drop every pending event
    fn clear(&mut self);

    /// Downcast support for variant-specific operations
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Build a receiver for the given configuration
pub fn new_receiver(config: &ReceiverConfig, resolution: Resolution) -> Box<dyn Receiver> {
    match config {
        ReceiverConfig::Fifo { capacity, history } => {
            let queue = match capacity {
                Some(cap) => FifoQueue::with_capacity(*cap),
                None => FifoQueue::new(),
            }
            .with_history(*history);
            Box::new(FifoReceiver::from_queue(queue))
        }
        ReceiverConfig::TimeOrdered => Box::new(TimedReceiver::new(resolution)),
        ReceiverConfig::PriorityOrdered { priority } => {
            Box::new(TimedReceiver::with_priority(resolution, *priority))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryCapacity;

    #[test]
    fn test_new_receiver_variants() {
        let res = Resolution::DEFAULT;
        assert_eq!(new_receiver(&ReceiverConfig::fifo(), res).kind(), ReceiverKind::Fifo);
        assert_eq!(
            new_receiver(&ReceiverConfig::bounded(2), res).kind(),
            ReceiverKind::Bounded
        );
        assert_eq!(
            new_receiver(&ReceiverConfig::TimeOrdered, res).kind(),
            ReceiverKind::TimeOrdered
        );
        assert_eq!(
            new_receiver(&ReceiverConfig::PriorityOrdered { priority: 1 }, res).kind(),
            ReceiverKind::PriorityOrdered
        );
    }

    #[test]
    fn test_configured_history_is_applied() {
        let config = ReceiverConfig::Fifo {
            capacity: None,
            history: HistoryCapacity::Bounded(1),
        };
        let mut receiver = new_receiver(&config, Resolution::DEFAULT);
        receiver.put(Event::new(Token::Int(1), 0.0));
        receiver.put(Event::new(Token::Int(2), 0.0));
        receiver.take().unwrap();
        receiver.take().unwrap();

        let fifo = receiver.as_any().downcast_ref::<FifoReceiver>().unwrap();
        assert_eq!(fifo.queue().history_len(), 1);
        assert_eq!(fifo.queue().history_get(0).unwrap().token, Token::Int(2));
    }
}
