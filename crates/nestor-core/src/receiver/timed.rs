//! Totally ordered time/priority queue
//!
//! Entries are ordered by `(timestamp, tie-break, insertion sequence)`:
//! - the timestamp is compared with `f64::total_cmp`;
//! - equal timestamps are ordered by [`TieBreak`], a total order. Tokens
//!   rank by kind first (null, booleans, numbers, strings, arrays,
//!   records), then by value within the kind;
//! - entries the tie-break ranks equal leave in insertion order.
//!
//! Numbers compare by value across `Int` and `Float`; at an equal value an
//! `Int` comes before a `Float`. Arrays and records have no value order, so
//! among themselves they keep insertion order.
//!
//! The queue is a multiset: identical `(time, value)` pairs are all kept.

use crate::error::{Error, Result};
use crate::identity::ActorId;
use crate::receiver::{Event, Receiver, ReceiverKind};
use crate::time::{Resolution, Time};
use crate::token::Token;
use std::any::Any;
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Secondary ordering for entries with equal timestamps
///
/// Implementations must be a total order: reflexive, antisymmetric and
/// transitive over every pair of payloads.
pub trait TieBreak {
    /// Compare two payloads
    fn tie_break(&self, other: &Self) -> Ordering;
}

impl TieBreak for Token {
    fn tie_break(&self, other: &Self) -> Ordering {
        kind_rank(self)
            .cmp(&kind_rank(other))
            .then_with(|| match (self, other) {
                (Token::Bool(a), Token::Bool(b)) => a.cmp(b),
                (Token::String(a), Token::String(b)) => a.cmp(b),
                (a, b) => match (numeric_key(a), numeric_key(b)) {
                    (Some((x, xk)), Some((y, yk))) => x.total_cmp(&y).then(xk.cmp(&yk)),
                    _ => Ordering::Equal,
                },
            })
    }
}

impl TieBreak for ActorId {
    fn tie_break(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

fn kind_rank(token: &Token) -> u8 {
    match token {
        Token::Null => 0,
        Token::Bool(_) => 1,
        Token::Int(_) | Token::Float(_) => 2,
        Token::String(_) => 3,
        Token::Array(_) => 4,
        Token::Record(_) => 5,
    }
}

/// Numeric value, then `Int` before `Float`, then the exact integer
fn numeric_key(token: &Token) -> Option<(f64, (u8, i64))> {
    match token {
        Token::Int(i) => Some((*i as f64, (0, *i))),
        Token::Float(x) => Some((*x, (1, 0))),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    time: Time,
    seq: u64,
    item: T,
}

impl<T: TieBreak> Entry<T> {
    fn key_cmp(&self, other: &Entry<T>) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.item.tie_break(&other.item))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// A queue that always yields its minimum `(time, tie-break)` entry first
///
/// There is no backpressure: [`has_room`](Self::has_room) always answers
/// `true`. Bounded variants can layer a capacity check on top.
#[derive(Debug, Clone)]
pub struct TimedQueue<T> {
    entries: VecDeque<Entry<T>>,
    next_seq: u64,
    resolution: Resolution,
}

impl<T: TieBreak> TimedQueue<T> {
    /// Create an empty queue with the default resolution
    pub fn new() -> Self {
        Self::with_resolution(Resolution::DEFAULT)
    }

    /// Create an empty queue comparing times with `resolution`
    pub fn with_resolution(resolution: Resolution) -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: 0,
            resolution,
        }
    }

    /// Insert an item at `time`
    pub fn put(&mut self, item: T, time: Time) {
        let entry = Entry {
            time,
            seq: self.next_seq,
            item,
        };
        self.next_seq += 1;
        let index = self
            .entries
            .iter()
            .position(|existing| existing.key_cmp(&entry) == Ordering::Greater)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, entry);
    }

    /// Remove and return the minimum entry
    pub fn take(&mut self) -> Result<(Time, T)> {
        self.entries
            .pop_front()
            .map(|entry| (entry.time, entry.item))
            .ok_or_else(|| Error::EmptyQueue("timed queue".to_string()))
    }

    /// Look at the minimum entry without removing it
    pub fn peek(&self) -> Option<(Time, &T)> {
        self.entries.front().map(|entry| (entry.time, &entry.item))
    }

    /// Timestamp of the minimum entry
    pub fn next_time(&self) -> Option<Time> {
        self.entries.front().map(|entry| entry.time)
    }

    /// Whether the minimum entry's timestamp equals `time` within resolution
    pub fn has_token_at(&self, time: Time) -> bool {
        self.next_time()
            .is_some_and(|next| self.resolution.equal(next, time))
    }

    /// Whether at least `count` entries are queued
    ///
    /// `count` must be positive.
    pub fn has_tokens(&self, count: usize) -> Result<bool> {
        if count == 0 {
            return Err(Error::InvalidArgument(
                "has_tokens() requires a positive count".to_string(),
            ));
        }
        Ok(self.entries.len() >= count)
    }

    /// Always `true`: the base queue applies no capacity limit
    pub fn has_room(&self) -> bool {
        true
    }

    /// Entries in dequeue order
    pub fn iter(&self) -> impl Iterator<Item = (Time, &T)> {
        self.entries.iter().map(|entry| (entry.time, &entry.item))
    }

    /// Remove every entry whose item matches `predicate`
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !predicate(&entry.item));
        before - self.entries.len()
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Resolution used by [`has_token_at`](Self::has_token_at)
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

impl<T: TieBreak> Default for TimedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver that delivers tokens in timestamp order
///
/// With a priority attached it reports itself as
/// [`ReceiverKind::PriorityOrdered`]; directors that arbitrate between
/// several input channels read the priority to order them.
#[derive(Debug, Clone)]
pub struct TimedReceiver {
    queue: TimedQueue<Token>,
    priority: Option<i32>,
}

impl TimedReceiver {
    /// Create a time-ordered receiver
    pub fn new(resolution: Resolution) -> Self {
        Self {
            queue: TimedQueue::with_resolution(resolution),
            priority: None,
        }
    }

    /// Create a priority-ordered receiver
    pub fn with_priority(resolution: Resolution, priority: i32) -> Self {
        Self {
            queue: TimedQueue::with_resolution(resolution),
            priority: Some(priority),
        }
    }

    /// Receiver priority, if any
    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    /// Access the underlying queue
    pub fn queue(&self) -> &TimedQueue<Token> {
        &self.queue
    }

    /// Whether the earliest token is stamped `time`
    pub fn has_token_at(&self, time: Time) -> bool {
        self.queue.has_token_at(time)
    }

    /// Whether at least `count` tokens are queued
    pub fn has_tokens(&self, count: usize) -> Result<bool> {
        self.queue.has_tokens(count)
    }
}

impl Receiver for TimedReceiver {
    fn kind(&self) -> ReceiverKind {
        if self.priority.is_some() {
            ReceiverKind::PriorityOrdered
        } else {
            ReceiverKind::TimeOrdered
        }
    }

    fn put(&mut self, event: Event) -> bool {
        self.queue.put(event.token, event.time);
        true
    }

    fn take_event(&mut self) -> Result<Event> {
        let (time, token) = self.queue.take()?;
        Ok(Event::new(token, time))
    }

    fn has_token(&self) -> bool {
        !self.queue.is_empty()
    }

    fn has_room(&self) -> bool {
        self.queue.has_room()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn next_time(&self) -> Option<Time> {
        self.queue.next_time()
    }

    fn clear(&mut self) {
        self.queue.clear();
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
    use proptest::prelude::*;

    #[test]
    fn test_take_in_time_order() {
        let mut queue = TimedQueue::new();
        queue.put(Token::from("late"), 3.0);
        queue.put(Token::from("early"), 1.0);
        queue.put(Token::from("middle"), 2.0);

        assert_eq!(queue.take().unwrap(), (1.0, Token::from("early")));
        assert_eq!(queue.take().unwrap(), (2.0, Token::from("middle")));
        assert_eq!(queue.take().unwrap(), (3.0, Token::from("late")));
        assert!(queue.take().is_err());
    }

    #[test]
    fn test_equal_times_break_ties_by_value() {
        let mut queue = TimedQueue::new();
        queue.put(Token::Float(2.5), 1.0);
        queue.put(Token::Int(1), 1.0);
        queue.put(Token::Float(0.5), 1.0);

        let values: Vec<f64> = std::iter::from_fn(|| queue.take().ok())
            .map(|(_, t)| t.as_float().unwrap())
            .collect();
        assert_eq!(values, vec![0.5, 1.0, 2.5]);
    }

    #[test]
    fn test_mixed_kinds_rank_by_kind() {
        let mut queue = TimedQueue::new();
        queue.put(Token::from("b"), 1.0);
        queue.put(Token::Int(7), 1.0);
        queue.put(Token::Null, 1.0);
        queue.put(Token::Bool(true), 1.0);

        assert_eq!(queue.take().unwrap().1, Token::Null);
        assert_eq!(queue.take().unwrap().1, Token::Bool(true));
        assert_eq!(queue.take().unwrap().1, Token::Int(7));
        assert_eq!(queue.take().unwrap().1, Token::from("b"));
    }

    #[test]
    fn test_strings_and_numbers_order_is_independent_of_insertion() {
        let orders = [
            [Token::Int(2), Token::from("s"), Token::Int(1)],
            [Token::from("s"), Token::Int(1), Token::Int(2)],
            [Token::Int(1), Token::Int(2), Token::from("s")],
        ];
        for tokens in orders {
            let mut queue = TimedQueue::new();
            for token in tokens {
                queue.put(token, 1.0);
            }
            let taken: Vec<Token> = std::iter::from_fn(|| queue.take().ok())
                .map(|(_, t)| t)
                .collect();
            assert_eq!(taken, vec![Token::Int(1), Token::Int(2), Token::from("s")]);
        }
    }

    #[test]
    fn test_int_before_float_at_equal_value() {
        let mut queue = TimedQueue::new();
        queue.put(Token::Float(2.0), 0.0);
        queue.put(Token::Int(2), 0.0);
        assert_eq!(queue.take().unwrap().1, Token::Int(2));
        assert_eq!(queue.take().unwrap().1, Token::Float(2.0));
    }

    #[test]
    fn test_arrays_keep_insertion_order() {
        let mut queue = TimedQueue::new();
        queue.put(Token::Array(vec![Token::Int(9)]), 0.0);
        queue.put(Token::Array(vec![Token::Int(1)]), 0.0);
        assert_eq!(queue.take().unwrap().1, Token::Array(vec![Token::Int(9)]));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut queue = TimedQueue::new();
        queue.put(Token::Int(1), 1.0);
        queue.put(Token::Int(1), 1.0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_has_token_at_uses_resolution() {
        let mut queue = TimedQueue::with_resolution(Resolution::new(1e-6));
        assert!(!queue.has_token_at(1.0));
        queue.put(Token::Null, 1.0);
        queue.put(Token::Null, 0.5);
        assert!(queue.has_token_at(0.5 + 1e-8));
        assert!(!queue.has_token_at(1.0));
    }

    #[test]
    fn test_has_tokens_is_at_least() {
        let mut queue = TimedQueue::new();
        queue.put(Token::Null, 0.0);
        queue.put(Token::Null, 0.0);
        assert!(queue.has_tokens(1).unwrap());
        assert!(queue.has_tokens(2).unwrap());
        assert!(!queue.has_tokens(3).unwrap());
        assert!(matches!(queue.has_tokens(0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_remove_where() {
        let mut queue = TimedQueue::new();
        queue.put(ActorId(1), 1.0);
        queue.put(ActorId(2), 1.0);
        queue.put(ActorId(1), 2.0);
        assert_eq!(queue.remove_where(|id| *id == ActorId(1)), 2);
        assert_eq!(queue.peek(), Some((1.0, &ActorId(2))));
    }

    #[test]
    fn test_priority_receiver_kind() {
        let receiver = TimedReceiver::with_priority(Resolution::DEFAULT, 4);
        assert_eq!(receiver.kind(), ReceiverKind::PriorityOrdered);
        assert_eq!(receiver.priority(), Some(4));
        assert_eq!(
            TimedReceiver::new(Resolution::DEFAULT).kind(),
            ReceiverKind::TimeOrdered
        );
    }

    #[test]
    fn test_receiver_take_event_keeps_timestamp() {
        let mut receiver = TimedReceiver::new(Resolution::DEFAULT);
        receiver.put(Event::new(Token::Int(2), 2.0));
        receiver.put(Event::new(Token::Int(1), 1.0));
        assert_eq!(receiver.next_time(), Some(1.0));
        let event = receiver.take_event().unwrap();
        assert_eq!(event.time, 1.0);
        assert_eq!(event.token, Token::Int(1));
    }

    fn scalar_token() -> impl Strategy<Value = Token> {
        prop_oneof![
            Just(Token::Null),
            any::<bool>().prop_map(Token::Bool),
            (-4i64..4).prop_map(Token::Int),
            (-8i32..8).prop_map(|x| Token::Float(f64::from(x) / 2.0)),
            "[a-c]{0,2}".prop_map(Token::String),
        ]
    }

    proptest! {
        #[test]
        fn dequeue_order_ignores_insertion_order(
            tokens in prop::collection::vec(scalar_token(), 0..24),
        ) {
            let drain = |tokens: &mut dyn Iterator<Item = Token>| {
                let mut queue = TimedQueue::new();
                for token in tokens {
                    queue.put(token, 1.0);
                }
                std::iter::from_fn(|| queue.take().ok())
                    .map(|(_, t)| t)
                    .collect::<Vec<_>>()
            };
            let forward = drain(&mut tokens.clone().into_iter());
            let backward = drain(&mut tokens.into_iter().rev());
            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn take_yields_minimum_key(
            entries in prop::collection::vec((0u8..16, -100i64..100), 1..48),
        ) {
            let mut queue = TimedQueue::new();
            for (time, value) in &entries {
                queue.put(Token::Int(*value), *time as f64 / 4.0);
            }
            let mut expected: Vec<(f64, i64)> = entries
                .iter()
                .map(|(t, v)| (*t as f64 / 4.0, *v))
                .collect();
            expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            for (time, value) in expected {
                prop_assert!(queue.has_token_at(time));
                let (t, token) = queue.take().unwrap();
                prop_assert_eq!(t, time);
                prop_assert_eq!(token, Token::Int(value));
            }
            prop_assert!(queue.is_empty());
        }
    }
}
