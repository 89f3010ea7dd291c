//! First-in first-out queue with optional capacity and history

use crate::config::HistoryCapacity;
use crate::error::{Error, Result};
use crate::receiver::{Event, Receiver, ReceiverKind};
use crate::time::Time;
use crate::token::Token;
use std::any::Any;
use std::collections::VecDeque;

/// A FIFO queue
///
/// Items are appended with [`put`](Self::put) and removed oldest-first with
/// [`take`](Self::take). The capacity is unbounded unless set. When history
/// is enabled, removed items move to a secondary queue instead of being
/// dropped; a bounded history evicts its oldest entry when full.
#[derive(Debug, Clone)]
pub struct FifoQueue<T> {
    items: VecDeque<T>,
    capacity: Option<usize>,
    history: VecDeque<T>,
    history_capacity: HistoryCapacity,
}

impl<T> FifoQueue<T> {
    /// Create an unbounded queue without history
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
            capacity: None,
            history: VecDeque::new(),
            history_capacity: HistoryCapacity::Disabled,
        }
    }

    /// Create a queue holding at most `capacity` items
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Set the history retention policy
    pub fn with_history(mut self, history: HistoryCapacity) -> Self {
        self.history_capacity = history;
        self
    }

    /// Append an item
    ///
    /// Returns `false` and leaves the queue untouched if it is full.
    pub fn put(&mut self, item: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push_back(item);
        true
    }

    /// Remove and return the oldest item
    pub fn take(&mut self) -> Result<T>
    where
        T: Clone,
    {
        let item = self
            .items
            .pop_front()
            .ok_or_else(|| Error::EmptyQueue("fifo queue".to_string()))?;
        if self.history_capacity.is_enabled() {
            self.remember(item.clone());
        }
        Ok(item)
    }

    /// Peek at the `offset`-th most recently added item (0 = newest)
    pub fn get(&self, offset: usize) -> Result<&T> {
        let len = self.items.len();
        if offset >= len {
            return Err(Error::OffsetOutOfRange { offset, len });
        }
        Ok(&self.items[len - 1 - offset])
    }

    /// Peek at the `offset`-th most recently consumed item (0 = newest)
    pub fn history_get(&self, offset: usize) -> Result<&T> {
        let len = self.history.len();
        if offset >= len {
            return Err(Error::OffsetOutOfRange { offset, len });
        }
        Ok(&self.history[len - 1 - offset])
    }

    /// Consumed items, oldest first
    pub fn history(&self) -> impl Iterator<Item = &T> {
        self.history.iter()
    }

    /// Pending items, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Number of pending items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if no items are pending
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if another `put` would be rejected
    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.items.len() >= cap)
    }

    /// Current capacity (`None` = unbounded)
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Change the capacity
    ///
    /// Fails if the queue already holds more items than the new capacity.
    pub fn set_capacity(&mut self, capacity: Option<usize>) -> Result<()> {
        if let Some(cap) = capacity {
            if cap < self.items.len() {
                return Err(Error::InvalidArgument(format!(
                    "capacity {} is smaller than the {} queued items",
                    cap,
                    self.items.len()
                )));
            }
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Number of items retained in history
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Current history retention policy
    pub fn history_capacity(&self) -> HistoryCapacity {
        self.history_capacity
    }

    /// Change the history policy, trimming the oldest entries if needed
    pub fn set_history_capacity(&mut self, history: HistoryCapacity) {
        self.history_capacity = history;
        match history {
            HistoryCapacity::Disabled => self.history.clear(),
            HistoryCapacity::Bounded(cap) => {
                while self.history.len() > cap {
                    self.history.pop_front();
                }
            }
            HistoryCapacity::Unbounded => {}
        }
    }

    /// Drop all retained history
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Drop all pending items (history is kept)
    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn remember(&mut self, item: T) {
        match self.history_capacity {
            HistoryCapacity::Disabled => {}
            HistoryCapacity::Bounded(0) => {}
            HistoryCapacity::Bounded(cap) => {
                if self.history.len() >= cap {
                    self.history.pop_front();
                }
                self.history.push_back(item);
            }
            HistoryCapacity::Unbounded => self.history.push_back(item),
        }
    }
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver backed by a [`FifoQueue`]
#[derive(Debug, Clone, Default)]
pub struct FifoReceiver {
    queue: FifoQueue<Event>,
}

impl FifoReceiver {
    /// Create an unbounded receiver
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a receiver from a configured queue
    pub fn from_queue(queue: FifoQueue<Event>) -> Self {
        Self { queue }
    }

    /// Access the underlying queue (capacity, history, offsets)
    pub fn queue(&self) -> &FifoQueue<Event> {
        &self.queue
    }

    /// Mutable access to the underlying queue
    pub fn queue_mut(&mut self) -> &mut FifoQueue<Event> {
        &mut self.queue
    }

    /// Peek at the `offset`-th most recently received token (0 = newest)
    pub fn get(&self, offset: usize) -> Result<&Token> {
        self.queue.get(offset).map(|event| &event.token)
    }
}

impl Receiver for FifoReceiver {
    fn kind(&self) -> ReceiverKind {
        if self.queue.capacity().is_some() {
            ReceiverKind::Bounded
        } else {
            ReceiverKind::Fifo
        }
    }

    fn put(&mut self, event: Event) -> bool {
        self.queue.put(event)
    }

    fn take_event(&mut self) -> Result<Event> {
        self.queue.take()
    }

    fn has_token(&self) -> bool {
        !self.queue.is_empty()
    }

    fn has_room(&self) -> bool {
        !self.queue.is_full()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn next_time(&self) -> Option<Time> {
        self.queue.iter().next().map(|event| event.time)
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
    fn test_take_returns_oldest() {
        let mut queue = FifoQueue::new();
        assert!(queue.put(1));
        assert!(queue.put(2));
        assert_eq!(queue.take().unwrap(), 1);
        assert_eq!(queue.take().unwrap(), 2);
        assert!(matches!(queue.take(), Err(Error::EmptyQueue(_))));
    }

    #[test]
    fn test_get_offset_counts_from_newest() {
        let mut queue = FifoQueue::new();
        queue.put("a");
        queue.put("b");
        queue.put("c");
        assert_eq!(*queue.get(0).unwrap(), "c");
        assert_eq!(*queue.get(2).unwrap(), "a");
        assert!(matches!(
            queue.get(3),
            Err(Error::OffsetOutOfRange { offset: 3, len: 3 })
        ));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_bounded_put_rejects_without_change() {
        let mut queue = FifoQueue::with_capacity(2);
        assert!(queue.put(1));
        assert!(queue.put(2));
        assert!(!queue.put(3));
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_set_capacity_below_len_fails() {
        let mut queue = FifoQueue::new();
        queue.put(1);
        queue.put(2);
        assert!(queue.set_capacity(Some(1)).is_err());
        assert!(queue.set_capacity(Some(2)).is_ok());
        assert!(queue.is_full());
        assert!(queue.set_capacity(None).is_ok());
        assert!(!queue.is_full());
    }

    #[test]
    fn test_history_disabled_by_default() {
        let mut queue = FifoQueue::new();
        queue.put(1);
        queue.take().unwrap();
        assert_eq!(queue.history_len(), 0);
    }

    #[test]
    fn test_bounded_history_evicts_oldest() {
        let mut queue = FifoQueue::new().with_history(HistoryCapacity::Bounded(2));
        for i in 0..4 {
            queue.put(i);
        }
        for _ in 0..4 {
            queue.take().unwrap();
        }
        assert_eq!(queue.history().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(*queue.history_get(0).unwrap(), 3);
    }

    #[test]
    fn test_unbounded_history_and_trim() {
        let mut queue = FifoQueue::new().with_history(HistoryCapacity::Unbounded);
        for i in 0..5 {
            queue.put(i);
            queue.take().unwrap();
        }
        assert_eq!(queue.history_len(), 5);

        queue.set_history_capacity(HistoryCapacity::Bounded(3));
        assert_eq!(queue.history().copied().collect::<Vec<_>>(), vec![2, 3, 4]);

        queue.clear_history();
        assert_eq!(queue.history_len(), 0);
    }

    #[test]
    fn test_receiver_kind_follows_capacity() {
        let unbounded = FifoReceiver::new();
        let bounded = FifoReceiver::from_queue(FifoQueue::with_capacity(1));
        assert_eq!(unbounded.kind(), ReceiverKind::Fifo);
        assert_eq!(bounded.kind(), ReceiverKind::Bounded);
    }

    #[test]
    fn test_receiver_capacity_rejection() {
        let mut receiver = FifoReceiver::from_queue(FifoQueue::with_capacity(1));
        assert!(receiver.put(Event::new(Token::Int(1), 0.0)));
        assert!(!receiver.has_room());
        assert!(!receiver.put(Event::new(Token::Int(2), 0.0)));
        assert_eq!(receiver.take().unwrap(), Token::Int(1));
    }

    proptest! {
        #[test]
        fn fifo_law(items in prop::collection::vec(any::<i64>(), 0..64)) {
            let mut queue = FifoQueue::new();
            for item in &items {
                prop_assert!(queue.put(*item));
            }
            let mut out = Vec::new();
            for _ in 0..items.len() {
                out.push(queue.take().unwrap());
            }
            prop_assert_eq!(out, items);
            prop_assert!(queue.is_empty());
        }

        #[test]
        fn bounded_put_beyond_capacity_is_rejected(
            cap in 0usize..8,
            items in prop::collection::vec(any::<i64>(), 0..16),
        ) {
            let mut queue = FifoQueue::with_capacity(cap);
            for (i, item) in items.iter().enumerate() {
                let before: Vec<i64> = queue.iter().copied().collect();
                let accepted = queue.put(*item);
                prop_assert_eq!(accepted, i < cap);
                if !accepted {
                    let after: Vec<i64> = queue.iter().copied().collect();
                    prop_assert_eq!(before, after);
                }
            }
        }
    }
}
