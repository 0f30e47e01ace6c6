//! Simulated occurrences and the queue that orders them.

use std::{cmp::Ordering, collections::BTreeMap};

use crate::{block::Block, node::NodeId, transaction::Transaction};

/// Simulated time, in seconds.
pub type Time = f64;

/// What happens when an [`Event`] is dispatched. Payloads are owned copies:
/// whatever the receiving node does with them is invisible to the sender.
#[derive(Debug, Clone)]
pub enum EventKind {
    /// The target creates a new transaction.
    TxnGenerate,
    /// The target hears about a transaction from a neighbor.
    TxnReceive(Transaction),
    /// The target finishes mining the carried candidate block.
    BlockMine(Block),
    /// The target hears about a block from a neighbor.
    BlockReceive(Block),
}

impl EventKind {
    /// Short name used in logs and statistics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TxnGenerate => "TxnGenerate",
            Self::TxnReceive(_) => "TxnReceive",
            Self::BlockMine(_) => "BlockMine",
            Self::BlockReceive(_) => "BlockReceive",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub time: Time,
    pub target: NodeId,
    pub kind: EventKind,
}

impl Event {
    pub fn new(time: Time, target: NodeId, kind: EventKind) -> Self {
        Self { time, target, kind }
    }
}

/// Key for ordering events in the queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Sequence number (FIFO for events scheduled at the same time)
#[derive(Debug, Clone, Copy)]
struct EventKey {
    time: Time,
    sequence: u64,
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventKey {}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.total_cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }

        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("no events are scheduled")]
    EmptyQueue,
}

/// Total order over future events. Ties on time are broken by the order in
/// which events were scheduled.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: BTreeMap<EventKey, Event>,
    sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, event: Event) {
        self.sequence += 1;
        let key = EventKey { time: event.time, sequence: self.sequence };
        self.events.insert(key, event);
    }

    /// Removes and returns the earliest event.
    pub fn pop_earliest(&mut self) -> Result<Event, QueueError> {
        self.events
            .pop_first()
            .map(|(_, event)| event)
            .ok_or(QueueError::EmptyQueue)
    }

    /// Time of the earliest event, if any.
    pub fn peek_time(&self) -> Option<Time> {
        self.events.first_key_value().map(|(key, _)| key.time)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
