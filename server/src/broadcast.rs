//! Ordered outbox of committed state changes.
//!
//! Components commit a delta only after the transition it describes has been
//! applied, so nothing speculative ever reaches an observer. Sequence numbers
//! follow commit order; the transport drains the outbox and sends every delta
//! to every observer in that order.

use arena_shared::Delta;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    pub seq: u64,
    pub delta: Delta,
}

#[derive(Debug, Default)]
pub struct ReplicationBroadcaster {
    last_seq: u64,
    outbox: VecDeque<Committed>,
}

impl ReplicationBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(&mut self, delta: Delta) -> u64 {
        self.last_seq += 1;
        self.outbox.push_back(Committed {
            seq: self.last_seq,
            delta,
        });
        self.last_seq
    }

    /// Sequence number of the newest committed delta, drained or not.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    pub fn drain(&mut self) -> Vec<Committed> {
        self.outbox.drain(..).collect()
    }
}
