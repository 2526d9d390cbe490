//! Deadline-ordered timer queue driven by the authority tick.
//!
//! The queue never cancels anything on its own. Payloads carry whatever
//! generation token their owner needs to recognise a stale firing; owners
//! purge entries with [`TimerQueue::retain`] when the subject goes away.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Scheduled<T> {
    deadline: u64,
    seq: u64,
    payload: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    // Reversed so the max-heap pops the earliest deadline first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Payloads ordered by deadline, then by scheduling order.
pub struct TimerQueue<T> {
    heap: BinaryHeap<Scheduled<T>>,
    next_seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Queues `payload` to come due at `deadline`. A deadline already in the
    /// past fires on the next drain.
    pub fn schedule(&mut self, deadline: u64, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled {
            deadline,
            seq,
            payload,
        });
    }

    /// Removes and returns every payload whose deadline is at or before `now`,
    /// earliest first, ties in scheduling order.
    pub fn drain_due(&mut self, now: u64) -> Vec<T> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|next| next.deadline <= now) {
            if let Some(entry) = self.heap.pop() {
                due.push(entry.payload);
            }
        }
        due
    }

    /// Drops every pending payload for which `keep` is false.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.heap.retain(|entry| keep(&entry.payload));
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.heap.peek().map(|entry| entry.deadline)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
