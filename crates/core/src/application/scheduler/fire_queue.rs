// Fire queue: pending job firings ordered by (fire_at, seq)

use crate::domain::Job;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tokio::time::Instant;

/// A job armed to fire at `fire_at`
#[derive(Debug, Clone)]
pub struct Firing {
    pub fire_at: Instant,
    pub seq: u64,
    pub job: Job,
}

impl PartialEq for Firing {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for Firing {}

impl PartialOrd for Firing {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Firing {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fire_at
            .cmp(&other.fire_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-heap of firings. Ties on `fire_at` pop in insertion (FIFO) order.
#[derive(Debug, Default)]
pub struct FireQueue {
    heap: BinaryHeap<Reverse<Firing>>,
    next_seq: u64,
}

impl FireQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fire_at: Instant, job: Job) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Firing { fire_at, seq, job }));
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(f)| f.fire_at)
    }

    /// Pop the earliest firing if it is due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<Firing> {
        match self.next_deadline() {
            Some(deadline) if deadline <= now => self.heap.pop().map(|Reverse(f)| f),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
