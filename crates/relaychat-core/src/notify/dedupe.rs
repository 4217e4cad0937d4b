//! Bounded memory of recently processed message ids.

use std::collections::{HashSet, VecDeque};

/// Remembers the last `capacity` ids; the oldest is forgotten first.
#[derive(Debug)]
pub struct RecentIds {
    capacity: usize,
    order: VecDeque<i64>,
    seen: HashSet<i64>,
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Record `id`. Returns `false` if it was already in the window.
    pub fn insert(&mut self, id: i64) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
