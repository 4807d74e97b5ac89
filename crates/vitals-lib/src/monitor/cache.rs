//! Bounded cache of recent tick results

use crate::models::TickResult;
use std::collections::VecDeque;

/// Keeps the most recent `capacity` tick results
#[derive(Debug, Clone)]
pub struct RecordCache {
    records: VecDeque<TickResult>,
    capacity: usize,
}

impl RecordCache {
    /// A zero capacity is clamped to 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: TickResult) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Up to `n` results, newest first
    pub fn recent(&self, n: usize) -> Vec<TickResult> {
        self.records.iter().rev().take(n).cloned().collect()
    }

    pub fn latest(&self) -> Option<&TickResult> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
