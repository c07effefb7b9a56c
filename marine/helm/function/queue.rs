//! Refinement order: region index to priority, highest first.

use std::{cmp::Ordering, collections::BinaryHeap};

#[derive(Debug, Clone)]
struct Entry {
    priority: f64,
    seq: u64,
    key: usize,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Equal priorities pop in insertion order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Max-priority queue over region indices.
#[derive(Debug, Clone, Default)]
pub struct RefineQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl RefineQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a region index.
    pub fn push(&mut self, key: usize, priority: f64) {
        self.heap.push(Entry {
            priority,
            seq: self.next_seq,
            key,
        });
        self.next_seq += 1;
    }

    /// Removes and returns the highest-priority entry.
    pub fn pop(&mut self) -> Option<(usize, f64)> {
        self.heap.pop().map(|entry| (entry.key, entry.priority))
    }

    /// Highest-priority entry without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<(usize, f64)> {
        self.heap.peek().map(|entry| (entry.key, entry.priority))
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Queued keys, highest priority first.
    #[must_use]
    pub fn keys(&self) -> Vec<usize> {
        let mut entries: Vec<&Entry> = self.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|entry| entry.key).collect()
    }

    /// Relabels keys after the region list changed: `remap[old]` is the new
    /// index, or `None` when the region is gone. Entries for removed or
    /// out-of-range regions are dropped.
    pub fn reindex(&mut self, remap: &[Option<usize>]) {
        let entries = std::mem::take(&mut self.heap).into_vec();
        self.heap = entries
            .into_iter()
            .filter_map(|entry| {
                let key = remap.get(entry.key).copied().flatten()?;
                Some(Entry { key, ..entry })
            })
            .collect();
    }
}
