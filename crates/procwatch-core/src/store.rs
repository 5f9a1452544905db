//! Bounded in-memory snapshot history.

use std::collections::VecDeque;

use crate::Snapshot;

/// Fixed-capacity FIFO ring of snapshots, oldest first.
///
/// Length never exceeds the capacity set at construction; pushing into a full
/// store evicts the oldest entry.
#[derive(Debug)]
pub struct SnapshotStore {
    buf: VecDeque<Snapshot>,
    capacity: usize,
}

impl SnapshotStore {
    /// Create a store holding at most `capacity` snapshots (clamped to ≥ 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a snapshot, evicting the oldest entry when full.
    pub fn push(&mut self, snapshot: Snapshot) {
        while self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(snapshot);
    }

    /// Owned copy of the history, oldest to newest.
    pub fn all(&self) -> Vec<Snapshot> {
        self.buf.iter().cloned().collect()
    }

    /// Drop oldest entries until at most `keep` remain. Used by the memory
    /// watchdog; does not change the configured capacity.
    pub fn trim_to(&mut self, keep: usize) {
        while self.buf.len() > keep {
            self.buf.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessSample;

    fn snapshot(tag: i64) -> Snapshot {
        Snapshot {
            timestamp: tag,
            samples: vec![ProcessSample::running("pid:1", tag as f32, 1.0)],
        }
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut store = SnapshotStore::new(3);
        for i in 0..10 {
            store.push(snapshot(i));
            assert!(store.len() <= 3);
        }
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut store = SnapshotStore::new(3);
        for i in 0..10 {
            store.push(snapshot(i));
        }

        let timestamps: Vec<i64> = store.all().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![7, 8, 9]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut store = SnapshotStore::new(0);
        store.push(snapshot(1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.capacity(), 1);
    }

    #[test]
    fn test_all_returns_copy() {
        let mut store = SnapshotStore::new(2);
        store.push(snapshot(1));

        let mut copy = store.all();
        copy.clear();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_trim_to_keeps_newest() {
        let mut store = SnapshotStore::new(10);
        for i in 0..8 {
            store.push(snapshot(i));
        }

        store.trim_to(3);
        let timestamps: Vec<i64> = store.all().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![5, 6, 7]);

        // Trimming below the current length is a no-op.
        store.trim_to(5);
        assert_eq!(store.len(), 3);
    }
}
