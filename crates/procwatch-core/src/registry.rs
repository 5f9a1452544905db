//! The set of processes currently being watched.

use crate::WatchTarget;

/// Insertion-ordered set of watch targets, keyed by `(kind, id)`.
///
/// Watched sets are small (a handful of processes), so a Vec with linear key
/// lookup keeps insertion order without a secondary index.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Vec<WatchTarget>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target. Idempotent: returns false if the key is already present.
    pub fn add(&mut self, target: WatchTarget) -> bool {
        if self.contains(&target.kind, &target.id) {
            return false;
        }
        self.targets.push(target);
        true
    }

    /// Remove a target by key. Returns false if the key was unknown.
    pub fn remove(&mut self, kind: &str, id: &str) -> bool {
        let before = self.targets.len();
        self.targets.retain(|t| !(t.kind == kind && t.id == id));
        self.targets.len() != before
    }

    pub fn contains(&self, kind: &str, id: &str) -> bool {
        self.targets.iter().any(|t| t.kind == kind && t.id == id)
    }

    /// Owned, order-preserving copy of the current targets.
    pub fn targets(&self) -> Vec<WatchTarget> {
        self.targets.clone()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
