//! In-memory assignment store using `DashMap`.
//!
//! Keys hash with `FxHash`. The check-then-insert for a key runs under that
//! key's shard lock via the entry API, so racing first-time requests settle
//! on a single winner.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use super::{Assignment, AssignmentStore};
use crate::Result;

type AssignmentKey = (String, String);

/// In-memory assignment table keyed by `(subject_id, partition_id)`.
#[derive(Debug, Default)]
pub struct MemoryAssignmentStore {
    assignments: DashMap<AssignmentKey, Assignment, FxBuildHasher>,
}

impl MemoryAssignmentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            assignments: DashMap::with_capacity_and_hasher(capacity, FxBuildHasher),
        }
    }

    /// Total number of assignments across all partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether no assignment has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

fn key(subject_id: &str, partition_id: &str) -> AssignmentKey {
    (subject_id.to_string(), partition_id.to_string())
}

impl AssignmentStore for MemoryAssignmentStore {
    async fn get(&self, subject_id: &str, partition_id: &str) -> Result<Option<Assignment>> {
        Ok(self
            .assignments
            .get(&key(subject_id, partition_id))
            .map(|a| a.value().clone()))
    }

    async fn insert_if_absent(&self, assignment: Assignment) -> Result<(Assignment, bool)> {
        let k = key(assignment.subject_id(), assignment.partition_id());
        match self.assignments.entry(k) {
            Entry::Occupied(existing) => Ok((existing.get().clone(), false)),
            Entry::Vacant(slot) => {
                let stored = slot.insert(assignment);
                Ok((stored.value().clone(), true))
            }
        }
    }

    async fn list_for_partition(&self, partition_id: &str) -> Result<Vec<Assignment>> {
        Ok(self
            .assignments
            .iter()
            .filter(|entry| entry.key().1 == partition_id)
            .map(|entry| entry.value().clone())
            .collect())
    }
}
