//! Assignment storage
//!
//! [`AssignmentStore::get_or_assign`] is the heart of the crate: it returns
//! the stored branch for a `(subject, partition)` pair if one exists, and
//! otherwise buckets the subject and records the result. Once a branch is
//! recorded it is returned forever, even if the allocation table changes.
//!
//! # Example
//!
//! ```rust
//! use trueno_ab::assignment::{AssignmentStore, MemoryAssignmentStore, SubjectContext};
//! use trueno_ab::bucketing::{AllocationTable, Bucketer};
//!
//! # async fn example() -> trueno_ab::Result<()> {
//! let store = MemoryAssignmentStore::new();
//! let bucketer = Bucketer::default();
//! let table = AllocationTable::from_pairs([("control", 50.0), ("treatment", 50.0)])?;
//!
//! let first = store
//!     .get_or_assign(&bucketer, "user-1", "exp", &table, SubjectContext::default())
//!     .await?;
//! let again = store
//!     .get_or_assign(&bucketer, "user-1", "exp", &table, SubjectContext::default())
//!     .await?;
//! assert!(first.is_first && !again.is_first);
//! assert_eq!(first.assignment, again.assignment);
//! # Ok(())
//! # }
//! ```

mod record;
mod store;

pub use record::{Assignment, AssignmentOutcome, DeviceClass, SubjectContext};
pub use store::MemoryAssignmentStore;

use crate::bucketing::{AllocationTable, Bucketer};
use crate::error::require_non_empty;
use crate::Result;
use std::future::Future;

/// Storage for assignments.
///
/// Implementations own the atomicity of [`insert_if_absent`]: when callers
/// race on the same key, exactly one insert wins and every caller gets the
/// winner back.
///
/// [`insert_if_absent`]: AssignmentStore::insert_if_absent
pub trait AssignmentStore: Send + Sync {
    /// Get the assignment for a pair, if any.
    fn get(
        &self,
        subject_id: &str,
        partition_id: &str,
    ) -> impl Future<Output = Result<Option<Assignment>>> + Send;

    /// Store `assignment` unless its pair already has one.
    ///
    /// Returns the stored assignment and whether this call inserted it.
    fn insert_if_absent(
        &self,
        assignment: Assignment,
    ) -> impl Future<Output = Result<(Assignment, bool)>> + Send;

    /// All assignments within a partition, in no particular order.
    fn list_for_partition(
        &self,
        partition_id: &str,
    ) -> impl Future<Output = Result<Vec<Assignment>>> + Send;

    /// Return the existing assignment for a pair, or bucket the subject and
    /// record a new one.
    ///
    /// `table` is ignored when an assignment already exists.
    fn get_or_assign(
        &self,
        bucketer: &Bucketer,
        subject_id: &str,
        partition_id: &str,
        table: &AllocationTable,
        context: SubjectContext,
    ) -> impl Future<Output = Result<AssignmentOutcome>> + Send {
        async move {
            require_non_empty("subject_id", subject_id)?;
            require_non_empty("partition_id", partition_id)?;

            if let Some(assignment) = self.get(subject_id, partition_id).await? {
                return Ok(AssignmentOutcome {
                    assignment,
                    is_first: false,
                });
            }

            let branch = bucketer.assign(subject_id, partition_id, table)?;
            let candidate = Assignment::new(subject_id, partition_id, branch, context);
            let (assignment, is_first) = self.insert_if_absent(candidate).await?;
            Ok(AssignmentOutcome {
                assignment,
                is_first,
            })
        }
    }
}
