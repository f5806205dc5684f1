//! Event log
//!
//! Append-only record of interactions (impressions, clicks, conversions and
//! custom events), each tied to a partition and branch. The log checks that
//! identifiers are present but does not check that the partition exists;
//! that is the calling service's job.

mod log;
mod record;

pub use log::MemoryEventLog;
pub use record::{Event, EventKind, Metadata, NewEvent};

use crate::Result;
use std::future::Future;

/// Append-only event storage.
pub trait EventLog: Send + Sync {
    /// Validate, stamp and append an event. Returns the stored event.
    fn append(&self, event: NewEvent) -> impl Future<Output = Result<Event>> + Send;

    /// Up to `limit` events for a partition, ordered by recorded time.
    fn list(
        &self,
        partition_id: &str,
        limit: usize,
        newest_first: bool,
    ) -> impl Future<Output = Result<Vec<Event>>> + Send;

    /// Every event for a partition, oldest first.
    fn for_partition(&self, partition_id: &str) -> impl Future<Output = Result<Vec<Event>>> + Send {
        self.list(partition_id, usize::MAX, false)
    }
}
