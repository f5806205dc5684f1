//! In-memory append-only event log.
//!
//! Events sit behind an `RwLock`. Appends take the write lock just long
//! enough to stamp and push a fully built event; readers clone out matching
//! events under the read lock.

use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use super::{Event, EventLog, NewEvent};
use crate::{Error, Result};

/// In-memory event log. Data is lost on process restart.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: RwLock<Vec<Event>>,
}

impl MemoryEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events across all partitions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Whether nothing has been recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Event>>> {
        self.events
            .read()
            .map_err(|e| Error::Internal(format!("event log lock poisoned: {e}")))
    }
}

impl EventLog for MemoryEventLog {
    async fn append(&self, event: NewEvent) -> Result<Event> {
        event.validate()?;
        let mut events = self
            .events
            .write()
            .map_err(|e| Error::Internal(format!("event log lock poisoned: {e}")))?;
        let event = event.into_event(Uuid::new_v4(), Utc::now());
        events.push(event.clone());
        Ok(event)
    }

    async fn list(
        &self,
        partition_id: &str,
        limit: usize,
        newest_first: bool,
    ) -> Result<Vec<Event>> {
        let events = self.read()?;
        let matching = events.iter().filter(|e| e.partition_id() == partition_id);
        let mut selected: Vec<Event> = if newest_first {
            matching.rev().cloned().collect()
        } else {
            matching.cloned().collect()
        };
        drop(events);

        // Stable sort: ties keep insertion order (reversed when newest first).
        if newest_first {
            selected.sort_by(|a, b| b.recorded_at().cmp(&a.recorded_at()));
        } else {
            selected.sort_by_key(Event::recorded_at);
        }
        selected.truncate(limit);
        Ok(selected)
    }
}
