//! Partition configuration
//!
//! A partition is one experiment: an ID, a lifecycle status and an ordered
//! allocation table. The core reads partitions through [`PartitionProvider`],
//! so the in-memory table can be swapped for a database-backed one.
//!
//! ```rust
//! use trueno_ab::partition::{MemoryPartitionProvider, PartitionProvider};
//!
//! # async fn example() -> trueno_ab::Result<()> {
//! let provider = MemoryPartitionProvider::seeded();
//! let banner = provider.get_partition("homepage_banner").await?;
//! assert!(banner.is_some_and(|p| p.is_active()));
//! # Ok(())
//! # }
//! ```

mod provider;
mod record;

pub use provider::MemoryPartitionProvider;
pub use record::{Partition, PartitionBuilder, PartitionStatus};

use crate::Result;
use std::future::Future;

/// Source of partition configuration.
pub trait PartitionProvider: Send + Sync {
    /// Get a partition by ID. `None` if it does not exist.
    fn get_partition(
        &self,
        partition_id: &str,
    ) -> impl Future<Output = Result<Option<Partition>>> + Send;

    /// IDs of all partitions, sorted.
    fn list_partitions(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Register a new partition.
    ///
    /// Fails with `InvalidInput` if the ID is already taken.
    fn put_partition(&self, partition: Partition) -> impl Future<Output = Result<()>> + Send;

    /// Change a partition's status and return the updated partition.
    ///
    /// Fails with `NotFound` if the partition does not exist.
    fn set_status(
        &self,
        partition_id: &str,
        status: PartitionStatus,
    ) -> impl Future<Output = Result<Partition>> + Send;
}
