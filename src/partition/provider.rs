//! In-memory partition provider using `DashMap`.
//!
//! Stand-in for a database-backed configuration source. Data is lost on
//! process restart.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{Partition, PartitionProvider, PartitionStatus};
use crate::{Error, Result};

/// In-memory partition configuration table.
#[derive(Debug, Default)]
pub struct MemoryPartitionProvider {
    partitions: DashMap<String, Partition>,
}

impl MemoryPartitionProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider holding the `homepage_banner` demo experiment.
    #[must_use]
    pub fn seeded() -> Self {
        Self::from_partitions([Partition::homepage_banner()])
    }

    /// Create a provider from existing partitions. Later duplicates win.
    #[must_use]
    pub fn from_partitions(partitions: impl IntoIterator<Item = Partition>) -> Self {
        let map = DashMap::new();
        for partition in partitions {
            map.insert(partition.partition_id().to_string(), partition);
        }
        Self { partitions: map }
    }

    /// Number of partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Whether no partitions are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

impl PartitionProvider for MemoryPartitionProvider {
    async fn get_partition(&self, partition_id: &str) -> Result<Option<Partition>> {
        Ok(self.partitions.get(partition_id).map(|p| p.value().clone()))
    }

    async fn list_partitions(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.partitions.iter().map(|p| p.key().clone()).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn put_partition(&self, partition: Partition) -> Result<()> {
        match self.partitions.entry(partition.partition_id().to_string()) {
            Entry::Occupied(entry) => Err(Error::InvalidInput(format!(
                "partition '{}' already exists",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                entry.insert(partition);
                Ok(())
            }
        }
    }

    async fn set_status(&self, partition_id: &str, status: PartitionStatus) -> Result<Partition> {
        let mut partition = self
            .partitions
            .get_mut(partition_id)
            .ok_or_else(|| Error::NotFound(partition_id.to_string()))?;
        partition.set_status(status);
        Ok(partition.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucketing::AllocationTable;

    fn partition(id: &str) -> Partition {
        let table = AllocationTable::from_pairs([("control", 100.0)]).unwrap();
        Partition::new(id, id.to_uppercase(), table).unwrap()
    }

    #[tokio::test]
    async fn test_seeded_provider() {
        let provider = MemoryPartitionProvider::seeded();
        assert_eq!(provider.len(), 1);
        let found = provider.get_partition("homepage_banner").await.unwrap();
        assert!(found.is_some());
        assert!(provider.get_partition("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_partitions_sorted() {
        let provider = MemoryPartitionProvider::from_partitions([
            partition("zeta"),
            partition("alpha"),
            partition("mid"),
        ]);
        let ids = provider.list_partitions().await.unwrap();
        assert_eq!(ids, ["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn test_put_partition_rejects_duplicate() {
        let provider = MemoryPartitionProvider::new();
        assert!(provider.is_empty());
        provider.put_partition(partition("exp")).await.unwrap();
        let err = provider.put_partition(partition("exp")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(provider.len(), 1);
    }

    #[tokio::test]
    async fn test_set_status() {
        let provider = MemoryPartitionProvider::from_partitions([partition("exp")]);
        let updated = provider
            .set_status("exp", PartitionStatus::Paused)
            .await
            .unwrap();
        assert_eq!(updated.status(), PartitionStatus::Paused);
        let stored = provider.get_partition("exp").await.unwrap().unwrap();
        assert_eq!(stored.status(), PartitionStatus::Paused);

        let err = provider
            .set_status("missing", PartitionStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
