//! Partition Record - experiment definition with its allocation table

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bucketing::{Allocation, AllocationTable};
use crate::error::{require_non_empty, Error, Result};

/// Lifecycle status of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStatus {
    /// Accepting new assignments.
    Active,
    /// Switched off.
    Inactive,
    /// Temporarily halted (kill switch).
    Paused,
}

impl PartitionStatus {
    /// Get the status name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for PartitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "paused" => Ok(Self::Paused),
            other => Err(Error::InvalidInput(format!(
                "unknown partition status '{other}'"
            ))),
        }
    }
}

/// Partition represents one experiment.
///
/// Everything except the status is fixed once the partition is registered.
/// Deserialization runs the same checks as [`PartitionBuilder::build`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "PartitionFields")]
pub struct Partition {
    partition_id: String,
    name: String,
    description: Option<String>,
    status: PartitionStatus,
    allocations: AllocationTable,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

/// Unchecked wire shape of a partition.
#[derive(Deserialize)]
struct PartitionFields {
    partition_id: String,
    name: String,
    description: Option<String>,
    status: PartitionStatus,
    allocations: AllocationTable,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

impl TryFrom<PartitionFields> for Partition {
    type Error = Error;

    fn try_from(fields: PartitionFields) -> Result<Self> {
        let partition = Self {
            partition_id: fields.partition_id,
            name: fields.name,
            description: fields.description,
            status: fields.status,
            allocations: fields.allocations,
            start_date: fields.start_date,
            end_date: fields.end_date,
        };
        partition.validate()?;
        Ok(partition)
    }
}

impl Partition {
    /// Create an active partition with no description or schedule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `partition_id` is empty.
    pub fn new(
        partition_id: impl Into<String>,
        name: impl Into<String>,
        allocations: AllocationTable,
    ) -> Result<Self> {
        Self::builder(partition_id, name, allocations).build()
    }

    /// Create a builder for constructing a partition with optional fields.
    #[must_use]
    pub fn builder(
        partition_id: impl Into<String>,
        name: impl Into<String>,
        allocations: AllocationTable,
    ) -> PartitionBuilder {
        PartitionBuilder::new(partition_id, name, allocations)
    }

    /// The demo experiment served by a freshly seeded provider.
    #[must_use]
    pub fn homepage_banner() -> Self {
        Self {
            partition_id: "homepage_banner".to_string(),
            name: "Homepage Banner Test".to_string(),
            description: Some("Testing different banner designs".to_string()),
            status: PartitionStatus::Active,
            allocations: AllocationTable::from_entries_unchecked(vec![
                Allocation {
                    branch: "control".to_string(),
                    weight: 50.0,
                },
                Allocation {
                    branch: "variant_a".to_string(),
                    weight: 30.0,
                },
                Allocation {
                    branch: "variant_b".to_string(),
                    weight: 20.0,
                },
            ]),
            start_date: Some(Utc::now()),
            end_date: None,
        }
    }

    /// Get the partition ID.
    #[must_use]
    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    /// Get the human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Get the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> PartitionStatus {
        self.status
    }

    /// Whether new assignments are accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PartitionStatus::Active
    }

    /// Get the allocation table.
    #[must_use]
    pub const fn allocations(&self) -> &AllocationTable {
        &self.allocations
    }

    /// Get the scheduled start, if any.
    #[must_use]
    pub const fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    /// Get the scheduled end, if any.
    #[must_use]
    pub const fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// Check the ID is present and the schedule is ordered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the ID is empty or the end date
    /// precedes the start date.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("partition_id", &self.partition_id)?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(Error::InvalidInput(format!(
                    "partition '{}' ends before it starts",
                    self.partition_id
                )));
            }
        }
        Ok(())
    }

    /// Replace the status. The only mutation a partition supports.
    pub fn set_status(&mut self, status: PartitionStatus) {
        self.status = status;
    }
}

/// Builder for `Partition`.
#[derive(Debug)]
pub struct PartitionBuilder {
    partition_id: String,
    name: String,
    description: Option<String>,
    status: PartitionStatus,
    allocations: AllocationTable,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

impl PartitionBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        partition_id: impl Into<String>,
        name: impl Into<String>,
        allocations: AllocationTable,
    ) -> Self {
        Self {
            partition_id: partition_id.into(),
            name: name.into(),
            description: None,
            status: PartitionStatus::Active,
            allocations,
            start_date: None,
            end_date: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the initial status.
    #[must_use]
    pub const fn status(mut self, status: PartitionStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the scheduled start.
    #[must_use]
    pub const fn start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }

    /// Set the scheduled end.
    #[must_use]
    pub const fn end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Build the `Partition`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the ID is empty or the end date
    /// precedes the start date.
    pub fn build(self) -> Result<Partition> {
        let partition = Partition {
            partition_id: self.partition_id,
            name: self.name,
            description: self.description,
            status: self.status,
            allocations: self.allocations,
            start_date: self.start_date,
            end_date: self.end_date,
        };
        partition.validate()?;
        Ok(partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn table() -> AllocationTable {
        AllocationTable::from_pairs([("control", 50.0), ("treatment", 50.0)]).unwrap()
    }

    #[test]
    fn test_partition_new_is_active() {
        let partition = Partition::new("exp-1", "Checkout", table()).unwrap();
        assert_eq!(partition.partition_id(), "exp-1");
        assert_eq!(partition.name(), "Checkout");
        assert!(partition.is_active());
        assert!(partition.description().is_none());
    }

    #[test]
    fn test_partition_builder() {
        let start = Utc::now();
        let partition = Partition::builder("exp-2", "Pricing", table())
            .description("price anchoring")
            .status(PartitionStatus::Paused)
            .start_date(start)
            .end_date(start + Duration::days(14))
            .build()
            .unwrap();
        assert_eq!(partition.status(), PartitionStatus::Paused);
        assert_eq!(partition.description(), Some("price anchoring"));
        assert_eq!(partition.start_date(), Some(start));
    }

    #[test]
    fn test_partition_builder_rejects_bad_input() {
        assert!(Partition::new("", "x", table()).is_err());
        let start = Utc::now();
        let result = Partition::builder("exp", "x", table())
            .start_date(start)
            .end_date(start - Duration::hours(1))
            .build();
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_deserialize_runs_validation() {
        let valid = serde_json::json!({
            "partition_id": "exp-3",
            "name": "Search",
            "description": null,
            "status": "active",
            "allocations": [
                {"branch": "control", "weight": 50.0},
                {"branch": "treatment", "weight": 50.0}
            ],
            "start_date": "2024-01-01T00:00:00Z",
            "end_date": "2024-02-01T00:00:00Z"
        });
        let partition: Partition = serde_json::from_value(valid.clone()).unwrap();
        assert_eq!(partition.partition_id(), "exp-3");
        assert_eq!(serde_json::to_value(&partition).unwrap(), valid);

        let mut empty_id = valid.clone();
        empty_id["partition_id"] = serde_json::json!("");
        let err = serde_json::from_value::<Partition>(empty_id).unwrap_err();
        assert!(err.to_string().contains("partition_id"));

        let mut reversed = valid;
        reversed["start_date"] = serde_json::json!("2024-02-01T00:00:00Z");
        reversed["end_date"] = serde_json::json!("2024-01-01T00:00:00Z");
        let err = serde_json::from_value::<Partition>(reversed).unwrap_err();
        assert!(err.to_string().contains("ends before it starts"));
    }

    #[test]
    fn test_homepage_banner_seed() {
        let partition = Partition::homepage_banner();
        assert_eq!(partition.partition_id(), "homepage_banner");
        assert!(partition.is_active());
        assert_eq!(
            partition.allocations().branches().collect::<Vec<_>>(),
            ["control", "variant_a", "variant_b"]
        );
    }

    #[test]
    fn test_status_parse_and_serde() {
        assert_eq!("paused".parse::<PartitionStatus>().unwrap(), PartitionStatus::Paused);
        assert!("running".parse::<PartitionStatus>().is_err());
        let json = serde_json::to_string(&PartitionStatus::Inactive).unwrap();
        assert_eq!(json, "\"inactive\"");
    }
}
