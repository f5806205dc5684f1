//! Per-partition statistics
//!
//! Reports are rebuilt from the stores on every call and never cached. The
//! assignment scan and the event scan are separate reads, so a report taken
//! during concurrent writes may see an event whose assignment it missed (or
//! the reverse).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assignment::{Assignment, AssignmentStore};
use crate::event::{Event, EventKind, EventLog};
use crate::Result;

/// Counts for a single branch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchStats {
    /// Branch name
    pub branch: String,
    /// Subjects assigned to this branch
    pub assigned: u64,
    /// Impression events
    pub impressions: u64,
    /// Click events
    pub clicks: u64,
    /// Conversion events
    pub conversions: u64,
    /// `conversions / assigned * 100`, or 0 with no assigned subjects
    pub conversion_rate: f64,
}

/// Derived statistics for one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    /// Partition the report covers
    pub partition_id: String,
    /// Distinct subjects assigned
    pub total_users: u64,
    /// Assigned subjects per branch
    pub variant_distribution: BTreeMap<String, u64>,
    /// Event count per kind
    pub events_by_type: BTreeMap<EventKind, u64>,
    /// `conversions / total_users * 100`, or 0 with no assigned subjects
    pub conversion_rate: f64,
    /// Per-branch breakdown, sorted by branch name
    pub branches: Vec<BranchStats>,
    /// When the report was computed
    pub generated_at: DateTime<Utc>,
}

/// Percentage of `numerator` over `denominator`. Zero denominators give 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

impl StatisticsReport {
    /// Build a report from already-scanned records.
    ///
    /// Records belonging to other partitions are skipped.
    #[must_use]
    pub fn from_records(partition_id: &str, assignments: &[Assignment], events: &[Event]) -> Self {
        let mut branches: BTreeMap<String, BranchStats> = BTreeMap::new();
        let mut variant_distribution = BTreeMap::new();
        let mut events_by_type = BTreeMap::new();
        let mut total_users = 0_u64;

        for assignment in assignments.iter().filter(|a| a.partition_id() == partition_id) {
            total_users += 1;
            *variant_distribution
                .entry(assignment.branch().to_string())
                .or_insert(0) += 1;
            branch_entry(&mut branches, assignment.branch()).assigned += 1;
        }

        for event in events.iter().filter(|e| e.partition_id() == partition_id) {
            *events_by_type.entry(event.kind()).or_insert(0) += 1;
            let stats = branch_entry(&mut branches, event.branch());
            match event.kind() {
                EventKind::Impression => stats.impressions += 1,
                EventKind::Click => stats.clicks += 1,
                EventKind::Conversion => stats.conversions += 1,
                EventKind::Custom => {}
            }
        }

        let conversions = events_by_type
            .get(&EventKind::Conversion)
            .copied()
            .unwrap_or(0);

        let branches = branches
            .into_values()
            .map(|mut stats| {
                stats.conversion_rate = rate(stats.conversions, stats.assigned);
                stats
            })
            .collect();

        Self {
            partition_id: partition_id.to_string(),
            total_users,
            variant_distribution,
            events_by_type,
            conversion_rate: rate(conversions, total_users),
            branches,
            generated_at: Utc::now(),
        }
    }

    /// Number of events of one kind.
    #[must_use]
    pub fn event_count(&self, kind: EventKind) -> u64 {
        self.events_by_type.get(&kind).copied().unwrap_or(0)
    }

    /// Breakdown for one branch, if it has assignments or events.
    #[must_use]
    pub fn branch(&self, branch: &str) -> Option<&BranchStats> {
        self.branches.iter().find(|b| b.branch == branch)
    }
}

fn branch_entry<'m>(
    branches: &'m mut BTreeMap<String, BranchStats>,
    branch: &str,
) -> &'m mut BranchStats {
    branches
        .entry(branch.to_string())
        .or_insert_with(|| BranchStats {
            branch: branch.to_string(),
            ..BranchStats::default()
        })
}

/// Read-side aggregator over an assignment store and event log.
#[derive(Debug)]
pub struct StatsAggregator<'s, A, E> {
    assignments: &'s A,
    events: &'s E,
}

impl<'s, A, E> StatsAggregator<'s, A, E>
where
    A: AssignmentStore,
    E: EventLog,
{
    /// Create an aggregator borrowing both stores.
    #[must_use]
    pub const fn new(assignments: &'s A, events: &'s E) -> Self {
        Self {
            assignments,
            events,
        }
    }

    /// Scan both stores and compute a fresh report.
    ///
    /// # Errors
    ///
    /// Propagates storage failures from either store.
    pub async fn report(&self, partition_id: &str) -> Result<StatisticsReport> {
        let assignments = self.assignments.list_for_partition(partition_id).await?;
        let events = self.events.for_partition(partition_id).await?;
        Ok(StatisticsReport::from_records(
            partition_id,
            &assignments,
            &events,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{MemoryAssignmentStore, SubjectContext};
    use crate::event::{MemoryEventLog, NewEvent};

    #[test]
    fn test_rate_zero_denominator() {
        assert!(rate(5, 0).abs() < f64::EPSILON);
        assert!((rate(3, 10) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_report() {
        let report = StatisticsReport::from_records("exp", &[], &[]);
        assert_eq!(report.total_users, 0);
        assert!(report.variant_distribution.is_empty());
        assert!(report.events_by_type.is_empty());
        assert!(report.conversion_rate.abs() < f64::EPSILON);
        assert!(report.branches.is_empty());
    }

    #[tokio::test]
    async fn test_report_counts_and_rates() {
        let assignments = MemoryAssignmentStore::new();
        let events = MemoryEventLog::new();

        for i in 0..10 {
            let branch = if i < 6 { "control" } else { "variant_a" };
            let a = Assignment::new(format!("u{i}"), "exp", branch, SubjectContext::default());
            assignments.insert_if_absent(a).await.unwrap();
        }
        let noise = Assignment::new("u0", "other", "control", SubjectContext::default());
        assignments.insert_if_absent(noise).await.unwrap();

        for (subject, branch, kind) in [
            ("u0", "control", EventKind::Impression),
            ("u0", "control", EventKind::Conversion),
            ("u6", "variant_a", EventKind::Impression),
            ("u6", "variant_a", EventKind::Click),
            ("u6", "variant_a", EventKind::Conversion),
            ("u7", "variant_a", EventKind::Conversion),
            ("u8", "variant_a", EventKind::Custom),
        ] {
            events
                .append(NewEvent::new(subject, "exp", branch, kind))
                .await
                .unwrap();
        }
        events
            .append(NewEvent::new("u0", "other", "control", EventKind::Conversion))
            .await
            .unwrap();

        let report = StatsAggregator::new(&assignments, &events)
            .report("exp")
            .await
            .unwrap();

        assert_eq!(report.total_users, 10);
        assert_eq!(report.variant_distribution["control"], 6);
        assert_eq!(report.variant_distribution["variant_a"], 4);
        assert_eq!(report.event_count(EventKind::Conversion), 3);
        assert_eq!(report.event_count(EventKind::Impression), 2);
        assert_eq!(report.event_count(EventKind::Custom), 1);
        assert!((report.conversion_rate - 30.0).abs() < 1e-9);

        let control = report.branch("control").unwrap();
        assert_eq!(control.assigned, 6);
        assert_eq!(control.conversions, 1);
        let variant = report.branch("variant_a").unwrap();
        assert_eq!(variant.clicks, 1);
        assert!((variant.conversion_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_events_without_assignments_have_zero_rate() {
        let event = NewEvent::new("ghost", "exp", "variant_z", EventKind::Conversion)
            .into_event(uuid::Uuid::new_v4(), Utc::now());
        let report = StatisticsReport::from_records("exp", &[], &[event]);
        assert_eq!(report.total_users, 0);
        assert!(report.conversion_rate.abs() < f64::EPSILON);
        let branch = report.branch("variant_z").unwrap();
        assert_eq!(branch.conversions, 1);
        assert!(branch.conversion_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_json_uses_kind_names() {
        let event = NewEvent::new("u", "exp", "control", EventKind::Click)
            .into_event(uuid::Uuid::new_v4(), Utc::now());
        let report = StatisticsReport::from_records("exp", &[], &[event]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["events_by_type"]["click"], 1);
    }
}
