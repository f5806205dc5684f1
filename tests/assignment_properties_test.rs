//! Behavioural properties of assignment, events and statistics
//!
//! Each test drives the public API only.

use std::collections::HashMap;
use std::sync::Arc;

use trueno_ab::assignment::{AssignmentStore, MemoryAssignmentStore, SubjectContext};
use trueno_ab::bucketing::{assign, is_control_branch, AllocationTable, Bucketer};
use trueno_ab::config::BucketingConfig;
use trueno_ab::event::{EventKind, NewEvent};
use trueno_ab::partition::{MemoryPartitionProvider, Partition};
use trueno_ab::service::{Correlation, ExperimentService};

fn banner_table() -> AllocationTable {
    AllocationTable::from_pairs([("control", 50.0), ("variant_a", 30.0), ("variant_b", 20.0)])
        .unwrap()
}

fn service_with(partition: Partition) -> ExperimentService {
    ExperimentService::builder()
        .partitions(MemoryPartitionProvider::from_partitions([partition]))
        .build()
}

// =============================================================================
// Bucketing
// =============================================================================

#[test]
fn test_assign_is_deterministic() {
    let table = banner_table();
    for i in 0..500 {
        let subject = format!("subject-{i}");
        let first = assign(&subject, "exp", &table, "salt", "seed").unwrap();
        for _ in 0..3 {
            assert_eq!(assign(&subject, "exp", &table, "salt", "seed").unwrap(), first);
        }
    }
}

#[test]
fn test_assign_coverage_matches_weights() {
    let table = banner_table();
    let bucketer = Bucketer::default();
    let samples = 100_000;
    let mut counts: HashMap<&str, u32> = HashMap::new();

    for i in 0..samples {
        let branch = bucketer
            .assign(&format!("user-{i}"), "homepage_banner", &table)
            .unwrap();
        *counts.entry(branch).or_insert(0) += 1;
    }

    for (branch, weight) in [("control", 50.0), ("variant_a", 30.0), ("variant_b", 20.0)] {
        let observed = f64::from(counts[branch]) / f64::from(samples) * 100.0;
        assert!(
            (observed - weight).abs() <= 2.0,
            "{branch}: observed {observed:.2}%, configured {weight}%"
        );
    }
}

#[test]
fn test_under_allocated_single_branch_takes_everyone() {
    let table = AllocationTable::from_pairs([("only_branch", 60.0)]).unwrap();
    for i in 0..2_000 {
        let branch = assign(&format!("user-{i}"), "exp", &table, "salt", "seed").unwrap();
        assert_eq!(branch, "only_branch");
    }
}

#[test]
fn test_under_allocated_table_biases_last_branch() {
    // 40 + 20 = 60: values above 60 fall through to "b", so "b" ends up with
    // roughly 60% of subjects instead of 20%.
    let table = AllocationTable::from_pairs([("a", 40.0), ("b", 20.0)]).unwrap();
    let b_count = (0..10_000)
        .filter(|i| assign(&format!("user-{i}"), "exp", &table, "salt", "seed").unwrap() == "b")
        .count();
    assert!(b_count > 5_000, "expected fallback bias, got {b_count}");
}

#[test]
fn test_changing_seed_reassigns_population() {
    let table = banner_table();
    let moved = (0..1_000)
        .filter(|i| {
            let subject = format!("user-{i}");
            assign(&subject, "exp", &table, "salt", "seed-1").unwrap()
                != assign(&subject, "exp", &table, "salt", "seed-2").unwrap()
        })
        .count();
    assert!(moved > 100);
}

#[test]
fn test_control_classification() {
    for name in ["Control", "BASELINE", "original"] {
        assert!(is_control_branch(name), "{name} should be control");
    }
    assert!(!is_control_branch("variant_a"));
}

// =============================================================================
// Assignment store
// =============================================================================

#[tokio::test]
async fn test_idempotent_get_or_assign() {
    let store = MemoryAssignmentStore::new();
    let bucketer = Bucketer::new(BucketingConfig::new("k", "s"), Default::default());
    let table = banner_table();

    let first = store
        .get_or_assign(&bucketer, "u", "exp", &table, SubjectContext::default())
        .await
        .unwrap();
    let second = store
        .get_or_assign(&bucketer, "u", "exp", &table, SubjectContext::default())
        .await
        .unwrap();

    assert!(first.is_first);
    assert!(!second.is_first);
    assert_eq!(first.branch(), second.branch());
    assert_eq!(first.assigned_at(), second.assigned_at());
    assert_eq!(store.get("u", "exp").await.unwrap(), Some(first.assignment));
}

#[tokio::test]
async fn test_stable_under_reallocation() {
    let store = MemoryAssignmentStore::new();
    let bucketer = Bucketer::default();
    let original = banner_table();
    let reversed =
        AllocationTable::from_pairs([("variant_b", 20.0), ("variant_a", 30.0), ("control", 50.0)])
            .unwrap();

    let mut before = Vec::new();
    for i in 0..200 {
        let outcome = store
            .get_or_assign(&bucketer, &format!("u{i}"), "exp", &original, SubjectContext::default())
            .await
            .unwrap();
        before.push(outcome.branch().to_string());
    }
    for (i, expected) in before.iter().enumerate() {
        let outcome = store
            .get_or_assign(&bucketer, &format!("u{i}"), "exp", &reversed, SubjectContext::default())
            .await
            .unwrap();
        assert_eq!(outcome.branch(), expected);
        assert!(!outcome.is_first);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_first_requests_single_winner() {
    let service = Arc::new(service_with(Partition::homepage_banner()));
    let mut handles = vec![];

    for _ in 0..100 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .request_assignment("racer", "homepage_banner", SubjectContext::default())
                .await
                .unwrap()
        }));
    }

    let mut results = vec![];
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert_eq!(service.assignments().len(), 1);
    assert_eq!(results.iter().filter(|r| r.is_first).count(), 1);
    assert!(results
        .iter()
        .all(|r| r.branch == results[0].branch && r.assigned_at == results[0].assigned_at));
}

// =============================================================================
// Statistics
// =============================================================================

#[tokio::test]
async fn test_conversion_rate_thirty_percent() {
    let service = service_with(Partition::homepage_banner());
    let mut branches = vec![];
    for i in 0..10 {
        let result = service
            .request_assignment(&format!("user-{i}"), "homepage_banner", SubjectContext::default())
            .await
            .unwrap();
        branches.push(result.branch);
    }
    for (i, branch) in branches.iter().enumerate().take(3) {
        service
            .record_event(NewEvent::new(
                format!("user-{i}"),
                "homepage_banner",
                branch.as_str(),
                EventKind::Conversion,
            ))
            .await
            .unwrap();
    }

    let report = service.get_partition_stats("homepage_banner").await.unwrap();
    assert_eq!(report.total_users, 10);
    assert_eq!(report.variant_distribution.values().sum::<u64>(), 10);
    assert_eq!(report.event_count(EventKind::Conversion), 3);
    assert!((report.conversion_rate - 30.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_conversion_rate_zero_users_is_zero() {
    let service = service_with(Partition::homepage_banner());
    service
        .track_conversion(
            "ghost",
            "homepage_banner",
            "control",
            Correlation::default(),
            Default::default(),
        )
        .await
        .unwrap();

    let report = service.get_partition_stats("homepage_banner").await.unwrap();
    assert_eq!(report.total_users, 0);
    assert_eq!(report.event_count(EventKind::Conversion), 1);
    assert!(report.conversion_rate.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_report_reflects_latest_writes() {
    let service = service_with(Partition::homepage_banner());
    let empty = service.get_partition_stats("homepage_banner").await.unwrap();
    assert_eq!(empty.total_users, 0);

    service
        .request_assignment("u1", "homepage_banner", SubjectContext::default())
        .await
        .unwrap();
    let after = service.get_partition_stats("homepage_banner").await.unwrap();
    assert_eq!(after.total_users, 1);
}

#[tokio::test]
async fn test_list_events_newest_first_default_limit() {
    let service = service_with(Partition::homepage_banner());
    for i in 0..120 {
        service
            .track_impression(&format!("u{i}"), "homepage_banner", "control", Correlation::default())
            .await
            .unwrap();
    }
    let events = service.list_events("homepage_banner", None).await.unwrap();
    assert_eq!(events.len(), 100);
    assert_eq!(events[0].subject_id(), "u119");
    assert!(events
        .windows(2)
        .all(|w| w[0].recorded_at() >= w[1].recorded_at()));

    let few = service.list_events("homepage_banner", Some(5)).await.unwrap();
    assert_eq!(few.len(), 5);
}
