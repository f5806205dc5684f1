//! A/B Walkthrough Example
//!
//! Seeds the demo experiment, assigns a cohort, records events and prints
//! the resulting statistics.
//!
//! Run with: RUST_LOG=trueno_ab=debug cargo run --example ab_walkthrough

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use trueno_ab::assignment::{DeviceClass, SubjectContext};
use trueno_ab::config::BucketingConfig;
use trueno_ab::event::Metadata;
use trueno_ab::partition::{MemoryPartitionProvider, PartitionStatus};
use trueno_ab::service::{Correlation, ExperimentService};

const PARTITION: &str = "homepage_banner";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Trueno-AB Walkthrough ===\n");

    let service = ExperimentService::builder()
        .config(BucketingConfig::from_env())
        .partitions(MemoryPartitionProvider::seeded())
        .build();

    // -------------------------------------------------------------------------
    // 1. Inspect the experiment
    // -------------------------------------------------------------------------
    let partition = service.get_partition(PARTITION).await?;
    println!("1. Experiment: {} ({})", partition.name(), partition.status());
    for entry in partition.allocations().entries() {
        println!("   {:<10} {:>5.1}%", entry.branch, entry.weight);
    }

    // -------------------------------------------------------------------------
    // 2. Assign a cohort and simulate a funnel
    // -------------------------------------------------------------------------
    println!("\n2. Assigning 1000 users...");
    for i in 0..1_000 {
        let subject = format!("user-{i}");
        let context = SubjectContext::device(if i % 3 == 0 {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        });
        let assigned = service
            .request_assignment(&subject, PARTITION, context)
            .await
            .with_context(|| format!("assigning {subject}"))?;

        let correlation = Correlation::new("spring_campaign", "banner_001");
        service
            .track_impression(&subject, PARTITION, &assigned.branch, correlation.clone())
            .await?;
        if i % 4 == 0 {
            service
                .track_click(&subject, PARTITION, &assigned.branch, correlation.clone())
                .await?;
        }
        if i % 10 == 0 {
            let mut metadata = Metadata::new();
            metadata.insert("order_value".to_string(), serde_json::json!(42.5));
            service
                .track_conversion(&subject, PARTITION, &assigned.branch, correlation, metadata)
                .await?;
        }
    }

    // -------------------------------------------------------------------------
    // 3. Repeat requests are stable
    // -------------------------------------------------------------------------
    let first = service
        .request_assignment("user-7", PARTITION, SubjectContext::default())
        .await?;
    println!(
        "\n3. user-7 -> {} (control: {}, first: {})",
        first.branch, first.is_control, first.is_first
    );

    // -------------------------------------------------------------------------
    // 4. Statistics
    // -------------------------------------------------------------------------
    let report = service.get_partition_stats(PARTITION).await?;
    println!("\n4. Report");
    println!("{}", serde_json::to_string_pretty(&report)?);

    // -------------------------------------------------------------------------
    // 5. Kill switch
    // -------------------------------------------------------------------------
    service
        .set_partition_status(PARTITION, PartitionStatus::Paused)
        .await?;
    match service
        .request_assignment("newcomer", PARTITION, SubjectContext::default())
        .await
    {
        Ok(result) => println!("\n5. Unexpected assignment: {}", result.branch),
        Err(err) => println!("\n5. Paused experiment refused newcomer: {err}"),
    }

    Ok(())
}
