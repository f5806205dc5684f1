//! # Trueno-AB: Deterministic Experiment Assignment
//!
//! Trueno-AB assigns each subject (user) to a stable branch of an experiment
//! (partition) and aggregates the resulting events into per-partition
//! statistics.
//!
//! ## Design Principles
//!
//! - **Determinism**: HMAC-SHA256 bucketing, so the same subject always lands in
//!   the same branch for a given salt and seed
//! - **Stability**: the first assignment for a `(subject, partition)` pair is
//!   stored and returned forever, even if the allocation table changes
//! - **Single winner**: racing first-time requests settle on one stored
//!   assignment
//! - **Swappable storage**: partitions, assignments and events sit behind traits
//!   with in-memory defaults
//!
//! ## Example Usage
//!
//! ```rust
//! use trueno_ab::assignment::SubjectContext;
//! use trueno_ab::partition::MemoryPartitionProvider;
//! use trueno_ab::service::{Correlation, ExperimentService};
//!
//! # async fn example() -> trueno_ab::Result<()> {
//! let service = ExperimentService::builder()
//!     .partitions(MemoryPartitionProvider::seeded())
//!     .build();
//!
//! let assigned = service
//!     .request_assignment("user-42", "homepage_banner", SubjectContext::default())
//!     .await?;
//! service
//!     .track_impression("user-42", "homepage_banner", &assigned.branch, Correlation::default())
//!     .await?;
//!
//! let report = service.get_partition_stats("homepage_banner").await?;
//! assert_eq!(report.total_users, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod assignment;
pub mod bucketing;
pub mod config;
pub mod error;
pub mod event;
pub mod partition;
pub mod service;
pub mod stats;

pub use error::{Error, ErrorKind, Result};
pub use service::{AssignmentResult, ExperimentService};
