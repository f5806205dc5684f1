//! Experiment service
//!
//! Orchestrates the inbound operations: partition lookup and status checks
//! happen here, before the bucketing engine or any store is touched. Storage
//! is injected through the [`PartitionProvider`], [`AssignmentStore`] and
//! [`EventLog`] traits; the builder defaults to the in-memory implementations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::assignment::{AssignmentStore, MemoryAssignmentStore, SubjectContext};
use crate::bucketing::{is_control_branch, Bucketer};
use crate::config::{AllocationPolicy, BucketingConfig};
use crate::error::{require_non_empty, Error, Result};
use crate::event::{Event, EventKind, EventLog, MemoryEventLog, Metadata, NewEvent};
use crate::partition::{MemoryPartitionProvider, Partition, PartitionProvider, PartitionStatus};
use crate::stats::{StatisticsReport, StatsAggregator};

/// Event listing limit used when the caller does not give one.
pub const DEFAULT_EVENT_LIMIT: usize = 100;

/// Response to an assignment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentResult {
    /// Subject that was assigned
    pub subject_id: String,
    /// Partition the assignment belongs to
    pub partition_id: String,
    /// Assigned branch
    pub branch: String,
    /// When the assignment was first recorded
    pub assigned_at: DateTime<Utc>,
    /// Whether the branch is a control group
    pub is_control: bool,
    /// Whether this request created the assignment
    pub is_first: bool,
}

/// Optional correlation IDs attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    /// Campaign identifier
    pub campaign_id: Option<String>,
    /// Ad identifier
    pub ad_id: Option<String>,
}

impl Correlation {
    /// Correlation with both IDs set.
    #[must_use]
    pub fn new(campaign_id: impl Into<String>, ad_id: impl Into<String>) -> Self {
        Self {
            campaign_id: Some(campaign_id.into()),
            ad_id: Some(ad_id.into()),
        }
    }
}

fn log_failure<'a>(
    operation: &'static str,
    partition_id: &'a str,
) -> impl Fn(Error) -> Error + 'a {
    move |err| {
        match &err {
            Error::Internal(detail) => {
                error!(operation, partition_id, detail = %detail, "storage failure");
            }
            other => warn!(operation, partition_id, error = %other, "request rejected"),
        }
        err
    }
}

/// A/B experiment service.
#[derive(Debug)]
pub struct ExperimentService<
    P = MemoryPartitionProvider,
    A = MemoryAssignmentStore,
    E = MemoryEventLog,
> {
    bucketer: Bucketer,
    partitions: P,
    assignments: A,
    events: E,
}

impl ExperimentService {
    /// Create a builder with in-memory storage and default configuration.
    #[must_use]
    pub fn builder() -> ExperimentServiceBuilder {
        ExperimentServiceBuilder::default()
    }
}

impl<P, A, E> ExperimentService<P, A, E>
where
    P: PartitionProvider,
    A: AssignmentStore,
    E: EventLog,
{
    /// Get the bucketing engine.
    #[must_use]
    pub const fn bucketer(&self) -> &Bucketer {
        &self.bucketer
    }

    /// Get the partition provider.
    #[must_use]
    pub const fn partitions(&self) -> &P {
        &self.partitions
    }

    /// Get the assignment store.
    #[must_use]
    pub const fn assignments(&self) -> &A {
        &self.assignments
    }

    /// Get the event log.
    #[must_use]
    pub const fn events(&self) -> &E {
        &self.events
    }

    async fn require_partition(&self, partition_id: &str) -> Result<Partition> {
        require_non_empty("partition_id", partition_id)?;
        self.partitions
            .get_partition(partition_id)
            .await?
            .ok_or_else(|| Error::NotFound(partition_id.to_string()))
    }

    /// Assign a subject to a branch of a partition.
    ///
    /// An existing assignment is returned unchanged, even if the partition has
    /// since been paused or its allocation table changed.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for empty IDs or a table rejected by the policy
    /// - `NotFound` if the partition does not exist
    /// - `InvalidState` if a new assignment is needed and the partition is not active
    pub async fn request_assignment(
        &self,
        subject_id: &str,
        partition_id: &str,
        context: SubjectContext,
    ) -> Result<AssignmentResult> {
        let fail = log_failure("request_assignment", partition_id);
        require_non_empty("subject_id", subject_id).map_err(&fail)?;
        let partition = self.require_partition(partition_id).await.map_err(&fail)?;

        let existing = self
            .assignments
            .get(subject_id, partition_id)
            .await
            .map_err(&fail)?;
        if existing.is_none() && !partition.is_active() {
            return Err(fail(Error::InvalidState(format!(
                "partition '{partition_id}' is {}",
                partition.status()
            ))));
        }

        let outcome = self
            .assignments
            .get_or_assign(
                &self.bucketer,
                subject_id,
                partition_id,
                partition.allocations(),
                context,
            )
            .await
            .map_err(&fail)?;

        let branch = outcome.branch().to_string();
        if outcome.is_first {
            info!(subject_id, partition_id, branch = %branch, "assigned subject");
        } else {
            debug!(subject_id, partition_id, branch = %branch, "returning existing assignment");
        }

        Ok(AssignmentResult {
            subject_id: subject_id.to_string(),
            partition_id: partition_id.to_string(),
            is_control: is_control_branch(&branch),
            assigned_at: outcome.assigned_at(),
            is_first: outcome.is_first,
            branch,
        })
    }

    /// Record an event against an existing partition.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for empty subject, partition or branch
    /// - `NotFound` if the partition does not exist
    pub async fn record_event(&self, event: NewEvent) -> Result<Event> {
        let partition_id = event.partition_id().to_string();
        let fail = log_failure("record_event", &partition_id);
        event.validate().map_err(&fail)?;
        self.require_partition(&partition_id).await.map_err(&fail)?;

        let event = self.events.append(event).await.map_err(&fail)?;
        info!(
            partition_id = %partition_id,
            event_id = %event.event_id(),
            branch = event.branch(),
            kind = %event.kind(),
            "recorded event"
        );
        Ok(event)
    }

    /// Record an event whose kind arrives as a string.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an unrecognized kind, plus everything
    /// [`record_event`](Self::record_event) returns.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_named_event(
        &self,
        subject_id: &str,
        partition_id: &str,
        branch: &str,
        kind: &str,
        correlation: Correlation,
        context: SubjectContext,
        metadata: Metadata,
    ) -> Result<Event> {
        let kind: EventKind = kind
            .parse()
            .map_err(log_failure("record_event", partition_id))?;
        let event = with_correlation(
            NewEvent::new(subject_id, partition_id, branch, kind)
                .context(context)
                .metadata(metadata),
            correlation,
        );
        self.record_event(event).await
    }

    async fn track(
        &self,
        kind: EventKind,
        subject_id: &str,
        partition_id: &str,
        branch: &str,
        correlation: Correlation,
        metadata: Metadata,
    ) -> Result<Event> {
        let event = NewEvent::new(subject_id, partition_id, branch, kind).metadata(metadata);
        self.record_event(with_correlation(event, correlation)).await
    }

    /// Record an impression.
    ///
    /// # Errors
    ///
    /// See [`record_event`](Self::record_event).
    pub async fn track_impression(
        &self,
        subject_id: &str,
        partition_id: &str,
        branch: &str,
        correlation: Correlation,
    ) -> Result<Event> {
        self.track(
            EventKind::Impression,
            subject_id,
            partition_id,
            branch,
            correlation,
            Metadata::new(),
        )
        .await
    }

    /// Record a click.
    ///
    /// # Errors
    ///
    /// See [`record_event`](Self::record_event).
    pub async fn track_click(
        &self,
        subject_id: &str,
        partition_id: &str,
        branch: &str,
        correlation: Correlation,
    ) -> Result<Event> {
        self.track(
            EventKind::Click,
            subject_id,
            partition_id,
            branch,
            correlation,
            Metadata::new(),
        )
        .await
    }

    /// Record a conversion, optionally with metadata such as order value.
    ///
    /// # Errors
    ///
    /// See [`record_event`](Self::record_event).
    pub async fn track_conversion(
        &self,
        subject_id: &str,
        partition_id: &str,
        branch: &str,
        correlation: Correlation,
        metadata: Metadata,
    ) -> Result<Event> {
        self.track(
            EventKind::Conversion,
            subject_id,
            partition_id,
            branch,
            correlation,
            metadata,
        )
        .await
    }

    /// Get a partition's configuration.
    ///
    /// # Errors
    ///
    /// `NotFound` if the partition does not exist.
    pub async fn get_partition(&self, partition_id: &str) -> Result<Partition> {
        self.require_partition(partition_id)
            .await
            .map_err(log_failure("get_partition", partition_id))
    }

    /// Compute fresh statistics for a partition.
    ///
    /// # Errors
    ///
    /// `NotFound` if the partition does not exist.
    pub async fn get_partition_stats(&self, partition_id: &str) -> Result<StatisticsReport> {
        let fail = log_failure("get_partition_stats", partition_id);
        self.require_partition(partition_id).await.map_err(&fail)?;
        StatsAggregator::new(&self.assignments, &self.events)
            .report(partition_id)
            .await
            .map_err(&fail)
    }

    /// IDs of all partitions, sorted.
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub async fn list_partitions(&self) -> Result<Vec<String>> {
        self.partitions
            .list_partitions()
            .await
            .map_err(log_failure("list_partitions", ""))
    }

    /// Most recent events for a partition, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_EVENT_LIMIT`].
    ///
    /// # Errors
    ///
    /// `NotFound` if the partition does not exist.
    pub async fn list_events(
        &self,
        partition_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Event>> {
        let fail = log_failure("list_events", partition_id);
        self.require_partition(partition_id).await.map_err(&fail)?;
        self.events
            .list(partition_id, limit.unwrap_or(DEFAULT_EVENT_LIMIT), true)
            .await
            .map_err(&fail)
    }

    /// Register a new partition.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the ID is empty or taken, the schedule ends before it
    /// starts, or the allocation policy rejects the table.
    pub async fn register_partition(&self, partition: Partition) -> Result<()> {
        let partition_id = partition.partition_id().to_string();
        let fail = log_failure("register_partition", &partition_id);
        partition.validate().map_err(&fail)?;
        self.bucketer
            .check(partition.allocations())
            .map_err(&fail)?;
        self.partitions
            .put_partition(partition)
            .await
            .map_err(&fail)?;
        info!(partition_id = %partition_id, "registered partition");
        Ok(())
    }

    /// Change a partition's status (e.g. pause it as a kill switch).
    ///
    /// Existing assignments are still served while paused; only new
    /// assignments are refused.
    ///
    /// # Errors
    ///
    /// `NotFound` if the partition does not exist.
    pub async fn set_partition_status(
        &self,
        partition_id: &str,
        status: PartitionStatus,
    ) -> Result<Partition> {
        let fail = log_failure("set_partition_status", partition_id);
        require_non_empty("partition_id", partition_id).map_err(&fail)?;
        let partition = self
            .partitions
            .set_status(partition_id, status)
            .await
            .map_err(&fail)?;
        info!(partition_id, status = %status, "partition status changed");
        Ok(partition)
    }
}

fn with_correlation(mut event: NewEvent, correlation: Correlation) -> NewEvent {
    if let Some(campaign_id) = correlation.campaign_id {
        event = event.campaign_id(campaign_id);
    }
    if let Some(ad_id) = correlation.ad_id {
        event = event.ad_id(ad_id);
    }
    event
}

/// Builder for `ExperimentService`.
#[derive(Debug)]
pub struct ExperimentServiceBuilder<
    P = MemoryPartitionProvider,
    A = MemoryAssignmentStore,
    E = MemoryEventLog,
> {
    config: BucketingConfig,
    policy: AllocationPolicy,
    partitions: P,
    assignments: A,
    events: E,
}

impl Default for ExperimentServiceBuilder {
    fn default() -> Self {
        Self {
            config: BucketingConfig::default(),
            policy: AllocationPolicy::default(),
            partitions: MemoryPartitionProvider::new(),
            assignments: MemoryAssignmentStore::new(),
            events: MemoryEventLog::new(),
        }
    }
}

impl<P, A, E> ExperimentServiceBuilder<P, A, E> {
    /// Set the salt and seed.
    #[must_use]
    pub fn config(mut self, config: BucketingConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the allocation policy.
    #[must_use]
    pub fn policy(mut self, policy: AllocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a different partition provider.
    #[must_use]
    pub fn partitions<P2: PartitionProvider>(
        self,
        partitions: P2,
    ) -> ExperimentServiceBuilder<P2, A, E> {
        ExperimentServiceBuilder {
            config: self.config,
            policy: self.policy,
            partitions,
            assignments: self.assignments,
            events: self.events,
        }
    }

    /// Use a different assignment store.
    #[must_use]
    pub fn assignments<A2: AssignmentStore>(
        self,
        assignments: A2,
    ) -> ExperimentServiceBuilder<P, A2, E> {
        ExperimentServiceBuilder {
            config: self.config,
            policy: self.policy,
            partitions: self.partitions,
            assignments,
            events: self.events,
        }
    }

    /// Use a different event log.
    #[must_use]
    pub fn events<E2: EventLog>(self, events: E2) -> ExperimentServiceBuilder<P, A, E2> {
        ExperimentServiceBuilder {
            config: self.config,
            policy: self.policy,
            partitions: self.partitions,
            assignments: self.assignments,
            events,
        }
    }

    /// Build the service.
    #[must_use]
    pub fn build(self) -> ExperimentService<P, A, E> {
        ExperimentService {
            bucketer: Bucketer::new(self.config, self.policy),
            partitions: self.partitions,
            assignments: self.assignments,
            events: self.events,
        }
    }
}
