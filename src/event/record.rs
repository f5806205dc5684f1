//! Event Record - immutable interaction linked to a partition and branch

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assignment::SubjectContext;
use crate::error::{require_non_empty, Error, Result};

/// Free-form event metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Kind of recorded interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The treatment was shown.
    Impression,
    /// The subject clicked.
    Click,
    /// The subject converted.
    Conversion,
    /// Anything else; describe it in the metadata.
    Custom,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 4] = [Self::Impression, Self::Click, Self::Conversion, Self::Custom];

    /// Get the kind name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Impression => "impression",
            Self::Click => "click",
            Self::Conversion => "conversion",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unrecognized event kind '{s}'")))
    }
}

/// An event submitted for recording, before it receives an ID and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    subject_id: String,
    partition_id: String,
    branch: String,
    kind: EventKind,
    campaign_id: Option<String>,
    ad_id: Option<String>,
    context: SubjectContext,
    metadata: Metadata,
}

impl NewEvent {
    /// Create an event with required fields only.
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        partition_id: impl Into<String>,
        branch: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            partition_id: partition_id.into(),
            branch: branch.into(),
            kind,
            campaign_id: None,
            ad_id: None,
            context: SubjectContext::default(),
            metadata: Metadata::new(),
        }
    }

    /// Set the campaign correlation ID.
    #[must_use]
    pub fn campaign_id(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    /// Set the ad correlation ID.
    #[must_use]
    pub fn ad_id(mut self, ad_id: impl Into<String>) -> Self {
        self.ad_id = Some(ad_id.into());
        self
    }

    /// Set the subject context.
    #[must_use]
    pub fn context(mut self, context: SubjectContext) -> Self {
        self.context = context;
        self
    }

    /// Set the metadata bag.
    #[must_use]
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Get the partition ID.
    #[must_use]
    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    /// Get the event kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Check required identifiers are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the subject, partition or branch is empty.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("subject_id", &self.subject_id)?;
        require_non_empty("partition_id", &self.partition_id)?;
        require_non_empty("branch", &self.branch)
    }

    /// Stamp with an ID and timestamp.
    #[must_use]
    pub fn into_event(self, event_id: Uuid, recorded_at: DateTime<Utc>) -> Event {
        Event {
            event_id,
            subject_id: self.subject_id,
            partition_id: self.partition_id,
            branch: self.branch,
            kind: self.kind,
            campaign_id: self.campaign_id,
            ad_id: self.ad_id,
            context: self.context,
            metadata: self.metadata,
            recorded_at,
        }
    }
}

/// A recorded event. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    event_id: Uuid,
    subject_id: String,
    partition_id: String,
    branch: String,
    kind: EventKind,
    campaign_id: Option<String>,
    ad_id: Option<String>,
    context: SubjectContext,
    metadata: Metadata,
    recorded_at: DateTime<Utc>,
}

impl Event {
    /// Get the event ID.
    #[must_use]
    pub const fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Get the subject ID.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Get the partition ID.
    #[must_use]
    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    /// Get the branch the subject was in.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Get the event kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Get the campaign correlation ID, if any.
    #[must_use]
    pub fn campaign_id(&self) -> Option<&str> {
        self.campaign_id.as_deref()
    }

    /// Get the ad correlation ID, if any.
    #[must_use]
    pub fn ad_id(&self) -> Option<&str> {
        self.ad_id.as_deref()
    }

    /// Get the subject context.
    #[must_use]
    pub const fn context(&self) -> &SubjectContext {
        &self.context
    }

    /// Get the metadata bag.
    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Get the server-assigned timestamp.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
