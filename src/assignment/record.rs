//! Assignment Record - one-time binding of a subject to a branch

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bucketing::is_control_branch;
use crate::error::{Error, Result};

/// Coarse device class reported by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Phone-sized screens.
    Mobile,
    /// Desktop browsers.
    Desktop,
    /// Tablets.
    Tablet,
}

impl DeviceClass {
    /// Get the device class name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Desktop => "desktop",
            Self::Tablet => "tablet",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mobile" => Ok(Self::Mobile),
            "desktop" => Ok(Self::Desktop),
            "tablet" => Ok(Self::Tablet),
            other => Err(Error::InvalidInput(format!("unknown device class '{other}'"))),
        }
    }
}

/// Optional information about the subject at request time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectContext {
    /// Device class, if reported.
    pub device: Option<DeviceClass>,
    /// Coarse location (e.g. a country code), if reported.
    pub location: Option<String>,
}

impl SubjectContext {
    /// Context with only a device class.
    #[must_use]
    pub const fn device(device: DeviceClass) -> Self {
        Self {
            device: Some(device),
            location: None,
        }
    }

    /// Set the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Assignment of one subject to one branch of one partition.
///
/// At most one exists per `(subject_id, partition_id)`; once stored it never
/// changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    subject_id: String,
    partition_id: String,
    branch: String,
    assigned_at: DateTime<Utc>,
    context: SubjectContext,
}

impl Assignment {
    /// Create an assignment stamped with the current time.
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        partition_id: impl Into<String>,
        branch: impl Into<String>,
        context: SubjectContext,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            partition_id: partition_id.into(),
            branch: branch.into(),
            assigned_at: Utc::now(),
            context,
        }
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

    /// Get the assigned branch.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Get the assignment timestamp.
    #[must_use]
    pub const fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    /// Get the subject context captured at assignment time.
    #[must_use]
    pub const fn context(&self) -> &SubjectContext {
        &self.context
    }

    /// Whether the assigned branch is a control group.
    #[must_use]
    pub fn is_control(&self) -> bool {
        is_control_branch(&self.branch)
    }
}

/// Result of a get-or-assign call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    /// The stored assignment (existing or newly created).
    pub assignment: Assignment,
    /// `true` only for the call that created the assignment.
    pub is_first: bool,
}

impl AssignmentOutcome {
    /// Get the assigned branch.
    #[must_use]
    pub fn branch(&self) -> &str {
        self.assignment.branch()
    }

    /// Get the assignment timestamp.
    #[must_use]
    pub const fn assigned_at(&self) -> DateTime<Utc> {
        self.assignment.assigned_at()
    }
}
