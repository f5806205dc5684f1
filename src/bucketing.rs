//! Deterministic hash-to-bucket assignment
//!
//! A subject lands in a branch by:
//!
//! 1. HMAC-SHA256 over `subject_id:partition_id:seed`, keyed by the salt
//! 2. Taking the first 32 bits of the digest (the first 8 hex characters)
//! 3. Reducing modulo 10 000 and dividing by 100, giving a value in `[0, 100)`
//! 4. Walking the allocation table in order and picking the first branch whose
//!    cumulative weight is `>=` that value
//!
//! If the weights total less than the computed value, the last branch wins.
//! [`AllocationPolicy::Strict`] rejects such tables up front instead.
//!
//! Everything here is pure: no I/O and no shared state.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::{
    AllocationPolicy, BucketingConfig, MAX_ALLOCATION_TOTAL, MIN_ALLOCATION_TOTAL,
};
use crate::error::{require_non_empty, Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Number of discrete buckets the hash is reduced to.
pub const BUCKET_COUNT: u32 = 10_000;

/// Branch names treated as the control group (case-insensitive).
pub const CONTROL_BRANCHES: [&str; 3] = ["control", "original", "baseline"];

/// A single branch and its percentage weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Branch name
    pub branch: String,
    /// Percentage weight in `(0, 100]`
    pub weight: f64,
}

/// Ordered list of branches and their weights.
///
/// Order matters: boundary values go to whichever branch is listed first, so
/// this is a list and not a map. Weights need not total exactly 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Allocation>", into = "Vec<Allocation>")]
pub struct AllocationTable {
    entries: Vec<Allocation>,
}

impl AllocationTable {
    /// Build a table from `(branch, weight)` pairs, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the table is empty, a branch name is
    /// empty or repeated, or a weight is outside `(0, 100]`.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let entries: Vec<Allocation> = pairs
            .into_iter()
            .map(|(branch, weight)| Allocation {
                branch: branch.into(),
                weight,
            })
            .collect();
        Self::try_from(entries)
    }

    /// Wrap entries already known to be valid.
    pub(crate) const fn from_entries_unchecked(entries: Vec<Allocation>) -> Self {
        Self { entries }
    }

    /// Branches in table order.
    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|a| a.branch.as_str())
    }

    /// Entries in table order.
    #[must_use]
    pub fn entries(&self) -> &[Allocation] {
        &self.entries
    }

    /// Weight of a branch, if present.
    #[must_use]
    pub fn weight(&self, branch: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|a| a.branch == branch)
            .map(|a| a.weight)
    }

    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|a| a.weight).sum()
    }

    /// Number of branches. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; an empty table cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick the branch for a bucket value in `[0, 100)`.
    #[must_use]
    pub fn select(&self, value: f64) -> &str {
        let mut cumulative = 0.0;
        for allocation in &self.entries {
            cumulative += allocation.weight;
            if value <= cumulative {
                return &allocation.branch;
            }
        }
        // Under-allocated table: fall through to the last branch.
        self.entries
            .last()
            .map_or("control", |a| a.branch.as_str())
    }
}

impl TryFrom<Vec<Allocation>> for AllocationTable {
    type Error = Error;

    fn try_from(entries: Vec<Allocation>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::InvalidInput(
                "allocation table must contain at least one branch".to_string(),
            ));
        }
        for (i, allocation) in entries.iter().enumerate() {
            require_non_empty("branch name", &allocation.branch)?;
            if !(allocation.weight > 0.0 && allocation.weight <= 100.0) {
                return Err(Error::InvalidInput(format!(
                    "weight for branch '{}' must be in (0, 100], got {}",
                    allocation.branch, allocation.weight
                )));
            }
            if entries[..i].iter().any(|a| a.branch == allocation.branch) {
                return Err(Error::InvalidInput(format!(
                    "duplicate branch '{}' in allocation table",
                    allocation.branch
                )));
            }
        }
        Ok(Self { entries })
    }
}

impl From<AllocationTable> for Vec<Allocation> {
    fn from(table: AllocationTable) -> Self {
        table.entries
    }
}

/// Compute the bucket value in `[0, 100)` for a subject within a partition.
///
/// # Errors
///
/// Returns [`Error::Internal`] if the HMAC cannot be keyed (not reachable
/// with HMAC-SHA256, which accepts keys of any length).
pub fn bucket_value(subject_id: &str, partition_id: &str, salt: &str, seed: &str) -> Result<f64> {
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes())
        .map_err(|e| Error::Internal(format!("HMAC key rejected: {e}")))?;
    mac.update(subject_id.as_bytes());
    mac.update(b":");
    mac.update(partition_id.as_bytes());
    mac.update(b":");
    mac.update(seed.as_bytes());
    let digest = mac.finalize().into_bytes();

    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    Ok(f64::from(prefix % BUCKET_COUNT) / 100.0)
}

/// Assign a subject to a branch of `table`.
///
/// Same inputs always give the same branch.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `subject_id` or `partition_id` is empty.
pub fn assign<'t>(
    subject_id: &str,
    partition_id: &str,
    table: &'t AllocationTable,
    salt: &str,
    seed: &str,
) -> Result<&'t str> {
    require_non_empty("subject_id", subject_id)?;
    require_non_empty("partition_id", partition_id)?;
    let value = bucket_value(subject_id, partition_id, salt, seed)?;
    Ok(table.select(value))
}

/// Whether a table's weights total roughly 100.
#[must_use]
pub fn validate_allocation(table: &AllocationTable) -> bool {
    let total = table.total();
    !table.is_empty() && (MIN_ALLOCATION_TOTAL..=MAX_ALLOCATION_TOTAL).contains(&total)
}

/// Whether a branch name denotes the control group.
#[must_use]
pub fn is_control_branch(branch: &str) -> bool {
    CONTROL_BRANCHES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(branch))
}

/// Bucketing engine bound to a salt, seed and allocation policy.
#[derive(Debug, Clone, Default)]
pub struct Bucketer {
    config: BucketingConfig,
    policy: AllocationPolicy,
}

impl Bucketer {
    /// Create a bucketer with the given configuration and policy.
    #[must_use]
    pub const fn new(config: BucketingConfig, policy: AllocationPolicy) -> Self {
        Self { config, policy }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &BucketingConfig {
        &self.config
    }

    /// Get the allocation policy.
    #[must_use]
    pub const fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// Check a table against the policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] under [`AllocationPolicy::Strict`] when
    /// the weights do not total roughly 100.
    pub fn check(&self, table: &AllocationTable) -> Result<()> {
        if self.policy == AllocationPolicy::Strict && !validate_allocation(table) {
            return Err(Error::InvalidInput(format!(
                "allocation weights total {}, expected {MIN_ALLOCATION_TOTAL}..={MAX_ALLOCATION_TOTAL}",
                table.total()
            )));
        }
        Ok(())
    }

    /// Assign a subject to a branch of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for empty identifiers or when the
    /// policy rejects the table.
    pub fn assign<'t>(
        &self,
        subject_id: &str,
        partition_id: &str,
        table: &'t AllocationTable,
    ) -> Result<&'t str> {
        self.check(table)?;
        assign(
            subject_id,
            partition_id,
            table,
            self.config.salt(),
            self.config.seed(),
        )
    }
}
