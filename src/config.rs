//! Bucketing configuration
//!
//! The salt and seed feed every hash the bucketing engine computes. They must
//! stay fixed for the lifetime of a deployment: changing either one silently
//! reassigns the entire population.

/// Environment variable holding the HMAC key.
pub const SALT_ENV: &str = "HMAC_SALT";
/// Environment variable holding the hash seed.
pub const SEED_ENV: &str = "HASH_SEED";
/// Default HMAC key for non-production use.
pub const DEFAULT_SALT: &str = "default-salt";
/// Default hash seed for non-production use.
pub const DEFAULT_SEED: &str = "default-seed";

/// Inclusive lower bound on the allocation total under [`AllocationPolicy::Strict`].
pub const MIN_ALLOCATION_TOTAL: f64 = 99.9;
/// Inclusive upper bound on the allocation total under [`AllocationPolicy::Strict`].
pub const MAX_ALLOCATION_TOTAL: f64 = 100.1;

/// Salt and seed used by the bucketing engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketingConfig {
    salt: String,
    seed: String,
}

impl BucketingConfig {
    /// Create a config from an explicit salt and seed.
    #[must_use]
    pub fn new(salt: impl Into<String>, seed: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            seed: seed.into(),
        }
    }

    /// Load from `HMAC_SALT` / `HASH_SEED`, falling back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    ///
    /// Missing or empty values fall back to [`DEFAULT_SALT`] / [`DEFAULT_SEED`].
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let config = Self {
            salt: read(SALT_ENV, DEFAULT_SALT),
            seed: read(SEED_ENV, DEFAULT_SEED),
        };
        if config.is_default_salt() {
            tracing::warn!(
                env = SALT_ENV,
                "using default bucketing salt; set {SALT_ENV} in production"
            );
        }
        config
    }

    /// Get the HMAC key.
    #[must_use]
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Get the hash seed.
    #[must_use]
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Whether the salt is the non-production default.
    #[must_use]
    pub fn is_default_salt(&self) -> bool {
        self.salt == DEFAULT_SALT
    }
}

impl Default for BucketingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SALT, DEFAULT_SEED)
    }
}

/// How allocation tables whose weights do not total 100 are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationPolicy {
    /// Accept any non-empty table. Values beyond the last cumulative
    /// boundary land in the last branch.
    #[default]
    Lenient,
    /// Reject tables whose total falls outside
    /// [`MIN_ALLOCATION_TOTAL`]..=[`MAX_ALLOCATION_TOTAL`].
    Strict,
}
