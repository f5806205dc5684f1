//! Error types for Trueno-AB
//!
//! Each variant is a distinct signal a caller can branch on. Messages are for
//! humans; callers should match on [`Error::kind`] instead of the text.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-AB error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Referenced partition does not exist
    #[error("Partition not found: {0}")]
    NotFound(String),

    /// Partition exists but cannot serve the request in its current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Empty or malformed identifiers, allocation tables, or event kinds
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected storage fault. The detail is kept for logging only.
    #[error("Internal storage failure")]
    Internal(String),
}

/// Fieldless discriminant of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::InvalidState`]
    InvalidState,
    /// See [`Error::InvalidInput`]
    InvalidInput,
    /// See [`Error::Internal`]
    Internal,
}

impl Error {
    /// Get the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Internal detail for logs. `None` for non-internal errors.
    #[must_use]
    pub fn internal_detail(&self) -> Option<&str> {
        match self {
            Self::Internal(detail) => Some(detail),
            _ => None,
        }
    }
}

/// Reject an empty identifier with [`Error::InvalidInput`].
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}
