//! Error taxonomy shared by every Undertow component.
//!
//! Callers only ever see one of these kinds; raw transport and parse errors are
//! converted at the boundary where they occur.

use thiserror::Error;

/// Errors surfaced by the lookup pipeline.
///
/// Variants carry string reasons so the type stays `Clone`: coalesced callers
/// all observe the same failure from a single computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Malformed identifier, query or parameter supplied by the caller.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// No matching catalog or provider entity exists.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Non-success status or transport failure from a dependency.
    #[error("Upstream error from {service}: {reason}")]
    Upstream { service: String, reason: String },

    /// The caller's deadline elapsed before the operation finished.
    #[error("Timed out during {operation}")]
    Timeout { operation: String },

    /// Page structure or script output did not match the expected pattern.
    #[error("Extraction failed: {reason}")]
    Extraction { reason: String },

    /// Input that should be impossible for a valid catalog record.
    #[error("Internal inconsistency: {reason}")]
    Internal { reason: String },
}

/// Coarse classification of a [`LookupError`], used for status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Upstream,
    Timeout,
    Extraction,
    Internal,
}

impl LookupError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn upstream(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    pub fn extraction(reason: impl Into<String>) -> Self {
        Self::Extraction {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LookupError::InvalidInput { .. } => ErrorKind::InvalidInput,
            LookupError::NotFound { .. } => ErrorKind::NotFound,
            LookupError::Upstream { .. } => ErrorKind::Upstream,
            LookupError::Timeout { .. } => ErrorKind::Timeout,
            LookupError::Extraction { .. } => ErrorKind::Extraction,
            LookupError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Checks if this error was caused by the caller's input.
    pub fn is_user_error(&self) -> bool {
        matches!(self, LookupError::InvalidInput { .. })
    }

    /// Returns a message safe to show to API clients.
    ///
    /// Upstream and internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            LookupError::InvalidInput { reason } => reason.clone(),
            LookupError::NotFound { what } => format!("{what} not found"),
            LookupError::Timeout { .. } => "fetch timed out".to_string(),
            LookupError::Upstream { .. }
            | LookupError::Extraction { .. }
            | LookupError::Internal { .. } => "server failed to process request".to_string(),
        }
    }
}
