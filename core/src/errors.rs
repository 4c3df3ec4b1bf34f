//! The error taxonomy shared by every state-changing action.
//!
//! The calling layer translates these 1:1 into user-visible outcomes; none
//! of them triggers an automatic retry. The compliance path is the sole
//! subsystem with internal retry, and it never surfaces errors to its
//! invoker at all.

use thiserror::Error;

use crate::state::StateTransitionError;

/// Typed failure for session actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttestError {
    /// Malformed input: bad indices, mismatched counts, out-of-range values.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Identity or tenant mismatch for the addressed record.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No active session, module, or evidence record to act on.
    #[error("not found: {0}")]
    NotFound(String),

    /// Illegal state transition, version mismatch, or duplicate submission.
    /// The caller must re-fetch before retrying.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An upstream generation/evaluation capability is down; safe to retry
    /// later.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rendering failure or unexpected storage fault; logged at the site.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AttestError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<StateTransitionError> for AttestError {
    fn from(err: StateTransitionError) -> Self {
        Self::Conflict(err.to_string())
    }
}
