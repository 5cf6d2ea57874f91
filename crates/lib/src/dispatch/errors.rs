//! Error types for the notification dispatch layer.

use thiserror::Error;

/// Structured errors raised by dispatchers and pipelines.
///
/// All of these are protocol or construction violations on the caller's
/// side and fail fast; nothing here is retried internally.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A pipeline needs at least two stages to connect anything.
    #[error("pipeline requires at least 2 stages, got {count}")]
    TooFewStages { count: usize },

    /// Unsubscribe with a token that is not (or no longer) registered.
    #[error("unknown subscription token {token}")]
    UnknownSubscription { token: u64 },

    /// Disconnect with a token that is not (or no longer) connected.
    #[error("unknown connection token {token}")]
    UnknownConnection { token: u64 },
}

impl DispatchError {
    /// Check if this error is a construction invariant violation.
    pub fn is_construction_error(&self) -> bool {
        matches!(self, DispatchError::TooFewStages { .. })
    }

    /// Check if this error is a stale or unknown token.
    pub fn is_unknown_token(&self) -> bool {
        matches!(
            self,
            DispatchError::UnknownSubscription { .. } | DispatchError::UnknownConnection { .. }
        )
    }
}

impl From<DispatchError> for crate::Error {
    fn from(err: DispatchError) -> Self {
        crate::Error::Dispatch(err)
    }
}
