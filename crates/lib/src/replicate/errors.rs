//! Error types for the replicator pair.

use thiserror::Error;

use crate::notification::NotificationKind;

/// Structured errors raised while applying remote notifications.
///
/// Identity failures (unknown ids, duplicate replicators) surface as
/// [`RegistryError`](crate::registry::RegistryError); this enum covers the
/// replication protocol itself. Everything fails fast — the deliberate
/// suppression of echoes is not an error path.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReplicateError {
    /// An inbound notification kind this replicator has no mapped
    /// handling for.
    #[error("no mapped handling for inbound {kind:?} notification")]
    UnsupportedNotification { kind: NotificationKind },
}

impl ReplicateError {
    /// Check if this error names an unmapped notification kind.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ReplicateError::UnsupportedNotification { .. })
    }
}

impl From<ReplicateError> for crate::Error {
    fn from(err: ReplicateError) -> Self {
        crate::Error::Replicate(err)
    }
}
