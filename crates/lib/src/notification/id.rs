//! Correlation identifiers for notifications.
//!
//! Every notification carries exactly one [`NotificationId`]: an opaque base
//! value plus a sequence number that increases monotonically per issuing
//! [`NotificationIdSource`]. The id is what the echo-suppression protocol
//! correlates on, so uniqueness per issuing instance is load-bearing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation id of one notification.
///
/// Displayed as `base:seq`. Ordering of ids from the same source follows
/// the sequence number; ids from different sources are unrelated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId {
    base: String,
    seq: u64,
}

impl NotificationId {
    /// Assembles an id from its parts.
    ///
    /// Mostly useful for tests and for transports reconstructing inbound
    /// ids; live code mints ids through a [`NotificationIdSource`].
    pub fn new(base: impl Into<String>, seq: u64) -> Self {
        Self {
            base: base.into(),
            seq,
        }
    }

    /// The opaque base value identifying the issuing instance.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The per-instance sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.base, self.seq)
    }
}

/// Mints locally-unique [`NotificationId`]s.
///
/// Each source carries a random base, so ids minted by independent sources
/// (one per side of a replication boundary) never collide. Cloned handles
/// share the same counter.
#[derive(Debug, Clone)]
pub struct NotificationIdSource {
    base: Arc<str>,
    next: Arc<AtomicU64>,
}

impl NotificationIdSource {
    /// Creates a source with a fresh random base.
    pub fn new() -> Self {
        Self::with_base(Uuid::new_v4().to_string())
    }

    /// Creates a source with a fixed base, for deterministic tests.
    pub fn with_base(base: impl Into<String>) -> Self {
        Self {
            base: Arc::from(base.into()),
            next: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Mints the next id.
    pub fn mint(&self) -> NotificationId {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        NotificationId {
            base: self.base.to_string(),
            seq,
        }
    }
}

impl Default for NotificationIdSource {
    fn default() -> Self {
        Self::new()
    }
}
