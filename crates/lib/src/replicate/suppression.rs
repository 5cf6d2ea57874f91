//! Echo suppression and identity correlation.
//!
//! Applying a remote notification locally raises local notifications that
//! must not travel back to their origin. The protocol around one inbound
//! notification with remote id `R`:
//!
//! 1. mint a fresh local id `L`,
//! 2. record the correlation in the [`SuppressionTable`] — a drop entry
//!    (plain policy) or `L → R` (rewrite policy),
//! 3. apply the mutation with `L` as the externally supplied correlation
//!    id,
//! 4. the [`EchoFilter`] stage drops notifications carrying a drop entry
//!    and restores `R` for rewrite entries,
//! 5. the entry is removed when the mutation completes, success or
//!    failure — the [`SuppressionGuard`] releases on drop.
//!
//! One mutation is in flight per replicator instance at a time
//! (single-writer discipline); each application mints its own id, so
//! cycles never nest for the same id.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::Result;
use crate::dispatch::{
    ConnectionToken, Downstream, NotificationReceiver, NotificationSender,
};
use crate::notification::{Notification, NotificationBody, NotificationId};

/// What happens to an echo at the filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoPolicy {
    /// Drop the local notification; the origin already has the change.
    Suppress,
    /// Restore the remote origin id and forward, for consumers past the
    /// boundary that still want to observe the applied change.
    Rewrite,
}

#[derive(Default)]
struct TableInner {
    drops: HashSet<NotificationId>,
    rewrites: HashMap<NotificationId, NotificationId>,
}

/// Correlation state for in-flight remote applications.
///
/// Cheap-clone handle shared between the remote replicators (writers) and
/// the [`EchoFilter`] (reader) of one side.
#[derive(Clone, Default)]
pub struct SuppressionTable {
    inner: Arc<Mutex<TableInner>>,
}

/// The filter stage's decision for one notification id.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Forward,
    Drop,
    Rewrite(NotificationId),
}

impl SuppressionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a drop entry for `local`; released when the guard drops.
    pub fn suppress(&self, local: NotificationId) -> SuppressionGuard {
        tracing::trace!(id = %local, "suppression entered");
        self.inner.lock().unwrap().drops.insert(local.clone());
        SuppressionGuard {
            table: self.clone(),
            id: local,
        }
    }

    /// Records a rewrite entry `local → remote`; released when the guard
    /// drops.
    pub fn correlate(&self, local: NotificationId, remote: NotificationId) -> SuppressionGuard {
        tracing::trace!(local = %local, remote = %remote, "rewrite correlation entered");
        self.inner
            .lock()
            .unwrap()
            .rewrites
            .insert(local.clone(), remote);
        SuppressionGuard {
            table: self.clone(),
            id: local,
        }
    }

    /// True while any correlation entry is active — the `Suppressing`
    /// state of the replicator protocol.
    pub fn is_suppressing(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        !inner.drops.is_empty() || !inner.rewrites.is_empty()
    }

    fn verdict(&self, id: &NotificationId) -> Verdict {
        let inner = self.inner.lock().unwrap();
        if inner.drops.contains(id) {
            return Verdict::Drop;
        }
        match inner.rewrites.get(id) {
            Some(remote) => Verdict::Rewrite(remote.clone()),
            None => Verdict::Forward,
        }
    }

    fn release(&self, id: &NotificationId) {
        let mut inner = self.inner.lock().unwrap();
        inner.drops.remove(id);
        inner.rewrites.remove(id);
        tracing::trace!(id = %id, "suppression released");
    }
}

/// Scoped acquire/release of one correlation entry.
#[must_use = "the correlation entry is released when the guard drops"]
pub struct SuppressionGuard {
    table: SuppressionTable,
    id: NotificationId,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        self.table.release(&self.id);
    }
}

/// Pipeline stage enforcing the suppression table.
///
/// Plain notifications are dropped or rewritten according to their id's
/// correlation entry. Composites are filtered part-wise, recursively; a
/// composite whose parts all vanish is dropped whole.
pub struct EchoFilter {
    table: SuppressionTable,
    downstream: Downstream,
}

impl EchoFilter {
    pub fn new(table: SuppressionTable) -> Self {
        Self {
            table,
            downstream: Downstream::default(),
        }
    }

    fn filter(&self, notification: Notification) -> Option<Notification> {
        match self.table.verdict(notification.id()) {
            Verdict::Drop => {
                tracing::trace!(id = %notification.id(), "echo dropped");
                None
            }
            Verdict::Rewrite(remote) => {
                let mut rewritten = notification;
                tracing::trace!(local = %rewritten.id(), remote = %remote, "echo rewritten");
                rewritten.set_id(remote);
                Some(self.filter_parts(rewritten))
            }
            Verdict::Forward => Some(self.filter_parts(notification)),
        }
    }

    fn filter_parts(&self, notification: Notification) -> Notification {
        if notification.parts().is_none() {
            return notification;
        }
        let id = notification.id().clone();
        let NotificationBody::Composite { parts } = notification.into_body() else {
            unreachable!("parts() implies a composite body");
        };
        let surviving: Vec<Notification> =
            parts.into_iter().filter_map(|part| self.filter(part)).collect();
        Notification::new(id, NotificationBody::Composite { parts: surviving })
    }
}

impl NotificationReceiver for EchoFilter {
    fn receive(&self, notification: Notification) -> Result<()> {
        match self.filter(notification) {
            Some(notification) => {
                // A composite emptied by filtering is itself an echo.
                if notification.parts().is_some_and(<[Notification]>::is_empty) {
                    return Ok(());
                }
                self.downstream.forward(notification)
            }
            None => Ok(()),
        }
    }
}

impl NotificationSender for EchoFilter {
    fn connect(&self, downstream: Arc<dyn NotificationReceiver>) -> ConnectionToken {
        self.downstream.connect(downstream)
    }

    fn disconnect(&self, token: ConnectionToken) -> Result<()> {
        self.downstream.disconnect(token)
    }
}
