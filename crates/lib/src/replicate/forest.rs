//! The forest-level replicator halves.
//!
//! [`LocalForestReplicator`] watches a forest's stream: every partition
//! that appears gets its subtree registered in the node map and a
//! [`PartitionReplicator`] wired onto its stream and registered in the
//! partition replicator map — node map first, forwarding last. Partitions
//! already present when the replicator is constructed are *not*
//! retrofitted; that is a documented limitation of the plain forest
//! replicator, not an oversight.
//!
//! [`RemoteForestReplicator`] is the inbound entry point: forest-scoped
//! notifications apply to the forest itself, partition-scoped ones are
//! routed through the registries to the responsible partition replicator,
//! and composites are taken apart and routed part by part.

use std::sync::Arc;

use crate::Result;
use crate::dispatch::{
    ConnectionToken, Downstream, NotificationReceiver, NotificationSender,
};
use crate::model::{Forest, ModelError, WeakForest};
use crate::notification::{Notification, NotificationBody, NotificationIdSource};
use crate::registry::{SharedNodeMap, SharedPartitionReplicatorMap};

use super::partition::PartitionReplicator;
use super::suppression::{EchoPolicy, SuppressionTable};

/// Local half: partition replicator lifecycle plus node-map maintenance.
pub struct LocalForestReplicator {
    forest: WeakForest,
    nodes: SharedNodeMap,
    replicators: SharedPartitionReplicatorMap,
    suppression: SuppressionTable,
    policy: EchoPolicy,
    ids: NotificationIdSource,
    /// Where freshly wired partition replicators forward to — the shared
    /// outbound chain of this side.
    partition_outbound: Arc<dyn NotificationReceiver>,
    downstream: Downstream,
}

impl LocalForestReplicator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        forest: WeakForest,
        nodes: SharedNodeMap,
        replicators: SharedPartitionReplicatorMap,
        suppression: SuppressionTable,
        policy: EchoPolicy,
        ids: NotificationIdSource,
        partition_outbound: Arc<dyn NotificationReceiver>,
    ) -> Self {
        Self {
            forest,
            nodes,
            replicators,
            suppression,
            policy,
            ids,
            partition_outbound,
            downstream: Downstream::default(),
        }
    }

    fn partition_appeared(&self, notification: &Notification) -> Result<()> {
        let NotificationBody::PartitionAdded { partition: record } = notification.body() else {
            return Ok(());
        };
        let Some(forest) = self.forest.upgrade() else {
            return Ok(());
        };
        let partition = forest
            .partition(&record.id)
            .ok_or_else(|| ModelError::UnknownPartition {
                id: record.id.clone(),
            })?;
        self.nodes.register(partition.root())?;
        let replicator = PartitionReplicator::attach(
            partition,
            self.nodes.clone(),
            self.suppression.clone(),
            self.policy,
            self.ids.clone(),
            self.partition_outbound.clone(),
        );
        self.replicators.register(record.id.clone(), replicator)
    }

    fn partition_disappeared(&self, notification: &Notification) -> Result<()> {
        let NotificationBody::PartitionDeleted { partition: id } = notification.body() else {
            return Ok(());
        };
        let replicator = self.replicators.unregister(id)?;
        replicator.detach();
        let root = self.nodes.lookup(id)?;
        self.nodes.unregister(&root)
    }
}

impl NotificationReceiver for LocalForestReplicator {
    fn receive(&self, notification: Notification) -> Result<()> {
        // Registries first, forwarding second: downstream resolution of
        // this very notification depends on it.
        match notification.kind() {
            crate::notification::NotificationKind::PartitionAdded => {
                self.partition_appeared(&notification)?;
            }
            crate::notification::NotificationKind::PartitionDeleted => {
                self.partition_disappeared(&notification)?;
            }
            _ => {}
        }
        self.downstream.forward(notification)
    }
}

impl NotificationSender for LocalForestReplicator {
    fn connect(&self, downstream: Arc<dyn NotificationReceiver>) -> ConnectionToken {
        self.downstream.connect(downstream)
    }

    fn disconnect(&self, token: ConnectionToken) -> Result<()> {
        self.downstream.disconnect(token)
    }
}

/// Remote half: routes and applies inbound notifications.
pub struct RemoteForestReplicator {
    forest: Forest,
    nodes: SharedNodeMap,
    replicators: SharedPartitionReplicatorMap,
    suppression: SuppressionTable,
    policy: EchoPolicy,
    ids: NotificationIdSource,
}

impl RemoteForestReplicator {
    pub fn new(
        forest: Forest,
        nodes: SharedNodeMap,
        replicators: SharedPartitionReplicatorMap,
        suppression: SuppressionTable,
        policy: EchoPolicy,
        ids: NotificationIdSource,
    ) -> Self {
        Self {
            forest,
            nodes,
            replicators,
            suppression,
            policy,
            ids,
        }
    }

    /// Applies one inbound notification, composite or plain.
    pub fn apply(&self, notification: &Notification) -> Result<()> {
        use NotificationBody::*;
        match notification.body() {
            Composite { parts } => {
                for part in parts {
                    self.apply(part)?;
                }
                Ok(())
            }
            PartitionAdded { partition: record } => {
                let local = self.ids.mint();
                let _guard = match self.policy {
                    EchoPolicy::Suppress => self.suppression.suppress(local.clone()),
                    EchoPolicy::Rewrite => self
                        .suppression
                        .correlate(local.clone(), notification.id().clone()),
                };
                tracing::debug!(partition = %record.id, "applying inbound partition add");
                self.forest.add_partition(record, Some(local)).map(|_| ())
            }
            PartitionDeleted { partition: id } => {
                let local = self.ids.mint();
                let _guard = match self.policy {
                    EchoPolicy::Suppress => self.suppression.suppress(local.clone()),
                    EchoPolicy::Rewrite => self
                        .suppression
                        .correlate(local.clone(), notification.id().clone()),
                };
                tracing::debug!(partition = %id, "applying inbound partition delete");
                self.forest.remove_partition(id, Some(local)).map(|_| ())
            }
            _ => {
                // Partition-scoped: resolve the subject, walk to its
                // partition root, delegate to that partition's replicator.
                let subject = notification
                    .subject()
                    .expect("partition-scoped notifications have a subject");
                let node = self.nodes.lookup(subject)?;
                let partition_id = node.root().id();
                let replicator = self.replicators.lookup(&partition_id)?;
                replicator.apply(notification)
            }
        }
    }
}
