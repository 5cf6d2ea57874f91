//! The assembled replicator pairs.
//!
//! A [`ForestNotificationReplicator`] makes one side of a replication
//! boundary out of a [`Forest`]: the local chain
//! `forest / partition streams → local replicators → compositor → echo
//! filter → outbound broadcaster`, plus the inbound entry point that
//! applies remote notifications under echo suppression. Wire two of them
//! together (each side's outbound into the other side's
//! [`receive`](crate::dispatch::NotificationReceiver::receive), via
//! whatever transport) and the two forests converge without echo loops.
//!
//! [`PartitionNotificationReplicator`] is the single-partition analogue
//! for callers replicating one tree without a forest around it.

pub mod errors;
mod forest;
mod partition;
mod suppression;

pub use errors::ReplicateError;
pub use forest::{LocalForestReplicator, RemoteForestReplicator};
pub use partition::{
    LocalPartitionReplicator, PartitionReplicator, RemotePartitionReplicator,
};
pub use suppression::{EchoFilter, EchoPolicy, SuppressionGuard, SuppressionTable};

use std::sync::Arc;

use crate::Result;
use crate::compose::{CompositeScope, Compositor};
use crate::dispatch::{
    Broadcaster, ConnectionToken, NotificationReceiver, NotificationSender, Pipeline,
    PipelineStage,
};
use crate::model::{Forest, Partition};
use crate::notification::{Notification, NotificationIdSource};
use crate::registry::{SharedNodeMap, SharedPartitionReplicatorMap};

/// One side of a forest replication boundary.
///
/// Dropping the replicator unhooks it from the forest stream and tears
/// down its outbound chain in reverse order.
pub struct ForestNotificationReplicator {
    forest: Forest,
    nodes: SharedNodeMap,
    replicators: SharedPartitionReplicatorMap,
    suppression: SuppressionTable,
    compositor: Compositor,
    outbound: Broadcaster,
    remote: RemoteForestReplicator,
    _pipeline: Pipeline,
    stream_token: ConnectionToken,
}

impl ForestNotificationReplicator {
    /// Plain variant: echoes of applied remote changes are dropped.
    ///
    /// Only partitions added *after* construction are replicated;
    /// partitions already present in the forest are not retrofitted.
    pub fn new(forest: Forest) -> Result<Self> {
        Self::with_policy(forest, EchoPolicy::Suppress)
    }

    /// Rewrite variant: echoes are forwarded with the remote origin id
    /// restored, for consumers past this boundary.
    pub fn new_rewriting(forest: Forest) -> Result<Self> {
        Self::with_policy(forest, EchoPolicy::Rewrite)
    }

    fn with_policy(forest: Forest, policy: EchoPolicy) -> Result<Self> {
        let nodes = SharedNodeMap::new();
        let replicators = SharedPartitionReplicatorMap::new();
        let suppression = SuppressionTable::new();
        let ids = NotificationIdSource::new();

        let compositor = Compositor::new(ids.clone());
        let filter = EchoFilter::new(suppression.clone());
        let outbound = Broadcaster::new();

        let local = Arc::new(LocalForestReplicator::new(
            forest.downgrade(),
            nodes.clone(),
            replicators.clone(),
            suppression.clone(),
            policy,
            ids.clone(),
            Arc::new(compositor.clone()),
        ));

        let stages: Vec<Arc<dyn PipelineStage>> = vec![
            local.clone(),
            Arc::new(compositor.clone()),
            Arc::new(filter),
            Arc::new(outbound.clone()),
        ];
        let pipeline = Pipeline::new(stages)?;
        let stream_token = forest.broadcaster().connect(local);

        let remote = RemoteForestReplicator::new(
            forest.clone(),
            nodes.clone(),
            replicators.clone(),
            suppression.clone(),
            policy,
            ids,
        );

        Ok(Self {
            forest,
            nodes,
            replicators,
            suppression,
            compositor,
            outbound,
            remote,
            _pipeline: pipeline,
            stream_token,
        })
    }

    /// The replicated forest.
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// This side's node map.
    pub fn nodes(&self) -> &SharedNodeMap {
        &self.nodes
    }

    /// This side's partition replicator map.
    pub fn partition_replicators(&self) -> &SharedPartitionReplicatorMap {
        &self.replicators
    }

    /// Where outbound notifications leave this side; connect the
    /// transport (or, in process, the other side) here.
    pub fn outbound(&self) -> &Broadcaster {
        &self.outbound
    }

    /// Opens a composite scope on the outbound chain: all notifications
    /// of one logical operation leave as a single composite.
    pub fn composite_scope(&self) -> CompositeScope {
        self.compositor.scope()
    }

    /// True while an inbound mutation is in flight.
    pub fn is_suppressing(&self) -> bool {
        self.suppression.is_suppressing()
    }
}

impl NotificationReceiver for ForestNotificationReplicator {
    /// Inbound entry point for wire-originated notifications.
    fn receive(&self, notification: Notification) -> Result<()> {
        self.remote.apply(&notification)
    }
}

impl Drop for ForestNotificationReplicator {
    fn drop(&mut self) {
        let _ = self.forest.broadcaster().disconnect(self.stream_token);
        for (_, replicator) in self.replicators.drain() {
            replicator.detach();
        }
    }
}

/// One side of a single-partition replication boundary.
///
/// Unlike the forest variant, the partition is registered at construction
/// time — there is exactly one and it is already known.
pub struct PartitionNotificationReplicator {
    partition: Partition,
    nodes: SharedNodeMap,
    suppression: SuppressionTable,
    compositor: Compositor,
    outbound: Broadcaster,
    replicator: Arc<PartitionReplicator>,
    _pipeline: Pipeline,
}

impl PartitionNotificationReplicator {
    /// Plain variant: echoes of applied remote changes are dropped.
    pub fn new(partition: Partition) -> Result<Self> {
        Self::with_policy(partition, EchoPolicy::Suppress)
    }

    /// Rewrite variant: echoes forwarded with the remote id restored.
    pub fn new_rewriting(partition: Partition) -> Result<Self> {
        Self::with_policy(partition, EchoPolicy::Rewrite)
    }

    fn with_policy(partition: Partition, policy: EchoPolicy) -> Result<Self> {
        let nodes = SharedNodeMap::new();
        let suppression = SuppressionTable::new();
        let ids = NotificationIdSource::new();

        nodes.register(partition.root())?;

        let compositor = Compositor::new(ids.clone());
        let filter = EchoFilter::new(suppression.clone());
        let outbound = Broadcaster::new();

        let stages: Vec<Arc<dyn PipelineStage>> = vec![
            Arc::new(compositor.clone()),
            Arc::new(filter),
            Arc::new(outbound.clone()),
        ];
        let pipeline = Pipeline::new(stages)?;

        let replicator = PartitionReplicator::attach(
            partition.clone(),
            nodes.clone(),
            suppression.clone(),
            policy,
            ids,
            Arc::new(compositor.clone()),
        );

        Ok(Self {
            partition,
            nodes,
            suppression,
            compositor,
            outbound,
            replicator,
            _pipeline: pipeline,
        })
    }

    /// The replicated partition.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// This side's node map.
    pub fn nodes(&self) -> &SharedNodeMap {
        &self.nodes
    }

    /// Where outbound notifications leave this side.
    pub fn outbound(&self) -> &Broadcaster {
        &self.outbound
    }

    /// Opens a composite scope on the outbound chain.
    pub fn composite_scope(&self) -> CompositeScope {
        self.compositor.scope()
    }

    /// True while an inbound mutation is in flight.
    pub fn is_suppressing(&self) -> bool {
        self.suppression.is_suppressing()
    }
}

impl NotificationReceiver for PartitionNotificationReplicator {
    /// Inbound entry point for wire-originated notifications.
    fn receive(&self, notification: Notification) -> Result<()> {
        self.replicator.apply(&notification)
    }
}

impl Drop for PartitionNotificationReplicator {
    fn drop(&mut self) {
        self.replicator.detach();
    }
}
