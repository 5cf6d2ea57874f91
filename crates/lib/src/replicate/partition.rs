//! The per-partition replicator halves.
//!
//! [`LocalPartitionReplicator`] sits on a partition's notification stream:
//! it keeps the side's [`SharedNodeMap`] in step with structural changes
//! and only then forwards downstream, so identity resolution for the very
//! notification being forwarded always succeeds.
//!
//! [`RemotePartitionReplicator`] applies one inbound partition-scoped
//! notification: every referenced id is resolved through the node map
//! (unresolved ⇒ fatal identity error, never a silent no-op) and the
//! mutation runs under the echo-suppression protocol of
//! [`suppression`](super::suppression).

use std::sync::Arc;

use crate::Result;
use crate::dispatch::{
    ConnectionToken, Downstream, NotificationReceiver, NotificationSender,
};
use crate::model::{Node, Partition};
use crate::notification::{
    Notification, NotificationBody, NotificationId, NotificationIdSource,
};
use crate::registry::{RegistryError, SharedNodeMap};

use super::errors::ReplicateError;
use super::suppression::{EchoPolicy, SuppressionGuard, SuppressionTable};

/// Local half: node-map maintenance, then forward.
pub struct LocalPartitionReplicator {
    nodes: SharedNodeMap,
    downstream: Downstream,
}

impl LocalPartitionReplicator {
    pub fn new(nodes: SharedNodeMap) -> Self {
        Self {
            nodes,
            downstream: Downstream::default(),
        }
    }

    /// Registers added subtrees and unregisters deleted ones.
    ///
    /// Must run before the notification travels further: downstream stages
    /// resolve the ids this very notification carries.
    fn maintain(&self, notification: &Notification) -> Result<()> {
        use NotificationBody::*;
        match notification.body() {
            ChildAdded {
                parent,
                containment,
                index,
                child,
            } => {
                let parent = self.nodes.lookup(parent)?;
                let live = parent.child_at(containment, *index).ok_or_else(|| {
                    RegistryError::UnknownNodeId {
                        id: child.id.clone(),
                    }
                })?;
                self.nodes.register(&live)
            }
            ChildDeleted { child, .. } => {
                let node = self.nodes.lookup(child)?;
                self.nodes.unregister(&node)
            }
            ChildReplaced {
                parent,
                containment,
                index,
                new_child,
                replaced,
            } => {
                let old = self.nodes.lookup(replaced)?;
                self.nodes.unregister(&old)?;
                let parent = self.nodes.lookup(parent)?;
                let live = parent.child_at(containment, *index).ok_or_else(|| {
                    RegistryError::UnknownNodeId {
                        id: new_child.id.clone(),
                    }
                })?;
                self.nodes.register(&live)
            }
            ChildMovedAndReplacedFromOtherContainment { replaced, .. }
            | ChildMovedAndReplacedFromOtherContainmentInSameParent { replaced, .. }
            | ChildMovedAndReplacedInSameContainment { replaced, .. } => {
                let evicted = self.nodes.lookup(replaced)?;
                self.nodes.unregister(&evicted)
            }
            AnnotationAdded {
                parent,
                index,
                annotation,
            } => {
                let parent = self.nodes.lookup(parent)?;
                let live = parent.annotation_at(*index).ok_or_else(|| {
                    RegistryError::UnknownNodeId {
                        id: annotation.id.clone(),
                    }
                })?;
                self.nodes.register(&live)
            }
            AnnotationDeleted { annotation, .. } => {
                let node = self.nodes.lookup(annotation)?;
                self.nodes.unregister(&node)
            }
            Composite { parts } => {
                for part in parts {
                    self.maintain(part)?;
                }
                Ok(())
            }
            // Moves stay within the registered tree; properties and
            // references change no identities.
            _ => Ok(()),
        }
    }
}

impl NotificationReceiver for LocalPartitionReplicator {
    fn receive(&self, notification: Notification) -> Result<()> {
        self.maintain(&notification)?;
        self.downstream.forward(notification)
    }
}

impl NotificationSender for LocalPartitionReplicator {
    fn connect(&self, downstream: Arc<dyn NotificationReceiver>) -> ConnectionToken {
        self.downstream.connect(downstream)
    }

    fn disconnect(&self, token: ConnectionToken) -> Result<()> {
        self.downstream.disconnect(token)
    }
}

/// Remote half: applies inbound notifications under suppression.
pub struct RemotePartitionReplicator {
    partition: Partition,
    nodes: SharedNodeMap,
    suppression: SuppressionTable,
    policy: EchoPolicy,
    ids: NotificationIdSource,
}

impl RemotePartitionReplicator {
    pub fn new(
        partition: Partition,
        nodes: SharedNodeMap,
        suppression: SuppressionTable,
        policy: EchoPolicy,
        ids: NotificationIdSource,
    ) -> Self {
        Self {
            partition,
            nodes,
            suppression,
            policy,
            ids,
        }
    }

    /// Applies one inbound notification to the local partition.
    ///
    /// Mints a fresh local id, records its correlation to the inbound id,
    /// runs the mutation with the local id as correlation, and releases
    /// the entry whether or not the mutation succeeded.
    pub fn apply(&self, notification: &Notification) -> Result<()> {
        if let Some(parts) = notification.parts() {
            for part in parts {
                self.apply(part)?;
            }
            return Ok(());
        }
        let local = self.ids.mint();
        let _guard = self.enter(local.clone(), notification.id().clone());
        tracing::debug!(
            kind = ?notification.kind(),
            remote = %notification.id(),
            local = %local,
            "applying inbound notification"
        );
        self.apply_body(notification, local)
    }

    fn enter(&self, local: NotificationId, remote: NotificationId) -> SuppressionGuard {
        match self.policy {
            EchoPolicy::Suppress => self.suppression.suppress(local),
            EchoPolicy::Rewrite => self.suppression.correlate(local, remote),
        }
    }

    fn resolve(&self, id: &crate::model::NodeId) -> Result<Node> {
        self.nodes.lookup(id)
    }

    fn apply_body(&self, notification: &Notification, local: NotificationId) -> Result<()> {
        use NotificationBody::*;
        let correlation = Some(local);
        match notification.body() {
            PropertyAdded {
                node,
                property,
                new_value,
            }
            | PropertyChanged {
                node,
                property,
                new_value,
                ..
            } => {
                let node = self.resolve(node)?;
                self.partition
                    .set_property(&node, property, new_value.clone(), correlation)
            }
            PropertyDeleted { node, property, .. } => {
                let node = self.resolve(node)?;
                self.partition.remove_property(&node, property, correlation)
            }
            ChildAdded {
                parent,
                containment,
                index,
                child,
            } => {
                let parent = self.resolve(parent)?;
                self.partition
                    .add_child(&parent, containment, *index, child, correlation)
                    .map(|_| ())
            }
            ChildDeleted {
                parent,
                containment,
                index,
                child,
            } => {
                self.resolve(child)?;
                let parent = self.resolve(parent)?;
                self.partition
                    .remove_child(&parent, containment, *index, correlation)
                    .map(|_| ())
            }
            ChildReplaced {
                parent,
                containment,
                index,
                new_child,
                replaced,
            } => {
                self.resolve(replaced)?;
                let parent = self.resolve(parent)?;
                self.partition
                    .replace_child(&parent, containment, *index, new_child, correlation)
                    .map(|_| ())
            }
            ChildMovedFromOtherContainment {
                child,
                new_parent,
                new_containment,
                new_index,
                old_parent,
                old_containment,
                old_index,
            } => {
                self.resolve(child)?;
                let old_parent = self.resolve(old_parent)?;
                let new_parent = self.resolve(new_parent)?;
                self.partition.move_child(
                    &old_parent,
                    old_containment,
                    *old_index,
                    &new_parent,
                    new_containment,
                    *new_index,
                    correlation,
                )
            }
            ChildMovedFromOtherContainmentInSameParent {
                child,
                parent,
                new_containment,
                new_index,
                old_containment,
                old_index,
            } => {
                self.resolve(child)?;
                let parent = self.resolve(parent)?;
                self.partition.move_child(
                    &parent,
                    old_containment,
                    *old_index,
                    &parent,
                    new_containment,
                    *new_index,
                    correlation,
                )
            }
            ChildMovedInSameContainment {
                child,
                parent,
                containment,
                new_index,
                old_index,
            } => {
                self.resolve(child)?;
                let parent = self.resolve(parent)?;
                self.partition.move_child(
                    &parent,
                    containment,
                    *old_index,
                    &parent,
                    containment,
                    *new_index,
                    correlation,
                )
            }
            ChildMovedAndReplacedFromOtherContainment {
                child,
                new_parent,
                new_containment,
                new_index,
                old_parent,
                old_containment,
                old_index,
                replaced,
            } => {
                self.resolve(child)?;
                self.resolve(replaced)?;
                let old_parent = self.resolve(old_parent)?;
                let new_parent = self.resolve(new_parent)?;
                self.partition
                    .move_child_replacing(
                        &old_parent,
                        old_containment,
                        *old_index,
                        &new_parent,
                        new_containment,
                        *new_index,
                        correlation,
                    )
                    .map(|_| ())
            }
            ChildMovedAndReplacedFromOtherContainmentInSameParent {
                child,
                parent,
                new_containment,
                new_index,
                old_containment,
                old_index,
                replaced,
            } => {
                self.resolve(child)?;
                self.resolve(replaced)?;
                let parent = self.resolve(parent)?;
                self.partition
                    .move_child_replacing(
                        &parent,
                        old_containment,
                        *old_index,
                        &parent,
                        new_containment,
                        *new_index,
                        correlation,
                    )
                    .map(|_| ())
            }
            ChildMovedAndReplacedInSameContainment {
                child,
                parent,
                containment,
                new_index,
                old_index,
                replaced,
            } => {
                self.resolve(child)?;
                self.resolve(replaced)?;
                let parent = self.resolve(parent)?;
                self.partition
                    .move_child_replacing(
                        &parent,
                        containment,
                        *old_index,
                        &parent,
                        containment,
                        *new_index,
                        correlation,
                    )
                    .map(|_| ())
            }
            AnnotationAdded {
                parent,
                index,
                annotation,
            } => {
                let parent = self.resolve(parent)?;
                self.partition
                    .add_annotation(&parent, *index, annotation, correlation)
                    .map(|_| ())
            }
            AnnotationDeleted {
                parent,
                index,
                annotation,
            } => {
                self.resolve(annotation)?;
                let parent = self.resolve(parent)?;
                self.partition
                    .remove_annotation(&parent, *index, correlation)
                    .map(|_| ())
            }
            AnnotationMovedFromOtherParent {
                annotation,
                new_parent,
                new_index,
                old_parent,
                old_index,
            } => {
                self.resolve(annotation)?;
                let old_parent = self.resolve(old_parent)?;
                let new_parent = self.resolve(new_parent)?;
                self.partition.move_annotation(
                    &old_parent,
                    *old_index,
                    &new_parent,
                    *new_index,
                    correlation,
                )
            }
            AnnotationMovedInSameParent {
                annotation,
                parent,
                new_index,
                old_index,
            } => {
                self.resolve(annotation)?;
                let parent = self.resolve(parent)?;
                self.partition
                    .move_annotation(&parent, *old_index, &parent, *new_index, correlation)
            }
            ReferenceAdded {
                node,
                reference,
                index,
                target,
            } => {
                self.resolve(target)?;
                let node = self.resolve(node)?;
                self.partition
                    .add_reference(&node, reference, *index, target.clone(), correlation)
            }
            ReferenceDeleted {
                node,
                reference,
                index,
                ..
            } => {
                let node = self.resolve(node)?;
                self.partition
                    .remove_reference(&node, reference, *index, correlation)
                    .map(|_| ())
            }
            ReferenceChanged {
                node,
                reference,
                index,
                new_target,
                ..
            } => {
                self.resolve(new_target)?;
                let node = self.resolve(node)?;
                self.partition
                    .set_reference(&node, reference, *index, new_target.clone(), correlation)
                    .map(|_| ())
            }
            PartitionAdded { .. } | PartitionDeleted { .. } | Composite { .. } => {
                Err(ReplicateError::UnsupportedNotification {
                    kind: notification.kind(),
                }
                .into())
            }
        }
    }
}

/// Both halves for one partition, wired onto its notification stream.
///
/// Created when a partition appears, registered in the
/// [`SharedPartitionReplicatorMap`](crate::registry::SharedPartitionReplicatorMap),
/// and detached when the partition is deleted.
pub struct PartitionReplicator {
    partition: Partition,
    local: Arc<LocalPartitionReplicator>,
    remote: RemotePartitionReplicator,
    stream_token: ConnectionToken,
    outbound_token: ConnectionToken,
}

impl PartitionReplicator {
    /// Wires a replicator onto `partition`'s stream, forwarding into
    /// `outbound`.
    pub fn attach(
        partition: Partition,
        nodes: SharedNodeMap,
        suppression: SuppressionTable,
        policy: EchoPolicy,
        ids: NotificationIdSource,
        outbound: Arc<dyn NotificationReceiver>,
    ) -> Arc<Self> {
        let local = Arc::new(LocalPartitionReplicator::new(nodes.clone()));
        let outbound_token = local.connect(outbound);
        let stream_token = partition.broadcaster().connect(local.clone());
        let remote =
            RemotePartitionReplicator::new(partition.clone(), nodes, suppression, policy, ids);
        Arc::new(Self {
            partition,
            local,
            remote,
            stream_token,
            outbound_token,
        })
    }

    /// The replicated partition.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Applies one inbound partition-scoped notification.
    pub fn apply(&self, notification: &Notification) -> Result<()> {
        self.remote.apply(notification)
    }

    /// Unhooks the local half from the partition stream.
    pub(crate) fn detach(&self) {
        let _ = self.partition.broadcaster().disconnect(self.stream_token);
        let _ = self.local.disconnect(self.outbound_token);
    }
}
