//! Identity registries shared between the replicator halves of one side.
//!
//! [`SharedNodeMap`] resolves node ids arriving in remote notifications to
//! live local nodes; [`SharedPartitionReplicatorMap`] routes inbound
//! partition-scoped notifications to the replicator responsible for that
//! partition. Both are cheap-clone handles whose lifecycle is driven by
//! structural notifications: the local replicators register on add and
//! unregister on delete.
//!
//! Neither map synchronizes across calls — callers serialize per forest
//! (single-writer discipline); the internal lock only keeps individual
//! operations memory-safe.

pub mod errors;

pub use errors::RegistryError;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::Result;
use crate::model::{Node, NodeId};
use crate::replicate::PartitionReplicator;

/// Node-id → node map for one side of a replication boundary.
///
/// Registration is transitive: registering a node registers it and every
/// descendant and annotation, and unregistration is symmetric. Duplicate
/// registration and unknown lookups fail fast.
#[derive(Clone, Default)]
pub struct SharedNodeMap {
    inner: Arc<Mutex<HashMap<NodeId, Node>>>,
}

impl SharedNodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node` and its whole subtree.
    ///
    /// Fails with [`RegistryError::DuplicateNodeId`] without registering
    /// anything if any id in the subtree is already present.
    pub fn register(&self, node: &Node) -> Result<()> {
        let subtree = node.descendants();
        let mut map = self.inner.lock().unwrap();
        for member in &subtree {
            let id = member.id();
            if map.contains_key(&id) {
                return Err(RegistryError::DuplicateNodeId { id }.into());
            }
        }
        for member in subtree {
            map.insert(member.id(), member);
        }
        tracing::trace!(root = %node.id(), "registered subtree");
        Ok(())
    }

    /// Unregisters `node` and its whole subtree.
    ///
    /// Fails with [`RegistryError::UnknownNodeId`] without unregistering
    /// anything if any id in the subtree is absent.
    pub fn unregister(&self, node: &Node) -> Result<()> {
        let subtree = node.descendants();
        let mut map = self.inner.lock().unwrap();
        for member in &subtree {
            let id = member.id();
            if !map.contains_key(&id) {
                return Err(RegistryError::UnknownNodeId { id }.into());
            }
        }
        for member in subtree {
            map.remove(&member.id());
        }
        tracing::trace!(root = %node.id(), "unregistered subtree");
        Ok(())
    }

    /// Resolves one id to its live node.
    pub fn lookup(&self, id: &NodeId) -> Result<Node> {
        self.inner
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownNodeId { id: id.clone() }.into())
    }

    /// True if `id` is registered.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.inner.lock().unwrap().contains_key(id)
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

/// Partition-id → per-partition replicator map.
///
/// Entries are created when a partition appears and destroyed when it is
/// deleted; both directions fail fast on duplicates and unknowns.
#[derive(Clone, Default)]
pub struct SharedPartitionReplicatorMap {
    inner: Arc<Mutex<HashMap<NodeId, Arc<PartitionReplicator>>>>,
}

impl SharedPartitionReplicatorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the replicator responsible for `id`.
    pub fn register(&self, id: NodeId, replicator: Arc<PartitionReplicator>) -> Result<()> {
        let mut map = self.inner.lock().unwrap();
        if map.contains_key(&id) {
            return Err(RegistryError::DuplicatePartitionReplicator { id }.into());
        }
        tracing::debug!(partition = %id, "partition replicator registered");
        map.insert(id, replicator);
        Ok(())
    }

    /// Removes and returns the replicator for `id`.
    pub fn unregister(&self, id: &NodeId) -> Result<Arc<PartitionReplicator>> {
        let removed = self.inner.lock().unwrap().remove(id);
        match removed {
            Some(replicator) => {
                tracing::debug!(partition = %id, "partition replicator unregistered");
                Ok(replicator)
            }
            None => Err(RegistryError::UnknownPartition { id: id.clone() }.into()),
        }
    }

    /// Resolves the replicator for `id`.
    pub fn lookup(&self, id: &NodeId) -> Result<Arc<PartitionReplicator>> {
        self.inner
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownPartition { id: id.clone() }.into())
    }

    /// True if `id` has a registered replicator.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.inner.lock().unwrap().contains_key(id)
    }

    /// Number of registered replicators.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Removes and returns every entry; used at replicator teardown.
    pub(crate) fn drain(&self) -> Vec<(NodeId, Arc<PartitionReplicator>)> {
        self.inner.lock().unwrap().drain().collect()
    }
}
