//! Error types for the identity registries.

use thiserror::Error;

use crate::model::NodeId;

/// Identity errors: protocol or programming violations around the shared
/// registries. All fail fast and are non-recoverable locally — a duplicate
/// or missing identity means the two sides have diverged or the wiring is
/// wrong, and retrying cannot fix either.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registering a node id that is already registered.
    #[error("node id {id} is already registered")]
    DuplicateNodeId { id: NodeId },

    /// Looking up or unregistering a node id that is not registered.
    #[error("node id {id} is not registered")]
    UnknownNodeId { id: NodeId },

    /// Registering a partition replicator for an id that already has one.
    #[error("partition {id} already has a replicator")]
    DuplicatePartitionReplicator { id: NodeId },

    /// Looking up a partition id with no registered replicator.
    #[error("partition {id} has no registered replicator")]
    UnknownPartition { id: NodeId },
}

impl RegistryError {
    /// Check if this error indicates a missing identity.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::UnknownNodeId { .. } | RegistryError::UnknownPartition { .. }
        )
    }

    /// Check if this error indicates a duplicate identity.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            RegistryError::DuplicateNodeId { .. }
                | RegistryError::DuplicatePartitionReplicator { .. }
        )
    }

    /// The offending id.
    pub fn id(&self) -> &NodeId {
        match self {
            RegistryError::DuplicateNodeId { id }
            | RegistryError::UnknownNodeId { id }
            | RegistryError::DuplicatePartitionReplicator { id }
            | RegistryError::UnknownPartition { id } => id,
        }
    }
}

impl From<RegistryError> for crate::Error {
    fn from(err: RegistryError) -> Self {
        crate::Error::Registry(err)
    }
}
