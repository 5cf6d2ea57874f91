//!
//! Grove: replicated tree-model synchronization.
//! This library keeps independent copies of a typed, tree-shaped model in
//! sync by propagating fine-grained change notifications through a
//! pipeline and replaying them remotely — without echo loops, and with
//! node identity preserved across the boundary.
//!
//! ## Core Concepts
//!
//! * **Nodes, Partitions, Forests (`model`)**: the in-memory tree model. A
//!   `Node` owns children and annotations, holds scalar properties, and
//!   points at other nodes through references; a `Partition` is one tree;
//!   a `Forest` is an unordered set of partitions. Every mutation raises
//!   exactly one notification and accepts an externally supplied
//!   correlation id.
//! * **Notifications (`notification`)**: a closed tagged union of change
//!   payloads, each carrying a correlation id minted by a
//!   `NotificationIdSource`.
//! * **Dispatch (`dispatch`)**: type-scoped publish/subscribe
//!   (`Broadcaster`) and chainable pipeline stages, synchronous and
//!   call-stack-based.
//! * **Registries (`registry`)**: `SharedNodeMap` (node id → node) and
//!   `SharedPartitionReplicatorMap` (partition id → replicator), kept in
//!   step by the local replicators and consulted by the remote ones.
//! * **Compositing (`compose`)**: batching all notifications of one
//!   logical operation into a single composite unit.
//! * **Replication (`replicate`)**: the local/remote replicator pair with
//!   its echo-suppression and identity-correlation protocol.
//! * **Diffing (`diff`)**: the ordered-sequence edit-script engine
//!   (Hirschberg alignment, move detection, replay normalization) behind
//!   every bulk replace of a multi-valued feature.
//!
//! Everything is single-threaded and synchronous: a mutation runs the
//! whole pipeline on the caller's stack before returning. Callers
//! serialize access per forest; independent forests may live on
//! different threads.

pub mod compose;
pub mod diff;
pub mod dispatch;
pub mod model;
pub mod notification;
pub mod registry;
pub mod replicate;

pub use model::{Forest, Node, NodeId, NodeRecord, Partition, PropertyValue};
pub use notification::{Notification, NotificationClass, NotificationId, NotificationKind};
pub use replicate::{ForestNotificationReplicator, PartitionNotificationReplicator};

/// Result type used throughout the Grove library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Grove library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured dispatch errors from the dispatch module
    #[error(transparent)]
    Dispatch(dispatch::DispatchError),

    /// Structured model errors from the model module
    #[error(transparent)]
    Model(model::ModelError),

    /// Structured identity errors from the registry module
    #[error(transparent)]
    Registry(registry::RegistryError),

    /// Structured replication errors from the replicate module
    #[error(transparent)]
    Replicate(replicate::ReplicateError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Dispatch(_) => "dispatch",
            Error::Model(_) => "model",
            Error::Registry(_) => "registry",
            Error::Replicate(_) => "replicate",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Model(model_err) => model_err.is_not_found(),
            Error::Registry(registry_err) => registry_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates a duplicate identity.
    pub fn is_duplicate(&self) -> bool {
        match self {
            Error::Model(model_err) => model_err.is_duplicate(),
            Error::Registry(registry_err) => registry_err.is_duplicate(),
            _ => false,
        }
    }

    /// Check if this error is an identity error (registry violation).
    pub fn is_identity_error(&self) -> bool {
        matches!(self, Error::Registry(_))
    }

    /// Check if this error names an unsupported notification kind.
    pub fn is_unsupported(&self) -> bool {
        match self {
            Error::Replicate(replicate_err) => replicate_err.is_unsupported(),
            _ => false,
        }
    }

    /// Check if this error is a construction invariant violation.
    pub fn is_construction_error(&self) -> bool {
        match self {
            Error::Dispatch(dispatch_err) => dispatch_err.is_construction_error(),
            _ => false,
        }
    }
}
