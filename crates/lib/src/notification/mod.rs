//! Typed change notifications.
//!
//! A [`Notification`] describes one atomic model change: an immutable
//! payload ([`NotificationBody`]) plus a mutable correlation id. Payloads
//! reference existing nodes by [`NodeId`] and carry freshly created
//! subtrees as [`NodeRecord`]s, so a receiving side can resolve every
//! identity through its node map and instantiate new structure with the
//! original ids.
//!
//! The variant set is closed; [`NotificationKind`] and
//! [`NotificationClass`] enumerate it for subscription matching.

mod id;
mod kind;

pub use id::{NotificationId, NotificationIdSource};
pub use kind::{NotificationClass, NotificationKind};

use serde::{Deserialize, Serialize};

use crate::model::{NodeId, NodeRecord, PropertyValue};

/// One atomic model change with its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    id: NotificationId,
    body: NotificationBody,
}

impl Notification {
    /// Pairs a body with its correlation id.
    pub fn new(id: NotificationId, body: NotificationBody) -> Self {
        Self { id, body }
    }

    /// The correlation id.
    pub fn id(&self) -> &NotificationId {
        &self.id
    }

    /// Replaces the correlation id.
    ///
    /// Used by the rewriting echo filter to restore a remote origin id
    /// before forwarding; the payload never changes.
    pub fn set_id(&mut self, id: NotificationId) {
        self.id = id;
    }

    /// The payload.
    pub fn body(&self) -> &NotificationBody {
        &self.body
    }

    /// The concrete variant kind.
    pub fn kind(&self) -> NotificationKind {
        self.body.kind()
    }

    /// Parts of a composite, or `None` for plain notifications.
    pub fn parts(&self) -> Option<&[Notification]> {
        match &self.body {
            NotificationBody::Composite { parts } => Some(parts),
            _ => None,
        }
    }

    /// Consumes the notification into its body.
    pub fn into_body(self) -> NotificationBody {
        self.body
    }

    /// The node the change happens *on*: the mutated node for property and
    /// reference changes, the (old) parent for structural ones.
    ///
    /// This node is guaranteed to exist on a synchronized remote side
    /// before the notification applies, which is what inbound routing
    /// resolves through the node map. Forest-scoped and composite
    /// notifications have no single subject.
    pub fn subject(&self) -> Option<&NodeId> {
        use NotificationBody::*;
        match &self.body {
            PropertyAdded { node, .. }
            | PropertyDeleted { node, .. }
            | PropertyChanged { node, .. }
            | ReferenceAdded { node, .. }
            | ReferenceDeleted { node, .. }
            | ReferenceChanged { node, .. } => Some(node),
            ChildAdded { parent, .. }
            | ChildDeleted { parent, .. }
            | ChildReplaced { parent, .. } => Some(parent),
            ChildMovedFromOtherContainment { old_parent, .. }
            | ChildMovedAndReplacedFromOtherContainment { old_parent, .. } => Some(old_parent),
            ChildMovedFromOtherContainmentInSameParent { parent, .. }
            | ChildMovedInSameContainment { parent, .. }
            | ChildMovedAndReplacedFromOtherContainmentInSameParent { parent, .. }
            | ChildMovedAndReplacedInSameContainment { parent, .. } => Some(parent),
            AnnotationAdded { parent, .. } | AnnotationDeleted { parent, .. } => Some(parent),
            AnnotationMovedFromOtherParent { old_parent, .. } => Some(old_parent),
            AnnotationMovedInSameParent { parent, .. } => Some(parent),
            PartitionAdded { .. } | PartitionDeleted { .. } | Composite { .. } => None,
        }
    }
}

/// The closed tagged union of change payloads.
///
/// Indices are positions within the named feature (containment, annotation
/// list, or reference feature) at the time the change applied. Freshly
/// created structure travels as [`NodeRecord`]; everything else is by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationBody {
    PropertyAdded {
        node: NodeId,
        property: String,
        new_value: PropertyValue,
    },
    PropertyDeleted {
        node: NodeId,
        property: String,
        old_value: PropertyValue,
    },
    PropertyChanged {
        node: NodeId,
        property: String,
        new_value: PropertyValue,
        old_value: PropertyValue,
    },
    ChildAdded {
        parent: NodeId,
        containment: String,
        index: usize,
        child: NodeRecord,
    },
    ChildDeleted {
        parent: NodeId,
        containment: String,
        index: usize,
        child: NodeId,
    },
    ChildReplaced {
        parent: NodeId,
        containment: String,
        index: usize,
        new_child: NodeRecord,
        replaced: NodeId,
    },
    ChildMovedFromOtherContainment {
        child: NodeId,
        new_parent: NodeId,
        new_containment: String,
        new_index: usize,
        old_parent: NodeId,
        old_containment: String,
        old_index: usize,
    },
    ChildMovedFromOtherContainmentInSameParent {
        child: NodeId,
        parent: NodeId,
        new_containment: String,
        new_index: usize,
        old_containment: String,
        old_index: usize,
    },
    ChildMovedInSameContainment {
        child: NodeId,
        parent: NodeId,
        containment: String,
        new_index: usize,
        old_index: usize,
    },
    ChildMovedAndReplacedFromOtherContainment {
        child: NodeId,
        new_parent: NodeId,
        new_containment: String,
        new_index: usize,
        old_parent: NodeId,
        old_containment: String,
        old_index: usize,
        replaced: NodeId,
    },
    ChildMovedAndReplacedFromOtherContainmentInSameParent {
        child: NodeId,
        parent: NodeId,
        new_containment: String,
        new_index: usize,
        old_containment: String,
        old_index: usize,
        replaced: NodeId,
    },
    ChildMovedAndReplacedInSameContainment {
        child: NodeId,
        parent: NodeId,
        containment: String,
        new_index: usize,
        old_index: usize,
        replaced: NodeId,
    },
    AnnotationAdded {
        parent: NodeId,
        index: usize,
        annotation: NodeRecord,
    },
    AnnotationDeleted {
        parent: NodeId,
        index: usize,
        annotation: NodeId,
    },
    AnnotationMovedFromOtherParent {
        annotation: NodeId,
        new_parent: NodeId,
        new_index: usize,
        old_parent: NodeId,
        old_index: usize,
    },
    AnnotationMovedInSameParent {
        annotation: NodeId,
        parent: NodeId,
        new_index: usize,
        old_index: usize,
    },
    ReferenceAdded {
        node: NodeId,
        reference: String,
        index: usize,
        target: NodeId,
    },
    ReferenceDeleted {
        node: NodeId,
        reference: String,
        index: usize,
        target: NodeId,
    },
    ReferenceChanged {
        node: NodeId,
        reference: String,
        index: usize,
        new_target: NodeId,
        old_target: NodeId,
    },
    PartitionAdded {
        partition: NodeRecord,
    },
    PartitionDeleted {
        partition: NodeId,
    },
    /// All notifications of one logical operation, in raise order.
    /// Parts retain their own ids.
    Composite {
        parts: Vec<Notification>,
    },
}

impl NotificationBody {
    /// The concrete variant kind.
    pub fn kind(&self) -> NotificationKind {
        use NotificationKind as K;
        match self {
            NotificationBody::PropertyAdded { .. } => K::PropertyAdded,
            NotificationBody::PropertyDeleted { .. } => K::PropertyDeleted,
            NotificationBody::PropertyChanged { .. } => K::PropertyChanged,
            NotificationBody::ChildAdded { .. } => K::ChildAdded,
            NotificationBody::ChildDeleted { .. } => K::ChildDeleted,
            NotificationBody::ChildReplaced { .. } => K::ChildReplaced,
            NotificationBody::ChildMovedFromOtherContainment { .. } => {
                K::ChildMovedFromOtherContainment
            }
            NotificationBody::ChildMovedFromOtherContainmentInSameParent { .. } => {
                K::ChildMovedFromOtherContainmentInSameParent
            }
            NotificationBody::ChildMovedInSameContainment { .. } => K::ChildMovedInSameContainment,
            NotificationBody::ChildMovedAndReplacedFromOtherContainment { .. } => {
                K::ChildMovedAndReplacedFromOtherContainment
            }
            NotificationBody::ChildMovedAndReplacedFromOtherContainmentInSameParent { .. } => {
                K::ChildMovedAndReplacedFromOtherContainmentInSameParent
            }
            NotificationBody::ChildMovedAndReplacedInSameContainment { .. } => {
                K::ChildMovedAndReplacedInSameContainment
            }
            NotificationBody::AnnotationAdded { .. } => K::AnnotationAdded,
            NotificationBody::AnnotationDeleted { .. } => K::AnnotationDeleted,
            NotificationBody::AnnotationMovedFromOtherParent { .. } => {
                K::AnnotationMovedFromOtherParent
            }
            NotificationBody::AnnotationMovedInSameParent { .. } => K::AnnotationMovedInSameParent,
            NotificationBody::ReferenceAdded { .. } => K::ReferenceAdded,
            NotificationBody::ReferenceDeleted { .. } => K::ReferenceDeleted,
            NotificationBody::ReferenceChanged { .. } => K::ReferenceChanged,
            NotificationBody::PartitionAdded { .. } => K::PartitionAdded,
            NotificationBody::PartitionDeleted { .. } => K::PartitionDeleted,
            NotificationBody::Composite { .. } => K::Composite,
        }
    }
}
