//! The in-memory tree model: forests, partitions, nodes.
//!
//! A [`Forest`] holds an unordered set of [`Partition`]s; each partition is
//! one tree of [`Node`]s. All mutation goes through `Partition` (or
//! `Forest` for the partition set itself), and every successful mutation
//! raises exactly one notification on the owning broadcaster — replicators
//! subscribe there.
//!
//! Every mutation takes a `correlation: Option<NotificationId>`. Local
//! callers pass `None` and get a freshly minted id; a replicator applying a
//! remote change supplies the id it registered for echo suppression. This
//! externally supplied correlation id is the hook the whole
//! suppression protocol hangs on.

pub mod errors;
mod id;
mod node;

pub use errors::ModelError;
pub use id::NodeId;
pub use node::{Node, NodeRecord, PropertyValue};

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::Result;
use crate::dispatch::{Broadcaster, NotificationReceiver};
use crate::notification::{
    Notification, NotificationBody, NotificationId, NotificationIdSource,
};

struct PartitionInner {
    root: Node,
    broadcaster: Broadcaster,
    ids: NotificationIdSource,
}

/// One independently addressable node tree.
///
/// Cheap-clone handle. The partition's id is its root node's id.
#[derive(Clone)]
pub struct Partition {
    inner: Arc<PartitionInner>,
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition").field("id", &self.inner.root.id()).finish()
    }
}

impl Partition {
    /// Instantiates a record as a standalone partition.
    pub fn new(record: &NodeRecord) -> Result<Self> {
        Ok(Self::from_node(record.instantiate()?, NotificationIdSource::new()))
    }

    fn from_node(root: Node, ids: NotificationIdSource) -> Self {
        Self {
            inner: Arc::new(PartitionInner {
                root,
                broadcaster: Broadcaster::new(),
                ids,
            }),
        }
    }

    /// The partition's id: its root node's id.
    pub fn id(&self) -> NodeId {
        self.inner.root.id()
    }

    /// The root node.
    pub fn root(&self) -> &Node {
        &self.inner.root
    }

    /// The partition's notification stream.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    /// Deep snapshot of the whole partition.
    pub fn to_record(&self) -> NodeRecord {
        self.inner.root.to_record()
    }

    fn raise(&self, body: NotificationBody, correlation: Option<NotificationId>) -> Result<()> {
        let id = correlation.unwrap_or_else(|| self.inner.ids.mint());
        self.inner.broadcaster.receive(Notification::new(id, body))
    }

    fn ensure_attached(&self, node: &Node) -> Result<()> {
        if node.root().same(&self.inner.root) {
            return Ok(());
        }
        Err(ModelError::NodeNotInPartition {
            node: node.id(),
            partition: self.id(),
        }
        .into())
    }

    fn bounds(&self, node: &Node, feature: &str, index: usize, len: usize) -> Result<()> {
        if index < len {
            return Ok(());
        }
        Err(ModelError::IndexOutOfRange {
            node: node.id(),
            feature: feature.to_string(),
            index,
            len,
        }
        .into())
    }

    fn insert_bounds(&self, node: &Node, feature: &str, index: usize, len: usize) -> Result<()> {
        if index <= len {
            return Ok(());
        }
        Err(ModelError::IndexOutOfRange {
            node: node.id(),
            feature: feature.to_string(),
            index,
            len,
        }
        .into())
    }

    /// A node may not move underneath itself.
    fn ensure_no_cycle(&self, moved: &Node, new_parent: &Node) -> Result<()> {
        let mut current = Some(new_parent.clone());
        while let Some(ancestor) = current {
            if ancestor.same(moved) {
                return Err(ModelError::WouldCreateCycle { node: moved.id() }.into());
            }
            current = ancestor.parent();
        }
        Ok(())
    }

    // === properties ===

    /// Sets a property, raising `PropertyAdded` or `PropertyChanged`.
    pub fn set_property(
        &self,
        node: &Node,
        property: &str,
        value: impl Into<PropertyValue>,
        correlation: Option<NotificationId>,
    ) -> Result<()> {
        self.ensure_attached(node)?;
        let new_value = value.into();
        let old_value = node.set_property_raw(property, new_value.clone());
        let body = match old_value {
            None => NotificationBody::PropertyAdded {
                node: node.id(),
                property: property.to_string(),
                new_value,
            },
            Some(old_value) => NotificationBody::PropertyChanged {
                node: node.id(),
                property: property.to_string(),
                new_value,
                old_value,
            },
        };
        self.raise(body, correlation)
    }

    /// Removes a property, raising `PropertyDeleted`.
    pub fn remove_property(
        &self,
        node: &Node,
        property: &str,
        correlation: Option<NotificationId>,
    ) -> Result<()> {
        self.ensure_attached(node)?;
        let old_value =
            node.remove_property_raw(property)
                .ok_or_else(|| ModelError::PropertyNotFound {
                    node: node.id(),
                    property: property.to_string(),
                })?;
        self.raise(
            NotificationBody::PropertyDeleted {
                node: node.id(),
                property: property.to_string(),
                old_value,
            },
            correlation,
        )
    }

    // === children ===

    /// Instantiates `record` and inserts it, raising `ChildAdded`.
    pub fn add_child(
        &self,
        parent: &Node,
        containment: &str,
        index: usize,
        record: &NodeRecord,
        correlation: Option<NotificationId>,
    ) -> Result<Node> {
        self.ensure_attached(parent)?;
        self.insert_bounds(parent, containment, index, parent.child_count(containment))?;
        let child = record.instantiate()?;
        parent.insert_child_raw(containment, index, child.clone());
        self.raise(
            NotificationBody::ChildAdded {
                parent: parent.id(),
                containment: containment.to_string(),
                index,
                child: record.clone(),
            },
            correlation,
        )?;
        Ok(child)
    }

    /// Removes and detaches one child, raising `ChildDeleted`.
    pub fn remove_child(
        &self,
        parent: &Node,
        containment: &str,
        index: usize,
        correlation: Option<NotificationId>,
    ) -> Result<Node> {
        self.ensure_attached(parent)?;
        self.bounds(parent, containment, index, parent.child_count(containment))?;
        let removed = parent.remove_child_raw(containment, index);
        self.raise(
            NotificationBody::ChildDeleted {
                parent: parent.id(),
                containment: containment.to_string(),
                index,
                child: removed.id(),
            },
            correlation,
        )?;
        Ok(removed)
    }

    /// Replaces the child at `index` with a fresh subtree, raising
    /// `ChildReplaced`. Returns the detached old child.
    pub fn replace_child(
        &self,
        parent: &Node,
        containment: &str,
        index: usize,
        record: &NodeRecord,
        correlation: Option<NotificationId>,
    ) -> Result<Node> {
        self.ensure_attached(parent)?;
        self.bounds(parent, containment, index, parent.child_count(containment))?;
        let new_child = record.instantiate()?;
        let old_child = parent.remove_child_raw(containment, index);
        parent.insert_child_raw(containment, index, new_child);
        self.raise(
            NotificationBody::ChildReplaced {
                parent: parent.id(),
                containment: containment.to_string(),
                index,
                new_child: record.clone(),
                replaced: old_child.id(),
            },
            correlation,
        )?;
        Ok(old_child)
    }

    /// Moves a child between containment slots, raising the move variant
    /// matching the source/target relation.
    ///
    /// `new_index` addresses the target containment *after* the child left
    /// its old slot.
    pub fn move_child(
        &self,
        old_parent: &Node,
        old_containment: &str,
        old_index: usize,
        new_parent: &Node,
        new_containment: &str,
        new_index: usize,
        correlation: Option<NotificationId>,
    ) -> Result<()> {
        self.ensure_attached(old_parent)?;
        self.ensure_attached(new_parent)?;
        self.bounds(
            old_parent,
            old_containment,
            old_index,
            old_parent.child_count(old_containment),
        )?;
        let child = old_parent
            .child_at(old_containment, old_index)
            .expect("index within bounds");
        self.ensure_no_cycle(&child, new_parent)?;

        let child = old_parent.remove_child_raw(old_containment, old_index);
        let target_len = new_parent.child_count(new_containment);
        if let Err(err) = self.insert_bounds(new_parent, new_containment, new_index, target_len) {
            // Undo the detach; a failed operation must not mutate.
            old_parent.insert_child_raw(old_containment, old_index, child);
            return Err(err);
        }
        new_parent.insert_child_raw(new_containment, new_index, child.clone());

        let same_parent = old_parent.same(new_parent);
        let body = if same_parent && old_containment == new_containment {
            NotificationBody::ChildMovedInSameContainment {
                child: child.id(),
                parent: new_parent.id(),
                containment: new_containment.to_string(),
                new_index,
                old_index,
            }
        } else if same_parent {
            NotificationBody::ChildMovedFromOtherContainmentInSameParent {
                child: child.id(),
                parent: new_parent.id(),
                new_containment: new_containment.to_string(),
                new_index,
                old_containment: old_containment.to_string(),
                old_index,
            }
        } else {
            NotificationBody::ChildMovedFromOtherContainment {
                child: child.id(),
                new_parent: new_parent.id(),
                new_containment: new_containment.to_string(),
                new_index,
                old_parent: old_parent.id(),
                old_containment: old_containment.to_string(),
                old_index,
            }
        };
        self.raise(body, correlation)
    }

    /// Moves a child onto an occupied slot, evicting the occupant.
    ///
    /// Raises the matching `ChildMovedAndReplaced…` variant and returns the
    /// detached evicted child.
    pub fn move_child_replacing(
        &self,
        old_parent: &Node,
        old_containment: &str,
        old_index: usize,
        new_parent: &Node,
        new_containment: &str,
        new_index: usize,
        correlation: Option<NotificationId>,
    ) -> Result<Node> {
        self.ensure_attached(old_parent)?;
        self.ensure_attached(new_parent)?;
        self.bounds(
            old_parent,
            old_containment,
            old_index,
            old_parent.child_count(old_containment),
        )?;

        let same_parent = old_parent.same(new_parent);
        let same_slot_list = same_parent && old_containment == new_containment;
        // After the child leaves its old slot the target list may be one
        // shorter; the occupant must still be there to evict.
        let target_len = new_parent.child_count(new_containment) - usize::from(same_slot_list);
        self.bounds(new_parent, new_containment, new_index, target_len)?;
        let moved = old_parent
            .child_at(old_containment, old_index)
            .expect("index within bounds");
        self.ensure_no_cycle(&moved, new_parent)?;

        let child = old_parent.remove_child_raw(old_containment, old_index);
        let replaced = new_parent.remove_child_raw(new_containment, new_index);
        new_parent.insert_child_raw(new_containment, new_index, child.clone());

        let body = if same_slot_list {
            NotificationBody::ChildMovedAndReplacedInSameContainment {
                child: child.id(),
                parent: new_parent.id(),
                containment: new_containment.to_string(),
                new_index,
                old_index,
                replaced: replaced.id(),
            }
        } else if same_parent {
            NotificationBody::ChildMovedAndReplacedFromOtherContainmentInSameParent {
                child: child.id(),
                parent: new_parent.id(),
                new_containment: new_containment.to_string(),
                new_index,
                old_containment: old_containment.to_string(),
                old_index,
                replaced: replaced.id(),
            }
        } else {
            NotificationBody::ChildMovedAndReplacedFromOtherContainment {
                child: child.id(),
                new_parent: new_parent.id(),
                new_containment: new_containment.to_string(),
                new_index,
                old_parent: old_parent.id(),
                old_containment: old_containment.to_string(),
                old_index,
                replaced: replaced.id(),
            }
        };
        self.raise(body, correlation)?;
        Ok(replaced)
    }

    // === annotations ===

    /// Instantiates `record` as an annotation, raising `AnnotationAdded`.
    pub fn add_annotation(
        &self,
        parent: &Node,
        index: usize,
        record: &NodeRecord,
        correlation: Option<NotificationId>,
    ) -> Result<Node> {
        self.ensure_attached(parent)?;
        self.insert_bounds(parent, "annotations", index, parent.annotation_count())?;
        let annotation = record.instantiate()?;
        parent.insert_annotation_raw(index, annotation.clone());
        self.raise(
            NotificationBody::AnnotationAdded {
                parent: parent.id(),
                index,
                annotation: record.clone(),
            },
            correlation,
        )?;
        Ok(annotation)
    }

    /// Removes and detaches one annotation, raising `AnnotationDeleted`.
    pub fn remove_annotation(
        &self,
        parent: &Node,
        index: usize,
        correlation: Option<NotificationId>,
    ) -> Result<Node> {
        self.ensure_attached(parent)?;
        self.bounds(parent, "annotations", index, parent.annotation_count())?;
        let removed = parent.remove_annotation_raw(index);
        self.raise(
            NotificationBody::AnnotationDeleted {
                parent: parent.id(),
                index,
                annotation: removed.id(),
            },
            correlation,
        )?;
        Ok(removed)
    }

    /// Moves an annotation between hosts, raising the matching variant.
    pub fn move_annotation(
        &self,
        old_parent: &Node,
        old_index: usize,
        new_parent: &Node,
        new_index: usize,
        correlation: Option<NotificationId>,
    ) -> Result<()> {
        self.ensure_attached(old_parent)?;
        self.ensure_attached(new_parent)?;
        self.bounds(old_parent, "annotations", old_index, old_parent.annotation_count())?;
        let moved = old_parent
            .annotation_at(old_index)
            .expect("index within bounds");
        self.ensure_no_cycle(&moved, new_parent)?;

        let annotation = old_parent.remove_annotation_raw(old_index);
        if let Err(err) =
            self.insert_bounds(new_parent, "annotations", new_index, new_parent.annotation_count())
        {
            old_parent.insert_annotation_raw(old_index, annotation);
            return Err(err);
        }
        new_parent.insert_annotation_raw(new_index, annotation.clone());

        let body = if old_parent.same(new_parent) {
            NotificationBody::AnnotationMovedInSameParent {
                annotation: annotation.id(),
                parent: new_parent.id(),
                new_index,
                old_index,
            }
        } else {
            NotificationBody::AnnotationMovedFromOtherParent {
                annotation: annotation.id(),
                new_parent: new_parent.id(),
                new_index,
                old_parent: old_parent.id(),
                old_index,
            }
        };
        self.raise(body, correlation)
    }

    // === references ===

    /// Inserts a reference target, raising `ReferenceAdded`.
    pub fn add_reference(
        &self,
        node: &Node,
        reference: &str,
        index: usize,
        target: NodeId,
        correlation: Option<NotificationId>,
    ) -> Result<()> {
        self.ensure_attached(node)?;
        self.insert_bounds(node, reference, index, node.reference_count(reference))?;
        node.insert_reference_raw(reference, index, target.clone());
        self.raise(
            NotificationBody::ReferenceAdded {
                node: node.id(),
                reference: reference.to_string(),
                index,
                target,
            },
            correlation,
        )
    }

    /// Removes a reference target, raising `ReferenceDeleted`.
    pub fn remove_reference(
        &self,
        node: &Node,
        reference: &str,
        index: usize,
        correlation: Option<NotificationId>,
    ) -> Result<NodeId> {
        self.ensure_attached(node)?;
        self.bounds(node, reference, index, node.reference_count(reference))?;
        let target = node.remove_reference_raw(reference, index);
        self.raise(
            NotificationBody::ReferenceDeleted {
                node: node.id(),
                reference: reference.to_string(),
                index,
                target: target.clone(),
            },
            correlation,
        )?;
        Ok(target)
    }

    /// Retargets one reference slot, raising `ReferenceChanged`.
    pub fn set_reference(
        &self,
        node: &Node,
        reference: &str,
        index: usize,
        target: NodeId,
        correlation: Option<NotificationId>,
    ) -> Result<NodeId> {
        self.ensure_attached(node)?;
        self.bounds(node, reference, index, node.reference_count(reference))?;
        let old_target = node.set_reference_raw(reference, index, target.clone());
        self.raise(
            NotificationBody::ReferenceChanged {
                node: node.id(),
                reference: reference.to_string(),
                index,
                new_target: target,
                old_target: old_target.clone(),
            },
            correlation,
        )?;
        Ok(old_target)
    }

    /// Bulk-replaces a reference feature's whole target list.
    ///
    /// Diffs old against new targets with the edit-script engine and raises
    /// one fine-grained reference notification per change, in replay order.
    /// Local-only convenience; each notification mints its own id.
    pub fn replace_references(
        &self,
        node: &Node,
        reference: &str,
        targets: Vec<NodeId>,
    ) -> Result<()> {
        use crate::diff::{ListChange, changes};

        self.ensure_attached(node)?;
        let current = node.references(reference);
        for change in changes(&current, &targets) {
            match change {
                ListChange::Added {
                    element,
                    right_index,
                } => {
                    self.add_reference(node, reference, right_index, element, None)?;
                }
                ListChange::Deleted { left_index, .. } => {
                    self.remove_reference(node, reference, left_index, None)?;
                }
                ListChange::Replaced { index, right, .. } => {
                    self.set_reference(node, reference, index, right, None)?;
                }
                ListChange::Moved {
                    left_index,
                    right_index,
                    right,
                    ..
                } => {
                    // A reference list move is a delete plus an insert of
                    // the same target; raise it as that pair.
                    self.remove_reference(node, reference, left_index, None)?;
                    self.add_reference(node, reference, right_index, right, None)?;
                }
            }
        }
        Ok(())
    }

    /// Bulk-replaces a containment's whole child list.
    ///
    /// Children are diffed by node id: surviving ids turn into moves,
    /// everything else into fine-grained add/delete notifications, in
    /// replay order.
    pub fn replace_children(
        &self,
        parent: &Node,
        containment: &str,
        records: Vec<NodeRecord>,
    ) -> Result<()> {
        use crate::diff::{ListChange, changes_by};

        self.ensure_attached(parent)?;
        let current: Vec<NodeId> = parent
            .children(containment)
            .iter()
            .map(Node::id)
            .collect();
        let incoming: Vec<NodeId> = records.iter().map(|record| record.id.clone()).collect();
        let script = changes_by(&current, &incoming, |a, b| a == b);

        for change in script {
            match change {
                ListChange::Added { element, right_index } => {
                    let record = records
                        .iter()
                        .find(|record| record.id == element)
                        .expect("record for added id");
                    self.add_child(parent, containment, right_index, record, None)?;
                }
                ListChange::Deleted { left_index, .. } => {
                    self.remove_child(parent, containment, left_index, None)?;
                }
                ListChange::Replaced { index, right, .. } => {
                    let record = records
                        .iter()
                        .find(|record| record.id == right)
                        .expect("record for replacement id");
                    self.replace_child(parent, containment, index, record, None)?;
                }
                ListChange::Moved {
                    left_index,
                    right_index,
                    ..
                } => {
                    self.move_child(
                        parent,
                        containment,
                        left_index,
                        parent,
                        containment,
                        right_index,
                        None,
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct ForestInner {
    partitions: Mutex<BTreeMap<NodeId, Partition>>,
    broadcaster: Broadcaster,
    ids: NotificationIdSource,
}

/// An unordered set of partitions with a forest-level notification stream.
///
/// The forest stream carries only `PartitionAdded`/`PartitionDeleted`;
/// changes inside a partition flow through that partition's own stream.
#[derive(Clone, Default)]
pub struct Forest {
    inner: Arc<ForestInner>,
}

/// Non-owning handle to a [`Forest`].
///
/// Replication internals observing a forest hold weak handles so a forest
/// and its observers never keep each other alive.
#[derive(Clone)]
pub struct WeakForest {
    inner: std::sync::Weak<ForestInner>,
}

impl WeakForest {
    /// The forest, if it is still alive.
    pub fn upgrade(&self) -> Option<Forest> {
        self.inner.upgrade().map(|inner| Forest { inner })
    }
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// A non-owning handle to this forest.
    pub fn downgrade(&self) -> WeakForest {
        WeakForest {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The forest's notification stream.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    /// Current partitions, in id order.
    pub fn partitions(&self) -> Vec<Partition> {
        self.inner.partitions.lock().unwrap().values().cloned().collect()
    }

    /// Looks up one partition by id.
    pub fn partition(&self, id: &NodeId) -> Option<Partition> {
        self.inner.partitions.lock().unwrap().get(id).cloned()
    }

    /// Instantiates `record` as a new partition, raising `PartitionAdded`.
    ///
    /// Partitions created through one forest share its id source, so every
    /// locally raised notification on this side carries the same id base.
    pub fn add_partition(
        &self,
        record: &NodeRecord,
        correlation: Option<NotificationId>,
    ) -> Result<Partition> {
        let partition = Partition::from_node(record.instantiate()?, self.inner.ids.clone());
        {
            let mut partitions = self.inner.partitions.lock().unwrap();
            if partitions.contains_key(&record.id) {
                return Err(ModelError::DuplicatePartition {
                    id: record.id.clone(),
                }
                .into());
            }
            partitions.insert(record.id.clone(), partition.clone());
        }
        tracing::debug!(partition = %record.id, "partition added");
        let id = correlation.unwrap_or_else(|| self.inner.ids.mint());
        self.inner.broadcaster.receive(Notification::new(
            id,
            NotificationBody::PartitionAdded {
                partition: record.clone(),
            },
        ))?;
        Ok(partition)
    }

    /// Removes a partition, raising `PartitionDeleted`.
    pub fn remove_partition(
        &self,
        id: &NodeId,
        correlation: Option<NotificationId>,
    ) -> Result<Partition> {
        let removed = {
            let mut partitions = self.inner.partitions.lock().unwrap();
            partitions
                .remove(id)
                .ok_or_else(|| ModelError::UnknownPartition { id: id.clone() })?
        };
        tracing::debug!(partition = %id, "partition deleted");
        let notification_id = correlation.unwrap_or_else(|| self.inner.ids.mint());
        self.inner.broadcaster.receive(Notification::new(
            notification_id,
            NotificationBody::PartitionDeleted {
                partition: id.clone(),
            },
        ))?;
        Ok(removed)
    }
}
