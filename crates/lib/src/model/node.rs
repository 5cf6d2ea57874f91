//! Node handles and detached node records.
//!
//! A [`Node`] is a cheap-clone handle onto one element of a partition tree.
//! Nodes own their children (containments) and annotations, hold scalar
//! properties, and point at other nodes through non-owning references.
//!
//! A [`NodeRecord`] is a detached, serializable deep snapshot of a subtree.
//! Records are how freshly created subtrees travel inside notifications:
//! the receiving side instantiates the record into live nodes with the same
//! identities.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock, Weak};

use serde::{Deserialize, Serialize};

use super::NodeId;
use super::errors::ModelError;

/// Scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Detached deep snapshot of a node subtree.
///
/// Record equality is structural, which makes records the unit of
/// "structurally equal partition" assertions in tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub containments: BTreeMap<String, Vec<NodeRecord>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, Vec<NodeId>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<NodeRecord>,
}

impl NodeRecord {
    /// Creates an empty record with the given id.
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            properties: BTreeMap::new(),
            containments: BTreeMap::new(),
            references: BTreeMap::new(),
            annotations: Vec::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Builder-style child appender.
    pub fn with_child(mut self, containment: impl Into<String>, child: NodeRecord) -> Self {
        self.containments.entry(containment.into()).or_default().push(child);
        self
    }

    /// Builder-style annotation appender.
    pub fn with_annotation(mut self, annotation: NodeRecord) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Builder-style reference appender.
    pub fn with_reference(mut self, reference: impl Into<String>, target: impl Into<NodeId>) -> Self {
        self.references.entry(reference.into()).or_default().push(target.into());
        self
    }

    /// All node ids contained in this record, depth-first.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids(&self, out: &mut Vec<NodeId>) {
        out.push(self.id.clone());
        for children in self.containments.values() {
            for child in children {
                child.collect_ids(out);
            }
        }
        for annotation in &self.annotations {
            annotation.collect_ids(out);
        }
    }

    /// Instantiates the record into a live, detached node subtree.
    ///
    /// Fails if the record carries the same id more than once.
    pub fn instantiate(&self) -> std::result::Result<Node, ModelError> {
        let mut seen = HashSet::new();
        for id in self.ids() {
            if !seen.insert(id.clone()) {
                return Err(ModelError::DuplicateIdInRecord { id });
            }
        }
        Ok(self.build())
    }

    fn build(&self) -> Node {
        let node = Node::new(self.id.clone());
        {
            let mut inner = node.inner.write().unwrap();
            inner.properties = self.properties.clone();
            inner.references = self.references.clone();
        }
        for (containment, children) in &self.containments {
            for child in children {
                let built = child.build();
                built.set_parent(Some(&node));
                node.inner
                    .write()
                    .unwrap()
                    .containments
                    .entry(containment.clone())
                    .or_default()
                    .push(built);
            }
        }
        for annotation in &self.annotations {
            let built = annotation.build();
            built.set_parent(Some(&node));
            node.inner.write().unwrap().annotations.push(built);
        }
        node
    }
}

#[derive(Debug, Default)]
struct NodeInner {
    id: NodeId,
    parent: Option<Weak<RwLock<NodeInner>>>,
    properties: BTreeMap<String, PropertyValue>,
    containments: BTreeMap<String, Vec<Node>>,
    references: BTreeMap<String, Vec<NodeId>>,
    annotations: Vec<Node>,
}

/// Handle onto one live node of a partition tree.
///
/// Handles are cheap to clone and compare by identity via [`Node::same`].
/// All structural mutation goes through [`Partition`](super::Partition) so
/// that every change raises exactly one notification; the accessors here
/// are read-only.
#[derive(Clone)]
pub struct Node {
    inner: Arc<RwLock<NodeInner>>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("id", &self.id()).finish()
    }
}

impl Node {
    /// Creates a fresh detached node.
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(NodeInner {
                id: id.into(),
                ..NodeInner::default()
            })),
        }
    }

    /// The node's identity.
    pub fn id(&self) -> NodeId {
        self.inner.read().unwrap().id.clone()
    }

    /// Identity comparison of handles.
    pub fn same(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The containing parent, if attached.
    pub fn parent(&self) -> Option<Node> {
        let inner = self.inner.read().unwrap();
        inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Node { inner })
    }

    /// Walks parent links up to the tree root.
    pub fn root(&self) -> Node {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Reads one property.
    pub fn property(&self, key: &str) -> Option<PropertyValue> {
        self.inner.read().unwrap().properties.get(key).cloned()
    }

    /// Children of one containment, in order.
    pub fn children(&self, containment: &str) -> Vec<Node> {
        self.inner
            .read()
            .unwrap()
            .containments
            .get(containment)
            .cloned()
            .unwrap_or_default()
    }

    /// Annotations, in order.
    pub fn annotations(&self) -> Vec<Node> {
        self.inner.read().unwrap().annotations.clone()
    }

    /// Reference targets of one reference feature, in order.
    pub fn references(&self, reference: &str) -> Vec<NodeId> {
        self.inner
            .read()
            .unwrap()
            .references
            .get(reference)
            .cloned()
            .unwrap_or_default()
    }

    /// This node plus every contained descendant and annotation, depth-first.
    pub fn descendants(&self) -> Vec<Node> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants(&self, out: &mut Vec<Node>) {
        out.push(self.clone());
        let (containments, annotations) = {
            let inner = self.inner.read().unwrap();
            (inner.containments.clone(), inner.annotations.clone())
        };
        for children in containments.values() {
            for child in children {
                child.collect_descendants(out);
            }
        }
        for annotation in &annotations {
            annotation.collect_descendants(out);
        }
    }

    /// Deep snapshot of this subtree.
    pub fn to_record(&self) -> NodeRecord {
        let inner = self.inner.read().unwrap();
        NodeRecord {
            id: inner.id.clone(),
            properties: inner.properties.clone(),
            containments: inner
                .containments
                .iter()
                .map(|(name, children)| {
                    (name.clone(), children.iter().map(Node::to_record).collect())
                })
                .collect(),
            references: inner.references.clone(),
            annotations: inner.annotations.iter().map(Node::to_record).collect(),
        }
    }

    // === crate-internal structural mutators ===
    //
    // Called only by Partition, which owns notification emission. Parent
    // links are maintained here so handles can always walk to their root.

    pub(crate) fn set_parent(&self, parent: Option<&Node>) {
        self.inner.write().unwrap().parent = parent.map(|p| Arc::downgrade(&p.inner));
    }

    pub(crate) fn set_property_raw(
        &self,
        key: &str,
        value: PropertyValue,
    ) -> Option<PropertyValue> {
        self.inner
            .write()
            .unwrap()
            .properties
            .insert(key.to_string(), value)
    }

    pub(crate) fn remove_property_raw(&self, key: &str) -> Option<PropertyValue> {
        self.inner.write().unwrap().properties.remove(key)
    }

    pub(crate) fn child_count(&self, containment: &str) -> usize {
        self.inner
            .read()
            .unwrap()
            .containments
            .get(containment)
            .map_or(0, Vec::len)
    }

    pub(crate) fn child_at(&self, containment: &str, index: usize) -> Option<Node> {
        self.inner
            .read()
            .unwrap()
            .containments
            .get(containment)
            .and_then(|children| children.get(index))
            .cloned()
    }

    pub(crate) fn insert_child_raw(&self, containment: &str, index: usize, child: Node) {
        child.set_parent(Some(self));
        self.inner
            .write()
            .unwrap()
            .containments
            .entry(containment.to_string())
            .or_default()
            .insert(index, child);
    }

    pub(crate) fn remove_child_raw(&self, containment: &str, index: usize) -> Node {
        let removed = {
            let mut inner = self.inner.write().unwrap();
            let children = inner
                .containments
                .get_mut(containment)
                .expect("containment present");
            children.remove(index)
        };
        removed.set_parent(None);
        removed
    }

    pub(crate) fn annotation_count(&self) -> usize {
        self.inner.read().unwrap().annotations.len()
    }

    pub(crate) fn annotation_at(&self, index: usize) -> Option<Node> {
        self.inner.read().unwrap().annotations.get(index).cloned()
    }

    pub(crate) fn insert_annotation_raw(&self, index: usize, annotation: Node) {
        annotation.set_parent(Some(self));
        self.inner.write().unwrap().annotations.insert(index, annotation);
    }

    pub(crate) fn remove_annotation_raw(&self, index: usize) -> Node {
        let removed = self.inner.write().unwrap().annotations.remove(index);
        removed.set_parent(None);
        removed
    }

    pub(crate) fn reference_count(&self, reference: &str) -> usize {
        self.inner
            .read()
            .unwrap()
            .references
            .get(reference)
            .map_or(0, Vec::len)
    }

    pub(crate) fn insert_reference_raw(&self, reference: &str, index: usize, target: NodeId) {
        self.inner
            .write()
            .unwrap()
            .references
            .entry(reference.to_string())
            .or_default()
            .insert(index, target);
    }

    pub(crate) fn remove_reference_raw(&self, reference: &str, index: usize) -> NodeId {
        let mut inner = self.inner.write().unwrap();
        let targets = inner
            .references
            .get_mut(reference)
            .expect("reference present");
        targets.remove(index)
    }

    pub(crate) fn set_reference_raw(
        &self,
        reference: &str,
        index: usize,
        target: NodeId,
    ) -> NodeId {
        let mut inner = self.inner.write().unwrap();
        let targets = inner
            .references
            .get_mut(reference)
            .expect("reference present");
        std::mem::replace(&mut targets[index], target)
    }
}
