//! The closed set of notification variants and their subtype lattice.
//!
//! The variant set is fixed at compile time, so the "is assignable to"
//! relation used by subscription matching is a pair of small enums and
//! static tables rather than any runtime type discovery. A
//! [`NotificationKind`] names one concrete variant; a [`NotificationClass`]
//! names a set of kinds a subscriber can register interest in.

use serde::{Deserialize, Serialize};

/// Concrete notification variant, one per [`NotificationBody`] arm.
///
/// [`NotificationBody`]: super::NotificationBody
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    PropertyAdded,
    PropertyDeleted,
    PropertyChanged,
    ChildAdded,
    ChildDeleted,
    ChildReplaced,
    ChildMovedFromOtherContainment,
    ChildMovedFromOtherContainmentInSameParent,
    ChildMovedInSameContainment,
    ChildMovedAndReplacedFromOtherContainment,
    ChildMovedAndReplacedFromOtherContainmentInSameParent,
    ChildMovedAndReplacedInSameContainment,
    AnnotationAdded,
    AnnotationDeleted,
    AnnotationMovedFromOtherParent,
    AnnotationMovedInSameParent,
    ReferenceAdded,
    ReferenceDeleted,
    ReferenceChanged,
    PartitionAdded,
    PartitionDeleted,
    Composite,
}

impl NotificationKind {
    /// Every concrete kind, in declaration order.
    pub const ALL: [NotificationKind; 22] = [
        NotificationKind::PropertyAdded,
        NotificationKind::PropertyDeleted,
        NotificationKind::PropertyChanged,
        NotificationKind::ChildAdded,
        NotificationKind::ChildDeleted,
        NotificationKind::ChildReplaced,
        NotificationKind::ChildMovedFromOtherContainment,
        NotificationKind::ChildMovedFromOtherContainmentInSameParent,
        NotificationKind::ChildMovedInSameContainment,
        NotificationKind::ChildMovedAndReplacedFromOtherContainment,
        NotificationKind::ChildMovedAndReplacedFromOtherContainmentInSameParent,
        NotificationKind::ChildMovedAndReplacedInSameContainment,
        NotificationKind::AnnotationAdded,
        NotificationKind::AnnotationDeleted,
        NotificationKind::AnnotationMovedFromOtherParent,
        NotificationKind::AnnotationMovedInSameParent,
        NotificationKind::ReferenceAdded,
        NotificationKind::ReferenceDeleted,
        NotificationKind::ReferenceChanged,
        NotificationKind::PartitionAdded,
        NotificationKind::PartitionDeleted,
        NotificationKind::Composite,
    ];

    /// Index into per-kind tables such as subscription counters.
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// True for kinds describing a change inside one partition.
    pub fn is_partition_scoped(self) -> bool {
        use NotificationKind::*;
        !matches!(self, PartitionAdded | PartitionDeleted | Composite)
    }

    /// True for kinds describing a change to the forest's partition set.
    pub fn is_forest_scoped(self) -> bool {
        matches!(
            self,
            NotificationKind::PartitionAdded | NotificationKind::PartitionDeleted
        )
    }

    /// The classes this kind is assignable to, most specific first.
    ///
    /// This is the precomputed variant → ancestors relation: itself, its
    /// feature family, its scope, and the root class.
    pub fn ancestors(self) -> Vec<NotificationClass> {
        use NotificationClass as C;
        let mut out = vec![C::Exactly(self)];
        if let Some(family) = self.family() {
            out.push(family);
        }
        if self.is_partition_scoped() {
            out.push(C::Partition);
        }
        if self.is_forest_scoped() {
            out.push(C::Forest);
        }
        out.push(C::All);
        out
    }

    fn family(self) -> Option<NotificationClass> {
        use NotificationKind::*;
        match self {
            PropertyAdded | PropertyDeleted | PropertyChanged => Some(NotificationClass::Property),
            ChildAdded
            | ChildDeleted
            | ChildReplaced
            | ChildMovedFromOtherContainment
            | ChildMovedFromOtherContainmentInSameParent
            | ChildMovedInSameContainment
            | ChildMovedAndReplacedFromOtherContainment
            | ChildMovedAndReplacedFromOtherContainmentInSameParent
            | ChildMovedAndReplacedInSameContainment => Some(NotificationClass::Child),
            AnnotationAdded | AnnotationDeleted | AnnotationMovedFromOtherParent
            | AnnotationMovedInSameParent => Some(NotificationClass::Annotation),
            ReferenceAdded | ReferenceDeleted | ReferenceChanged => {
                Some(NotificationClass::Reference)
            }
            PartitionAdded | PartitionDeleted => None,
            Composite => Some(NotificationClass::Composite),
        }
    }
}

/// A set of notification kinds a subscription can match.
///
/// The lattice is closed: `All` covers everything; `Partition` covers the
/// four feature families; `Forest` covers partition add/delete;
/// `Exactly(kind)` is a singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationClass {
    /// Every notification.
    All,
    /// Changes inside one partition: properties, children, annotations,
    /// references.
    Partition,
    /// Changes to the forest's partition set.
    Forest,
    Property,
    Child,
    Annotation,
    Reference,
    Composite,
    /// Exactly one concrete kind.
    Exactly(NotificationKind),
}

impl NotificationClass {
    /// True iff a notification of `kind` is assignable to this class.
    pub fn matches(self, kind: NotificationKind) -> bool {
        use NotificationKind::*;
        match self {
            NotificationClass::All => true,
            NotificationClass::Partition => kind.is_partition_scoped(),
            NotificationClass::Forest => kind.is_forest_scoped(),
            NotificationClass::Property => {
                matches!(kind, PropertyAdded | PropertyDeleted | PropertyChanged)
            }
            NotificationClass::Child => matches!(
                kind,
                ChildAdded
                    | ChildDeleted
                    | ChildReplaced
                    | ChildMovedFromOtherContainment
                    | ChildMovedFromOtherContainmentInSameParent
                    | ChildMovedInSameContainment
                    | ChildMovedAndReplacedFromOtherContainment
                    | ChildMovedAndReplacedFromOtherContainmentInSameParent
                    | ChildMovedAndReplacedInSameContainment
            ),
            NotificationClass::Annotation => matches!(
                kind,
                AnnotationAdded
                    | AnnotationDeleted
                    | AnnotationMovedFromOtherParent
                    | AnnotationMovedInSameParent
            ),
            NotificationClass::Reference => {
                matches!(kind, ReferenceAdded | ReferenceDeleted | ReferenceChanged)
            }
            NotificationClass::Composite => kind == Composite,
            NotificationClass::Exactly(k) => k == kind,
        }
    }

    /// The concrete kinds in this class's closure.
    pub fn members(self) -> Vec<NotificationKind> {
        NotificationKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.matches(*kind))
            .collect()
    }
}
