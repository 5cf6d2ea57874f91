//! Forest and partition mutations observed through their streams.

use grove::notification::{NotificationBody, NotificationClass, NotificationKind};
use grove::{Forest, NodeId, NodeRecord, Partition};

use crate::helpers::{collector, sample_partition};

#[test]
fn every_mutation_raises_exactly_one_notification() {
    let partition = Partition::new(&sample_partition("p")).unwrap();
    let seen = collector(partition.broadcaster(), NotificationClass::All);
    let root = partition.root().clone();

    partition.set_property(&root, "label", "x", None).unwrap();
    partition
        .add_child(&root, "items", 2, &NodeRecord::new("p-c"), None)
        .unwrap();
    partition.remove_child(&root, "items", 0, None).unwrap();
    partition
        .add_reference(&root, "sees", 0, NodeId::from("p-b"), None)
        .unwrap();
    partition
        .add_annotation(&root, 1, &NodeRecord::new("p-note2"), None)
        .unwrap();

    let kinds: Vec<NotificationKind> = seen.lock().unwrap().iter().map(|n| n.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::PropertyAdded,
            NotificationKind::ChildAdded,
            NotificationKind::ChildDeleted,
            NotificationKind::ReferenceAdded,
            NotificationKind::AnnotationAdded,
        ]
    );
}

#[test]
fn notification_ids_increase_per_partition() {
    let partition = Partition::new(&NodeRecord::new("p")).unwrap();
    let seen = collector(partition.broadcaster(), NotificationClass::All);
    let root = partition.root().clone();

    partition.set_property(&root, "a", 1i64, None).unwrap();
    partition.set_property(&root, "b", 2i64, None).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].id().base(), seen[1].id().base());
    assert!(seen[0].id().seq() < seen[1].id().seq());
}

#[test]
fn supplied_correlation_ids_are_used_verbatim() {
    let partition = Partition::new(&NodeRecord::new("p")).unwrap();
    let seen = collector(partition.broadcaster(), NotificationClass::All);
    let root = partition.root().clone();

    let correlation = grove::NotificationId::new("inbound", 41);
    partition
        .set_property(&root, "a", 1i64, Some(correlation.clone()))
        .unwrap();

    assert_eq!(seen.lock().unwrap()[0].id(), &correlation);
}

#[test]
fn forest_stream_carries_partition_lifecycle_only() {
    let forest = Forest::new();
    let seen = collector(forest.broadcaster(), NotificationClass::All);

    let partition = forest.add_partition(&sample_partition("p"), None).unwrap();
    let root = partition.root().clone();
    partition.set_property(&root, "label", "x", None).unwrap();
    forest.remove_partition(&NodeId::from("p"), None).unwrap();

    let kinds: Vec<NotificationKind> = seen.lock().unwrap().iter().map(|n| n.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::PartitionAdded,
            NotificationKind::PartitionDeleted,
        ]
    );
}

#[test]
fn partition_added_carries_the_full_subtree_record() {
    let forest = Forest::new();
    let seen = collector(forest.broadcaster(), NotificationClass::Forest);
    let record = sample_partition("p");

    forest.add_partition(&record, None).unwrap();

    let seen = seen.lock().unwrap();
    match seen[0].body() {
        NotificationBody::PartitionAdded { partition } => assert_eq!(partition, &record),
        other => panic!("expected PartitionAdded, got {other:?}"),
    }
}

#[test]
fn bulk_reference_replace_raises_a_replayable_script() {
    let partition = Partition::new(
        &NodeRecord::new("p")
            .with_reference("sees", "x")
            .with_reference("sees", "y")
            .with_reference("sees", "z"),
    )
    .unwrap();
    let seen = collector(partition.broadcaster(), NotificationClass::Reference);
    let root = partition.root().clone();

    let new_targets: Vec<NodeId> = vec!["z".into(), "x".into()];
    partition
        .replace_references(&root, "sees", new_targets.clone())
        .unwrap();

    // The model holds the new list...
    assert_eq!(root.references("sees"), new_targets);
    // ...and the raised notifications replay it on a plain copy.
    let mut replayed: Vec<NodeId> = vec!["x".into(), "y".into(), "z".into()];
    for notification in seen.lock().unwrap().iter() {
        match notification.body() {
            NotificationBody::ReferenceAdded { index, target, .. } => {
                replayed.insert(*index, target.clone());
            }
            NotificationBody::ReferenceDeleted { index, .. } => {
                replayed.remove(*index);
            }
            NotificationBody::ReferenceChanged {
                index, new_target, ..
            } => replayed[*index] = new_target.clone(),
            other => panic!("unexpected notification {other:?}"),
        }
    }
    assert_eq!(replayed, new_targets);
}

#[test]
fn bulk_child_replace_moves_surviving_nodes() {
    let partition = Partition::new(
        &NodeRecord::new("p")
            .with_child("items", NodeRecord::new("a"))
            .with_child("items", NodeRecord::new("b"))
            .with_child("items", NodeRecord::new("c")),
    )
    .unwrap();
    let seen = collector(partition.broadcaster(), NotificationClass::Child);
    let root = partition.root().clone();
    let survivor = root.children("items")[2].clone();

    // [a, b, c] -> [c, a]: b is deleted, the survivors are rearranged by
    // moving, never rebuilt from records.
    partition
        .replace_children(
            &root,
            "items",
            vec![NodeRecord::new("c"), NodeRecord::new("a")],
        )
        .unwrap();

    let ids: Vec<NodeId> = root.children("items").iter().map(|n| n.id()).collect();
    assert_eq!(ids, vec![NodeId::from("c"), NodeId::from("a")]);
    // Same live node, same identity: c was moved.
    assert!(root.children("items")[0].same(&survivor));
    let kinds: Vec<NotificationKind> = seen.lock().unwrap().iter().map(|n| n.kind()).collect();
    assert!(kinds.contains(&NotificationKind::ChildMovedInSameContainment));
}

#[test]
fn reference_index_errors_fail_fast() {
    let partition = Partition::new(&NodeRecord::new("p")).unwrap();
    let root = partition.root().clone();
    let err = partition
        .set_reference(&root, "sees", 0, NodeId::from("x"), None)
        .unwrap_err();
    assert!(matches!(
        err,
        grove::Error::Model(grove::model::ModelError::IndexOutOfRange { .. })
    ));

    let value_err = partition.remove_property(&root, "missing", None).unwrap_err();
    assert!(value_err.is_not_found());
}
