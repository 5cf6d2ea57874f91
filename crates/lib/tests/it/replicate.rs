//! End-to-end replicator pair scenarios: two sides wired directly.

use std::sync::Arc;

use grove::dispatch::{NotificationReceiver, NotificationSender};
use grove::notification::{
    Notification, NotificationBody, NotificationClass, NotificationId, NotificationKind,
};
use grove::{
    Forest, ForestNotificationReplicator, NodeId, NodeRecord, PropertyValue,
};

use crate::helpers::{collector, sample_partition, wired_pair};

#[test]
fn a_partition_added_on_one_side_appears_on_the_other() {
    let (a, b) = wired_pair();
    let record = sample_partition("p");

    a.forest.add_partition(&record, None).unwrap();

    // B gained a structurally equal partition...
    let replica = b.forest.partition(&NodeId::from("p")).expect("replicated");
    assert_eq!(replica.to_record(), record);
    // ...with a registered partition replicator and node identities.
    assert!(b.replicator.partition_replicators().contains(&"p".into()));
    assert!(b.replicator.nodes().contains(&"p-a".into()));
    // One notification left A; nothing echoed back out of B.
    assert_eq!(a.sent_count(), 1);
    assert_eq!(b.sent_count(), 0);
}

#[test]
fn applying_inbound_changes_never_echoes_them_back() {
    let (a, b) = wired_pair();
    a.forest.add_partition(&sample_partition("p"), None).unwrap();

    let partition = a.forest.partition(&"p".into()).unwrap();
    let root = partition.root().clone();
    partition.set_property(&root, "label", "v1", None).unwrap();
    partition.set_property(&root, "label", "v2", None).unwrap();

    // B mirrors the value without one outbound notification: every id B
    // minted while applying stayed inside its suppression table.
    let replica_root = b.forest.partition(&"p".into()).unwrap().root().clone();
    assert_eq!(
        replica_root.property("label"),
        Some(PropertyValue::Str("v2".into()))
    );
    assert_eq!(a.sent_count(), 3);
    assert_eq!(b.sent_count(), 0);
    assert!(!b.replicator.is_suppressing());
}

#[test]
fn changes_flow_in_both_directions() {
    let (a, b) = wired_pair();
    a.forest.add_partition(&sample_partition("p"), None).unwrap();

    // Mutate the replica on B; A follows.
    let replica = b.forest.partition(&"p".into()).unwrap();
    let replica_root = replica.root().clone();
    replica.set_property(&replica_root, "origin", "b", None).unwrap();

    let original_root = a.forest.partition(&"p".into()).unwrap().root().clone();
    assert_eq!(
        original_root.property("origin"),
        Some(PropertyValue::Str("b".into()))
    );
    // A's one partition-add, B's one property change.
    assert_eq!(a.sent_count(), 1);
    assert_eq!(b.sent_count(), 1);
}

#[test]
fn every_feature_family_round_trips() {
    let (a, b) = wired_pair();
    let record = NodeRecord::new("p")
        .with_property("name", "p")
        .with_child("items", NodeRecord::new("a"))
        .with_child("items", NodeRecord::new("b"))
        .with_annotation(NodeRecord::new("note"));
    a.forest.add_partition(&record, None).unwrap();

    let partition = a.forest.partition(&"p".into()).unwrap();
    let root = partition.root().clone();

    // Properties.
    partition.set_property(&root, "label", "v1", None).unwrap();
    partition.set_property(&root, "label", "v2", None).unwrap();
    partition.remove_property(&root, "label", None).unwrap();

    // Children: add a subtree, replace, move within and across
    // containments and parents, move onto an occupied slot.
    partition
        .add_child(
            &root,
            "items",
            2,
            &NodeRecord::new("c").with_child("sub", NodeRecord::new("c1")),
            None,
        )
        .unwrap();
    partition
        .replace_child(&root, "items", 1, &NodeRecord::new("b2"), None)
        .unwrap();
    partition.move_child(&root, "items", 0, &root, "items", 2, None).unwrap();
    partition.move_child(&root, "items", 0, &root, "extra", 0, None).unwrap();
    let c_node = root.children("items")[0].clone();
    assert_eq!(c_node.id(), "c");
    partition.move_child(&root, "extra", 0, &c_node, "sub", 0, None).unwrap();
    partition
        .move_child_replacing(&c_node, "sub", 0, &root, "items", 1, None)
        .unwrap();

    // Annotations.
    partition
        .add_annotation(&root, 1, &NodeRecord::new("note2"), None)
        .unwrap();
    partition.move_annotation(&root, 0, &root, 1, None).unwrap();
    partition.move_annotation(&root, 0, &c_node, 0, None).unwrap();
    partition.remove_annotation(&c_node, 0, None).unwrap();

    // References.
    partition
        .add_reference(&root, "sees", 0, NodeId::from("c"), None)
        .unwrap();
    partition
        .set_reference(&root, "sees", 0, NodeId::from("c1"), None)
        .unwrap();
    partition.remove_reference(&root, "sees", 0, None).unwrap();

    // The replica converged structurally, identity for identity.
    let replica = b.forest.partition(&"p".into()).unwrap();
    assert_eq!(replica.to_record(), partition.to_record());
    // Node maps agree: p, c, c1, b2, note survive.
    assert_eq!(a.replicator.nodes().len(), 5);
    assert_eq!(b.replicator.nodes().len(), 5);
    // Still no echo in either direction.
    assert_eq!(b.sent_count(), 0);
}

#[test]
fn bulk_reference_replace_converges_on_the_remote_side() {
    let (a, b) = wired_pair();
    let record = sample_partition("p")
        .with_reference("sees", "p-a")
        .with_reference("sees", "p-b")
        .with_reference("sees", "p-note");
    a.forest.add_partition(&record, None).unwrap();

    // [p-a, p-b, p-note] -> [p-note, p-a]: the edit script leaves A as a
    // run of fine-grained reference notifications that B replays in order.
    let partition = a.forest.partition(&"p".into()).unwrap();
    let root = partition.root().clone();
    let new_targets: Vec<NodeId> = vec!["p-note".into(), "p-a".into()];
    partition
        .replace_references(&root, "sees", new_targets.clone())
        .unwrap();

    let replica_root = b.forest.partition(&"p".into()).unwrap().root().clone();
    assert_eq!(replica_root.references("sees"), new_targets);
    assert_eq!(b.sent_count(), 0);
}

#[test]
fn a_forest_scoped_notification_is_unsupported_at_partition_level() {
    use grove::{Partition, PartitionNotificationReplicator};

    let partition = Partition::new(&sample_partition("p")).unwrap();
    let replicator = PartitionNotificationReplicator::new(partition).unwrap();

    let inbound = Notification::new(
        NotificationId::new("elsewhere", 0),
        NotificationBody::PartitionAdded {
            partition: sample_partition("q"),
        },
    );
    let err = replicator.receive(inbound).unwrap_err();
    assert!(err.is_unsupported());
    assert!(!replicator.is_suppressing());
}

#[test]
fn partition_deletion_tears_down_both_sides() {
    let (a, b) = wired_pair();
    a.forest.add_partition(&sample_partition("p"), None).unwrap();
    assert!(!b.replicator.nodes().is_empty());

    a.forest.remove_partition(&"p".into(), None).unwrap();

    assert!(b.forest.partition(&"p".into()).is_none());
    assert!(a.replicator.partition_replicators().is_empty());
    assert!(b.replicator.partition_replicators().is_empty());
    assert!(a.replicator.nodes().is_empty());
    assert!(b.replicator.nodes().is_empty());
}

#[test]
fn an_unresolvable_inbound_id_fails_instead_of_no_op() {
    let (_a, b) = wired_pair();

    let stray = Notification::new(
        NotificationId::new("elsewhere", 0),
        NotificationBody::PropertyChanged {
            node: "ghost".into(),
            property: "p".into(),
            new_value: PropertyValue::Int(1),
            old_value: PropertyValue::Int(0),
        },
    );
    let err = b.replicator.receive(stray).unwrap_err();
    assert!(err.is_identity_error());
    assert!(err.is_not_found());
}

#[test]
fn forest_scoped_subscribers_do_not_see_partition_changes() {
    let (a, _b) = wired_pair();
    let forest_scope = collector(a.replicator.outbound(), NotificationClass::Forest);
    let partition_scope = collector(a.replicator.outbound(), NotificationClass::Partition);

    a.forest.add_partition(&sample_partition("p"), None).unwrap();
    let partition = a.forest.partition(&"p".into()).unwrap();
    let root = partition.root().clone();
    partition.set_property(&root, "label", "x", None).unwrap();

    let forest_seen = forest_scope.lock().unwrap();
    assert_eq!(forest_seen.len(), 1);
    assert_eq!(forest_seen[0].kind(), NotificationKind::PartitionAdded);

    let partition_seen = partition_scope.lock().unwrap();
    assert_eq!(partition_seen.len(), 1);
    assert_eq!(partition_seen[0].kind(), NotificationKind::PropertyAdded);
}

#[test]
fn composite_scopes_batch_one_logical_operation() {
    let (a, b) = wired_pair();
    a.forest.add_partition(&sample_partition("p"), None).unwrap();
    let partition = a.forest.partition(&"p".into()).unwrap();
    let root = partition.root().clone();
    let before = a.sent_count();

    {
        let scope = a.replicator.composite_scope();
        partition.set_property(&root, "x", 1i64, None).unwrap();
        partition.set_property(&root, "y", 2i64, None).unwrap();
        partition
            .add_child(&root, "items", 0, &NodeRecord::new("fresh"), None)
            .unwrap();
        scope.close().unwrap();
    }

    // One composite left A, carrying the three parts in raise order.
    assert_eq!(a.sent_count(), before + 1);
    let sent = a.sent.lock().unwrap();
    let parts = sent.last().unwrap().parts().expect("composite");
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0].kind(), NotificationKind::PropertyAdded);
    assert_eq!(parts[2].kind(), NotificationKind::ChildAdded);
    drop(sent);

    // B applied all parts, in order, without echo.
    let replica_root = b.forest.partition(&"p".into()).unwrap().root().clone();
    assert_eq!(replica_root.property("x"), Some(PropertyValue::Int(1)));
    assert_eq!(replica_root.property("y"), Some(PropertyValue::Int(2)));
    assert_eq!(replica_root.children("items")[0].id(), "fresh");
    assert_eq!(b.sent_count(), 0);
}

#[test]
fn partitions_present_before_the_replicator_are_not_retrofitted() {
    // Documented limitation of the plain forest replicator: it only wires
    // partitions it sees appear.
    let forest_a = Forest::new();
    forest_a.add_partition(&sample_partition("old"), None).unwrap();

    let a = Arc::new(ForestNotificationReplicator::new(forest_a.clone()).unwrap());
    let forest_b = Forest::new();
    let b = Arc::new(ForestNotificationReplicator::new(forest_b.clone()).unwrap());
    a.outbound().connect(b.clone() as Arc<dyn NotificationReceiver>);
    let outbound_a = collector(a.outbound(), NotificationClass::All);

    // The pre-existing partition has no replicator entry and its changes
    // never reach the outbound stream.
    assert!(!a.partition_replicators().contains(&"old".into()));
    let old = forest_a.partition(&"old".into()).unwrap();
    let old_root = old.root().clone();
    old.set_property(&old_root, "label", "x", None).unwrap();
    assert!(outbound_a.lock().unwrap().is_empty());

    // A partition added afterwards replicates normally.
    forest_a.add_partition(&sample_partition("new"), None).unwrap();
    assert!(b.forest().partition(&"new".into()).is_some());
    assert!(b.forest().partition(&"old".into()).is_none());
}

#[test]
fn a_rewriting_side_forwards_applied_changes_under_the_origin_id() {
    let forest_a = Forest::new();
    let a = Arc::new(ForestNotificationReplicator::new(forest_a.clone()).unwrap());
    let forest_b = Forest::new();
    let b = Arc::new(ForestNotificationReplicator::new_rewriting(forest_b.clone()).unwrap());
    a.outbound().connect(b.clone() as Arc<dyn NotificationReceiver>);

    let outbound_a = collector(a.outbound(), NotificationClass::All);
    let outbound_b = collector(b.outbound(), NotificationClass::All);

    forest_a.add_partition(&sample_partition("p"), None).unwrap();

    // B re-emits what it applied, correlated to the origin notification.
    let sent_by_a = outbound_a.lock().unwrap();
    let forwarded_by_b = outbound_b.lock().unwrap();
    assert_eq!(sent_by_a.len(), 1);
    assert_eq!(forwarded_by_b.len(), 1);
    assert_eq!(forwarded_by_b[0].id(), sent_by_a[0].id());
    assert_eq!(forwarded_by_b[0].kind(), NotificationKind::PartitionAdded);
}
