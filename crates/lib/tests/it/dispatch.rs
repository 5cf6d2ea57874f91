//! Dispatcher behavior: subscription scoping, counters, pipelines.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use grove::dispatch::{Broadcaster, NotificationReceiver, Pipeline, PipelineStage};
use grove::notification::{
    Notification, NotificationBody, NotificationClass, NotificationId, NotificationKind,
};
use grove::PropertyValue;

use crate::helpers::collector;

fn property_changed(seq: u64) -> Notification {
    Notification::new(
        NotificationId::new("it", seq),
        NotificationBody::PropertyChanged {
            node: "n".into(),
            property: "p".into(),
            new_value: PropertyValue::Int(1),
            old_value: PropertyValue::Int(0),
        },
    )
}

fn partition_added(seq: u64) -> Notification {
    Notification::new(
        NotificationId::new("it", seq),
        NotificationBody::PartitionAdded {
            partition: grove::NodeRecord::new("p"),
        },
    )
}

#[test]
fn every_supertype_subscription_fires_exactly_once() {
    let broadcaster = Broadcaster::new();
    let exact = collector(
        &broadcaster,
        NotificationClass::Exactly(NotificationKind::PropertyChanged),
    );
    let family = collector(&broadcaster, NotificationClass::Property);
    let scope = collector(&broadcaster, NotificationClass::Partition);
    let all = collector(&broadcaster, NotificationClass::All);
    let unrelated = collector(&broadcaster, NotificationClass::Reference);

    broadcaster.receive(property_changed(0)).unwrap();

    assert_eq!(exact.lock().unwrap().len(), 1);
    assert_eq!(family.lock().unwrap().len(), 1);
    assert_eq!(scope.lock().unwrap().len(), 1);
    assert_eq!(all.lock().unwrap().len(), 1);
    assert_eq!(unrelated.lock().unwrap().len(), 0);
}

#[test]
fn forest_scope_does_not_match_partition_notifications() {
    let broadcaster = Broadcaster::new();
    let forest = collector(&broadcaster, NotificationClass::Forest);
    let partition = collector(&broadcaster, NotificationClass::Partition);

    broadcaster.receive(property_changed(0)).unwrap();
    broadcaster.receive(partition_added(1)).unwrap();

    let forest = forest.lock().unwrap();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].kind(), NotificationKind::PartitionAdded);
    let partition = partition.lock().unwrap();
    assert_eq!(partition.len(), 1);
    assert_eq!(partition[0].kind(), NotificationKind::PropertyChanged);
}

#[test]
fn can_receive_tracks_subscriptions_per_concrete_kind() {
    let broadcaster = Broadcaster::new();
    assert!(!broadcaster.can_receive(&[NotificationClass::All]));

    let token = broadcaster.subscribe(NotificationClass::Annotation, |_| {});
    assert!(broadcaster.can_receive(&[NotificationClass::Exactly(
        NotificationKind::AnnotationMovedInSameParent
    )]));
    assert!(broadcaster.can_receive(&[
        NotificationClass::Forest,
        NotificationClass::Annotation,
    ]));
    assert!(!broadcaster.can_receive(&[NotificationClass::Forest]));
    assert!(!broadcaster.can_receive(&[NotificationClass::Child]));

    broadcaster.unsubscribe(token).unwrap();
    assert!(!broadcaster.can_receive(&[NotificationClass::All]));
}

#[test]
fn pipelines_deliver_through_all_stages_and_detach_on_drop() {
    let head = Broadcaster::new();
    let middle = Broadcaster::new();
    let tail = Broadcaster::new();
    let delivered = Arc::new(AtomicUsize::new(0));
    let sink = delivered.clone();
    tail.subscribe(NotificationClass::All, move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    let stages: Vec<Arc<dyn PipelineStage>> = vec![
        Arc::new(head.clone()),
        Arc::new(middle),
        Arc::new(tail),
    ];
    {
        let _pipeline = Pipeline::new(stages).unwrap();
        head.receive(property_changed(0)).unwrap();
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    head.receive(property_changed(1)).unwrap();
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[test]
fn a_single_stage_pipeline_is_rejected() {
    let stages: Vec<Arc<dyn PipelineStage>> = vec![Arc::new(Broadcaster::new())];
    let err = Pipeline::new(stages).unwrap_err();
    assert!(err.is_construction_error());
}
