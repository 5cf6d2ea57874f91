//! Shared factories for the integration suite.

use std::sync::{Arc, Mutex};

use grove::dispatch::{NotificationReceiver, NotificationSender};
use grove::notification::NotificationClass;
use grove::{Forest, ForestNotificationReplicator, Notification, NodeRecord};

/// A small partition: a root with two children and an annotation.
pub fn sample_partition(id: &str) -> NodeRecord {
    NodeRecord::new(id)
        .with_property("name", id)
        .with_child(
            "items",
            NodeRecord::new(format!("{id}-a")).with_property("count", 1i64),
        )
        .with_child("items", NodeRecord::new(format!("{id}-b")))
        .with_annotation(NodeRecord::new(format!("{id}-note")))
}

/// Everything a wired side exposes to assertions.
pub struct Side {
    pub forest: Forest,
    pub replicator: Arc<ForestNotificationReplicator>,
    /// Notifications this side put on the (virtual) wire.
    pub sent: Arc<Mutex<Vec<Notification>>>,
}

impl Side {
    fn new(replicator: ForestNotificationReplicator) -> Self {
        let forest = replicator.forest().clone();
        let replicator = Arc::new(replicator);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        replicator
            .outbound()
            .subscribe(NotificationClass::All, move |notification| {
                sink.lock().unwrap().push(notification.clone());
            });
        Self {
            forest,
            replicator,
            sent,
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

/// Two forest replicators wired directly into each other — the in-process
/// stand-in for a transport.
pub fn wired_pair() -> (Side, Side) {
    let side_a = Side::new(ForestNotificationReplicator::new(Forest::new()).unwrap());
    let side_b = Side::new(ForestNotificationReplicator::new(Forest::new()).unwrap());
    side_a
        .replicator
        .outbound()
        .connect(side_b.replicator.clone() as Arc<dyn NotificationReceiver>);
    side_b
        .replicator
        .outbound()
        .connect(side_a.replicator.clone() as Arc<dyn NotificationReceiver>);
    (side_a, side_b)
}

/// Collects every notification a broadcaster delivers for `class`.
pub fn collector(
    broadcaster: &grove::dispatch::Broadcaster,
    class: NotificationClass,
) -> Arc<Mutex<Vec<Notification>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    broadcaster.subscribe(class, move |notification| {
        sink.lock().unwrap().push(notification.clone());
    });
    seen
}
