//! Shared identity registry properties.

use grove::registry::{RegistryError, SharedNodeMap};
use grove::{Node, NodeId, NodeRecord};

use crate::helpers::sample_partition;

fn live(record: &NodeRecord) -> Node {
    record.instantiate().unwrap()
}

#[test]
fn registration_covers_descendants_and_annotations() {
    let map = SharedNodeMap::new();
    map.register(&live(&sample_partition("p"))).unwrap();

    for id in ["p", "p-a", "p-b", "p-note"] {
        assert!(map.contains(&NodeId::from(id)), "{id} should be registered");
    }
    assert_eq!(map.len(), 4);
}

#[test]
fn double_registration_is_a_duplicate_id_error() {
    let map = SharedNodeMap::new();
    let node = live(&sample_partition("p"));
    map.register(&node).unwrap();

    let err = map.register(&node).unwrap_err();
    assert!(err.is_duplicate());
    assert!(err.is_identity_error());
}

#[test]
fn register_unregister_lookup_is_an_unknown_id_error() {
    let map = SharedNodeMap::new();
    let node = live(&sample_partition("p"));
    map.register(&node).unwrap();
    map.unregister(&node).unwrap();

    let err = map.lookup(&NodeId::from("p-a")).unwrap_err();
    assert!(matches!(
        err,
        grove::Error::Registry(RegistryError::UnknownNodeId { .. })
    ));
    assert!(err.is_not_found());
    assert!(map.is_empty());
}

#[test]
fn a_partial_id_clash_registers_nothing() {
    let map = SharedNodeMap::new();
    map.register(&Node::new("p-b")).unwrap();

    // The subtree shares one id with the registered node; the whole
    // registration must be rejected.
    let err = map.register(&live(&sample_partition("p"))).unwrap_err();
    assert!(err.is_duplicate());
    assert_eq!(map.len(), 1);
    assert!(!map.contains(&NodeId::from("p")));
    assert!(!map.contains(&NodeId::from("p-a")));
}
