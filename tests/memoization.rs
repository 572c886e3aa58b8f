//! Memoization and dependency discovery through the metadata service

mod common;

use std::sync::Arc;

use common::assertions::{assert_edge, assert_invalidated, assert_valid};
use common::fixtures::{id, key, relay_service, relay_type, Relay, RelayProvider};
use metaweave::engine::{CacheLookup, MetadataValue};
use metaweave::ids::Identifier;

#[test]
fn repeated_get_returns_same_object_and_computes_once() {
    let i = RelayProvider::new("I", &[]);
    let (_facts, service) = relay_service(&[i.clone()]);
    let target = id("I", "T");

    let first = service.get(&target).unwrap();
    let second = service.get(&target).unwrap();

    assert!(first.same_object(&second));
    assert_eq!(first, second);
    assert_eq!(i.calls(), 1);
    assert_eq!(service.cache_stats().hits, 1);
}

#[test]
fn absent_results_are_memoized_too() {
    let i = RelayProvider::new("I", &[]);
    let (_facts, service) = relay_service(&[i.clone()]);
    let missing = id("I", "Nowhere");

    assert!(service.get(&missing).unwrap().is_absent());
    assert!(service.get(&missing).unwrap().is_absent());
    assert_eq!(i.calls(), 1);
    assert!(matches!(
        service.lookup(&missing),
        CacheLookup::Valid(MetadataValue::Absent)
    ));
}

#[test]
fn reading_upstream_registers_edge_before_returning() {
    let j = RelayProvider::new("J", &[]);
    let i = RelayProvider::new("I", &["J"]);
    let (_facts, service) = relay_service(&[j, i]);

    let value = service.get(&id("I", "T")).unwrap();
    let relay = value.downcast::<Relay>().unwrap();
    assert_eq!(relay.labels, vec!["I:t".to_string(), "J:t".to_string()]);

    assert_edge(&service, &id("J", "T"), &id("I", "T"));
    assert_edge(&service, &Identifier::physical(key("T")), &id("I", "T"));
    assert_edge(&service, &Identifier::physical(key("T")), &id("J", "T"));
    assert_valid(&service, &id("J", "T"));
}

#[test]
fn invalidate_forces_recomputation_on_next_get() {
    let i = RelayProvider::new("I", &[]);
    let (facts, service) = relay_service(&[i.clone()]);
    let target = id("I", "T");
    service.get(&target).unwrap();

    facts.put(relay_type("T", "renamed"));
    assert!(service.invalidate(&target));
    assert_invalidated(&service, &target);

    let value = service.get(&target).unwrap();
    assert_eq!(value.downcast::<Relay>().unwrap().labels, vec!["I:renamed".to_string()]);
    assert_eq!(i.calls(), 2);
}

#[test]
fn value_computed_from_inputs_invalidated_mid_flight_is_not_cached() {
    let j = RelayProvider::new("J", &[]);
    let i = RelayProvider::new("I", &["J"]);
    let (_facts, service) = relay_service(&[j.clone(), i.clone()]);

    // invalidate J while I is still computing from the J value it read
    let weak = Arc::downgrade(&service);
    i.set_after_reads(move |_| {
        if let Some(service) = weak.upgrade() {
            service.notify(&id("J", "T"));
        }
    });

    let target = id("I", "T");
    assert!(service.get(&target).unwrap().is_present());
    assert!(!service.lookup(&target).is_valid());

    // once the inputs settle the value is cached as usual
    i.set_after_reads(|_| {});
    service.get(&target).unwrap();
    assert_valid(&service, &target);
    let calls = i.calls();
    service.get(&target).unwrap();
    assert_eq!(i.calls(), calls);
}
