//! Provider activation, Absent handling, type removal and diagnostics

mod common;

use std::sync::Arc;

use common::assertions::{assert_edge, assert_no_edges_of, assert_valid};
use common::fixtures::{
    class, id, key, relay_service, relay_type, Relay, RelayProvider, RELAY_MARKER,
};
use metaweave::engine::{CacheLookup, Severity};
use metaweave::ids::Identifier;

#[test]
fn deactivation_drops_class_state() {
    let j = RelayProvider::new("J", &[]);
    let i = RelayProvider::new("I", &["J"]);
    let (_facts, service) = relay_service(&[j.clone(), i]);
    service.get(&id("I", "T")).unwrap();
    assert_edge(&service, &id("J", "T"), &id("I", "T"));

    assert!(service.deactivate_provider(&class("J")));
    assert!(!service.deactivate_provider(&class("J")));
    assert_no_edges_of(&service, &class("J"));
    assert!(matches!(service.lookup(&id("J", "T")), CacheLookup::NotComputed));
    assert_eq!(service.active_classes(), vec![class("I")]);

    // dependents now read the missing class as Absent
    service.notify_type_changed(&key("T"));
    assert!(service.get(&id("I", "T")).unwrap().is_absent());

    service.activate_provider(j).unwrap();
    service.notify_type_changed(&key("T"));
    assert!(service.get(&id("I", "T")).unwrap().is_present());
}

#[test]
fn deactivation_during_computation_leaves_nothing_behind() {
    let j = RelayProvider::new("J", &[]);
    let i = RelayProvider::new("I", &["J"]);
    let (_facts, service) = relay_service(&[j, i.clone()]);

    let weak = Arc::downgrade(&service);
    i.set_after_reads(move |_| {
        if let Some(service) = weak.upgrade() {
            service.deactivate_provider(&class("I"));
        }
    });

    // the caller still receives what was computed
    assert!(service.get(&id("I", "T")).unwrap().is_present());
    assert!(matches!(service.lookup(&id("I", "T")), CacheLookup::NotComputed));
    assert_no_edges_of(&service, &class("I"));

    assert!(service.get(&id("I", "T")).unwrap().is_absent());
    assert_eq!(i.calls(), 1);
}

#[test]
fn unknown_class_reads_absent_and_is_not_cached() {
    let (_facts, service) = relay_service(&[]);
    let unknown = id("Nobody", "T");
    assert!(service.get(&unknown).unwrap().is_absent());
    assert!(matches!(service.lookup(&unknown), CacheLookup::NotComputed));
}

#[test]
fn absent_upstream_propagates_unless_tolerated() {
    let strict = RelayProvider::new("I", &["J"]);
    let tolerant = RelayProvider::tolerant("K", &["J"]);
    let (_facts, service) = relay_service(&[strict, tolerant]);

    assert!(service.get(&id("I", "T")).unwrap().is_absent());
    let value = service.get(&id("K", "T")).unwrap();
    assert_eq!(value.downcast::<Relay>().unwrap().labels, vec!["K:t".to_string()]);

    // the Absent read still registered its edge
    assert_edge(&service, &id("J", "T"), &id("K", "T"));
}

#[test]
fn removing_marker_makes_value_absent() {
    let i = RelayProvider::new("I", &[]);
    let (facts, service) = relay_service(&[i]);
    assert_eq!(service.rescan(), vec![id("I", "T")]);
    assert!(service.get(&id("I", "T")).unwrap().is_present());

    facts.update(&key("T"), |facts| {
        facts.markers.remove(&RELAY_MARKER);
    });
    let report = service.notify_type_changed(&key("T"));
    assert!(report.invalidated.contains(&id("I", "T")));
    assert!(service.get(&id("I", "T")).unwrap().is_absent());
    assert!(service.rescan().is_empty());
}

#[test]
fn deleted_type_is_forgotten() {
    let j = RelayProvider::new("J", &[]);
    let i = RelayProvider::new("I", &["J"]);
    let (facts, service) = relay_service(&[j, i]);
    service.get(&id("I", "T")).unwrap();
    assert!(!service.edges().is_empty());

    facts.remove(&key("T"));
    let report = service.notify_type_changed(&key("T"));
    assert_eq!(report.invalidated[0], Identifier::physical(key("T")));
    assert!(report.invalidated.contains(&id("I", "T")));

    assert!(service.edges().is_empty());
    assert!(matches!(service.lookup(&id("I", "T")), CacheLookup::NotComputed));
    assert!(service.get(&id("I", "T")).unwrap().is_absent());
}

#[test]
fn rescan_lists_owned_identifiers_in_order() {
    let i = RelayProvider::new("I", &[]);
    let j = RelayProvider::new("J", &[]);
    let (facts, service) = relay_service(&[j, i]);
    facts.put(relay_type("U", "u"));
    facts.put(metaweave::engine::TypeFacts::new(key("V")));

    assert_eq!(
        service.rescan(),
        vec![id("I", "T"), id("I", "U"), id("J", "T"), id("J", "U")]
    );
}

#[test]
fn misconfiguration_reads_absent_and_is_reported_once() {
    let i = RelayProvider::new("I", &[]);
    let (facts, service) = relay_service(&[i]);
    facts.put(relay_type("T", "  "));

    assert!(service.get(&id("I", "T")).unwrap().is_absent());
    service.get(&id("I", "T")).unwrap();

    let diagnostics = service.take_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code(), "E-CONFIG-001");
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert_eq!(diagnostics[0].identifier, id("I", "T"));
    assert!(service.take_diagnostics().is_empty());

    facts.put(relay_type("T", "fixed"));
    service.notify_type_changed(&key("T"));
    assert!(service.get(&id("I", "T")).unwrap().is_present());
    assert_valid(&service, &id("I", "T"));
    assert!(service.take_diagnostics().is_empty());
}

#[test]
fn duplicate_and_reserved_classes_are_refused() {
    let (_facts, service) = relay_service(&[RelayProvider::new("I", &[])]);

    let err = service
        .activate_provider(RelayProvider::new("I", &[]))
        .unwrap_err();
    assert_eq!(err.code(), "E-ENGINE-001");
    let err = service
        .activate_provider(RelayProvider::new("PhysicalType", &[]))
        .unwrap_err();
    assert_eq!(err.code(), "E-ENGINE-002");
}
