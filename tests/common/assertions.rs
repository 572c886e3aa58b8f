use metaweave::engine::{CacheLookup, MetadataService};
use metaweave::ids::{ClassTag, Identifier};

/// Assert that `upstream -> downstream` is registered
pub fn assert_edge(service: &MetadataService, upstream: &Identifier, downstream: &Identifier) {
    assert!(
        service.has_dependency(upstream, downstream),
        "Expected edge {} -> {}",
        upstream,
        downstream
    );
}

/// Assert that no edge mentions the class
pub fn assert_no_edges_of(service: &MetadataService, class: &ClassTag) {
    let edges = service.edges();
    let offending: Vec<_> = edges
        .iter()
        .filter(|(up, down)| up.class_tag() == class || down.class_tag() == class)
        .collect();
    assert!(offending.is_empty(), "Expected no edges of {}, found {:?}", class, offending);
}

pub fn assert_valid(service: &MetadataService, id: &Identifier) {
    assert!(
        service.lookup(id).is_valid(),
        "Expected {} to be cached as valid",
        id
    );
}

pub fn assert_invalidated(service: &MetadataService, id: &Identifier) {
    assert!(
        matches!(service.lookup(id), CacheLookup::Invalidated),
        "Expected {} to be invalidated, found {:?}",
        id,
        service.lookup(id)
    );
}
