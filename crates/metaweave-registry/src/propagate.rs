//! Worklist-driven change propagation

use std::collections::{HashSet, VecDeque};

use metaweave_ids::Identifier;

/// What a propagation pass needs from its surroundings.
///
/// The registry implements this over its own edges; the metadata service
/// implements it over the registry, the cache and the active providers.
pub trait PropagationHost {
    /// Current downstream dependents of `id`
    fn downstream_of(&mut self, id: &Identifier) -> Vec<Identifier>;

    /// Mark `id` stale; called exactly once per identifier per pass
    fn invalidate(&mut self, id: &Identifier);

    /// Ask the owner of `downstream` whether it still reads `upstream`
    fn still_depends(&mut self, _upstream: &Identifier, _downstream: &Identifier) -> bool {
        true
    }

    /// Forget an edge its downstream no longer needs
    fn drop_dependency(&mut self, upstream: &Identifier, downstream: &Identifier);

    /// Identifiers affected by `id` that are not reachable through edges
    fn also_affected(&mut self, _id: &Identifier) -> Vec<Identifier> {
        Vec::new()
    }
}

/// Outcome of a finished pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Every invalidated identifier, in invalidation order
    pub invalidated: Vec<Identifier>,
    /// Edges removed because their downstream no longer depended on the upstream
    pub dropped_edges: Vec<(Identifier, Identifier)>,
    /// Whether the pass stopped at its size limit before reaching fixpoint
    pub truncated: bool,
}

/// One propagation pass: a breadth-first worklist with a visited set.
///
/// An identifier is enqueued at most once per pass, which bounds the pass by
/// the number of identifiers in the graph even when the graph has cycles.
#[derive(Debug)]
pub struct Propagation {
    queue: VecDeque<Identifier>,
    visited: HashSet<Identifier>,
    limit: usize,
    report: PropagationReport,
}

impl Propagation {
    /// Create an empty pass that invalidates at most `limit` identifiers
    pub fn new(limit: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            limit,
            report: PropagationReport::default(),
        }
    }

    /// Schedule an identifier, returning false if this pass already saw it
    pub fn enqueue(&mut self, id: Identifier) -> bool {
        if self.visited.contains(&id) {
            return false;
        }
        self.visited.insert(id.clone());
        self.queue.push_back(id);
        true
    }

    /// Whether an identifier was reached by this pass
    pub fn visited(&self, id: &Identifier) -> bool {
        self.visited.contains(id)
    }

    /// Whether work remains
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Process the worklist until fixpoint or until the limit is hit
    pub fn run<H: PropagationHost + ?Sized>(&mut self, host: &mut H) {
        while let Some(id) = self.queue.pop_front() {
            if self.report.invalidated.len() >= self.limit {
                tracing::warn!(
                    "propagation pass stopped after {} identifiers, {} still pending",
                    self.limit,
                    self.queue.len() + 1
                );
                self.report.truncated = true;
                self.queue.clear();
                break;
            }

            host.invalidate(&id);
            self.report.invalidated.push(id.clone());

            for downstream in host.downstream_of(&id) {
                if !host.still_depends(&id, &downstream) {
                    tracing::debug!("dropping stale dependency {} -> {}", id, downstream);
                    host.drop_dependency(&id, &downstream);
                    self.report.dropped_edges.push((id.clone(), downstream));
                    continue;
                }
                self.enqueue(downstream);
            }

            for affected in host.also_affected(&id) {
                self.enqueue(affected);
            }
        }
    }

    pub fn report(&self) -> &PropagationReport {
        &self.report
    }

    pub fn into_report(self) -> PropagationReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaweave_ids::{ClassTag, TypeKey};
    use std::collections::{HashMap, HashSet};

    fn id(class: &str) -> Identifier {
        Identifier::new(ClassTag::new(class).unwrap(), TypeKey::main("T").unwrap())
    }

    /// Host over a plain adjacency map with a set of edges the downstream disowns
    #[derive(Default)]
    struct MapHost {
        edges: HashMap<Identifier, Vec<Identifier>>,
        disowned: HashSet<(Identifier, Identifier)>,
        extra: HashMap<Identifier, Vec<Identifier>>,
        invalidated: Vec<Identifier>,
    }

    impl MapHost {
        fn edge(&mut self, up: &Identifier, down: &Identifier) {
            self.edges.entry(up.clone()).or_default().push(down.clone());
        }
    }

    impl PropagationHost for MapHost {
        fn downstream_of(&mut self, id: &Identifier) -> Vec<Identifier> {
            self.edges.get(id).cloned().unwrap_or_default()
        }

        fn invalidate(&mut self, id: &Identifier) {
            self.invalidated.push(id.clone());
        }

        fn still_depends(&mut self, upstream: &Identifier, downstream: &Identifier) -> bool {
            !self.disowned.contains(&(upstream.clone(), downstream.clone()))
        }

        fn drop_dependency(&mut self, upstream: &Identifier, downstream: &Identifier) {
            if let Some(downs) = self.edges.get_mut(upstream) {
                downs.retain(|d| d != downstream);
            }
        }

        fn also_affected(&mut self, id: &Identifier) -> Vec<Identifier> {
            self.extra.get(id).cloned().unwrap_or_default()
        }
    }

    #[test]
    fn test_diamond_invalidates_each_once() {
        let (a, b, c, d) = (id("A"), id("B"), id("C"), id("D"));
        let mut host = MapHost::default();
        host.edge(&a, &b);
        host.edge(&a, &c);
        host.edge(&b, &d);
        host.edge(&c, &d);

        let mut pass = Propagation::new(100);
        pass.enqueue(a.clone());
        pass.run(&mut host);

        assert_eq!(host.invalidated, vec![a, b, c, d]);
        assert!(pass.is_idle());
    }

    #[test]
    fn test_disowned_edge_is_dropped_and_not_followed() {
        let (a, b, c) = (id("A"), id("B"), id("C"));
        let mut host = MapHost::default();
        host.edge(&a, &b);
        host.edge(&b, &c);
        host.disowned.insert((a.clone(), b.clone()));

        let mut pass = Propagation::new(100);
        pass.enqueue(a.clone());
        pass.run(&mut host);

        assert_eq!(host.invalidated, vec![a.clone()]);
        assert_eq!(pass.report().dropped_edges, vec![(a.clone(), b)]);
        assert!(host.downstream_of(&a).is_empty());
    }

    #[test]
    fn test_also_affected_joins_the_pass() {
        let (a, b, c) = (id("A"), id("B"), id("C"));
        let mut host = MapHost::default();
        host.edge(&b, &c);
        host.extra.insert(a.clone(), vec![b.clone()]);

        let mut pass = Propagation::new(100);
        pass.enqueue(a.clone());
        pass.run(&mut host);

        assert_eq!(host.invalidated, vec![a, b, c]);
    }

    #[test]
    fn test_limit_truncates() {
        let (a, b, c) = (id("A"), id("B"), id("C"));
        let mut host = MapHost::default();
        host.edge(&a, &b);
        host.edge(&b, &c);

        let mut pass = Propagation::new(2);
        pass.enqueue(a.clone());
        pass.run(&mut host);

        let report = pass.into_report();
        assert!(report.truncated);
        assert_eq!(report.invalidated, vec![a, b]);
    }

    #[test]
    fn test_enqueue_twice_is_ignored() {
        let mut pass = Propagation::new(10);
        assert!(pass.enqueue(id("A")));
        assert!(!pass.enqueue(id("A")));
        assert!(pass.visited(&id("A")));
    }
}
