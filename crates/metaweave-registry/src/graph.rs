//! Dependency graph data structure

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use metaweave_ids::{ClassTag, Identifier, TypeKey};

use crate::{NotificationListener, Propagation, PropagationHost, PropagationReport, RegistryError};

/// Index of an identifier in the registry's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Directed dependency graph over metadata identifiers.
///
/// Identifiers are interned into an arena on first use and addressed by
/// [`NodeId`] afterwards; edge lists are kept in both directions so that
/// deregistration is as cheap as lookup. An identifier is released as soon
/// as its last edge goes, and its arena slot is reused by the next intern.
#[derive(Default)]
pub struct DependencyRegistry {
    /// Interned identifiers indexed by NodeId, None for released slots
    nodes: Vec<Option<Identifier>>,

    /// Released slots awaiting reuse
    free: Vec<NodeId>,

    /// Identifier to NodeId mapping
    by_id: HashMap<Identifier, NodeId>,

    /// Forward edges: who must be recomputed when this node changes?
    downstream: Vec<BTreeSet<NodeId>>,

    /// Backward edges: what does this node depend on?
    upstream: Vec<BTreeSet<NodeId>>,

    edge_count: usize,

    listeners: Vec<Arc<dyn NotificationListener>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate an edge without inserting it
    pub fn check_edge(upstream: &Identifier, downstream: &Identifier) -> Result<(), RegistryError> {
        if upstream == downstream {
            return Err(RegistryError::SelfDependency {
                id: upstream.clone(),
            });
        }
        if downstream.is_physical() {
            return Err(RegistryError::PhysicalDownstream {
                upstream: upstream.clone(),
                downstream: downstream.clone(),
            });
        }
        if upstream.same_class(downstream) {
            return Err(RegistryError::SameClass {
                upstream: upstream.clone(),
                downstream: downstream.clone(),
                class: upstream.class_tag().clone(),
            });
        }
        Ok(())
    }

    /// Record that `downstream` must be recomputed when `upstream` changes.
    ///
    /// Returns `Ok(true)` if the edge is new and `Ok(false)` if it was already present.
    pub fn register_dependency(
        &mut self,
        upstream: &Identifier,
        downstream: &Identifier,
    ) -> Result<bool, RegistryError> {
        Self::check_edge(upstream, downstream)?;

        let up = self.intern(upstream);
        let down = self.intern(downstream);
        let inserted = self.downstream[up.0 as usize].insert(down);
        if inserted {
            self.upstream[down.0 as usize].insert(up);
            self.edge_count += 1;
            tracing::debug!("registered dependency {} -> {}", upstream, downstream);
        }
        Ok(inserted)
    }

    /// Remove a single edge, returning whether it existed
    pub fn deregister_dependency(&mut self, upstream: &Identifier, downstream: &Identifier) -> bool {
        let (Some(up), Some(down)) = (self.node_id(upstream), self.node_id(downstream)) else {
            return false;
        };
        self.remove_edge(up, down)
    }

    /// Remove every edge in which `id` takes part, in either direction
    pub fn deregister_dependencies_of(&mut self, id: &Identifier) -> usize {
        let Some(node) = self.node_id(id) else {
            return 0;
        };
        let mut removed = 0;
        for down in std::mem::take(&mut self.downstream[node.0 as usize]) {
            self.upstream[down.0 as usize].remove(&node);
            self.release_if_isolated(down);
            removed += 1;
        }
        for up in std::mem::take(&mut self.upstream[node.0 as usize]) {
            self.downstream[up.0 as usize].remove(&node);
            self.release_if_isolated(up);
            removed += 1;
        }
        self.release_if_isolated(node);
        self.edge_count -= removed;
        removed
    }

    /// Remove every edge touching an identifier of the given class.
    ///
    /// Used when the provider owning `class` deactivates.
    pub fn deregister_class(&mut self, class: &ClassTag) -> usize {
        let members: Vec<Identifier> = self
            .by_id
            .keys()
            .filter(|id| id.class_tag() == class)
            .cloned()
            .collect();
        let removed = members
            .iter()
            .map(|id| self.deregister_dependencies_of(id))
            .sum();
        if removed > 0 {
            tracing::debug!("deregistered {} edges of class {}", removed, class);
        }
        removed
    }

    /// Check whether the edge `upstream -> downstream` is registered
    pub fn has_dependency(&self, upstream: &Identifier, downstream: &Identifier) -> bool {
        match (self.node_id(upstream), self.node_id(downstream)) {
            (Some(up), Some(down)) => self.downstream[up.0 as usize].contains(&down),
            _ => false,
        }
    }

    /// Whether anything depends on `id`
    pub fn has_dependents(&self, id: &Identifier) -> bool {
        self.node_id(id)
            .map(|node| !self.downstream[node.0 as usize].is_empty())
            .unwrap_or(false)
    }

    /// Identifiers that depend on `id`
    pub fn downstream_of(&self, id: &Identifier) -> Vec<Identifier> {
        self.node_id(id)
            .map(|node| self.resolve_all(&self.downstream[node.0 as usize]))
            .unwrap_or_default()
    }

    /// Identifiers `id` depends on
    pub fn upstream_of(&self, id: &Identifier) -> Vec<Identifier> {
        self.node_id(id)
            .map(|node| self.resolve_all(&self.upstream[node.0 as usize]))
            .unwrap_or_default()
    }

    /// Every interned identifier keyed on the given governing type
    pub fn identifiers_of_type(&self, key: &TypeKey) -> Vec<Identifier> {
        self.by_id.keys().filter(|id| id.key() == key).cloned().collect()
    }

    /// Iterate over all edges as `(upstream, downstream)` pairs
    pub fn edges(&self) -> impl Iterator<Item = (&Identifier, &Identifier)> + '_ {
        self.downstream.iter().enumerate().flat_map(move |(up, downs)| {
            downs.iter().filter_map(move |down| {
                let upstream = self.nodes[up].as_ref()?;
                let downstream = self.nodes[down.0 as usize].as_ref()?;
                Some((upstream, downstream))
            })
        })
    }

    /// Check whether any edge mentions an identifier of the given class
    pub fn references_class(&self, class: &ClassTag) -> bool {
        self.edges()
            .any(|(up, down)| up.class_tag() == class || down.class_tag() == class)
    }

    /// Number of identifiers currently taking part in at least one edge
    pub fn node_count(&self) -> usize {
        self.by_id.len()
    }

    /// Get the number of edges in the graph
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Check if the graph has no edges
    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }

    pub fn add_notification_listener(&mut self, listener: Arc<dyn NotificationListener>) {
        if !self.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            self.listeners.push(listener);
        }
    }

    /// Remove a listener previously added, compared by pointer
    pub fn remove_notification_listener(&mut self, listener: &Arc<dyn NotificationListener>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
        self.listeners.len() != before
    }

    /// Snapshot of the registered listeners, so they can be called without borrowing the registry
    pub fn listeners(&self) -> Vec<Arc<dyn NotificationListener>> {
        self.listeners.clone()
    }

    /// Run a propagation pass from `changed` over this registry alone.
    ///
    /// `invalidate` is called once per reached identifier, followed by every
    /// listener. Callers that need provider feedback during the walk (stale
    /// edge detection, layer lookups) drive a [`Propagation`] with their own
    /// [`PropagationHost`] instead.
    pub fn notify<F>(&mut self, changed: &Identifier, invalidate: F) -> PropagationReport
    where
        F: FnMut(&Identifier),
    {
        let mut pass = Propagation::new(usize::MAX);
        pass.enqueue(changed.clone());
        let mut host = RegistryHost {
            registry: self,
            invalidate,
        };
        pass.run(&mut host);
        pass.into_report()
    }

    fn node_id(&self, id: &Identifier) -> Option<NodeId> {
        self.by_id.get(id).copied()
    }

    fn intern(&mut self, id: &Identifier) -> NodeId {
        if let Some(node) = self.by_id.get(id) {
            return *node;
        }
        let node = match self.free.pop() {
            Some(node) => {
                self.nodes[node.0 as usize] = Some(id.clone());
                node
            }
            None => {
                self.nodes.push(Some(id.clone()));
                self.downstream.push(BTreeSet::new());
                self.upstream.push(BTreeSet::new());
                NodeId(self.nodes.len() as u32 - 1)
            }
        };
        self.by_id.insert(id.clone(), node);
        node
    }

    /// Give a node's slot back once no edge mentions it
    fn release_if_isolated(&mut self, node: NodeId) {
        let index = node.0 as usize;
        if !self.downstream[index].is_empty() || !self.upstream[index].is_empty() {
            return;
        }
        if let Some(id) = self.nodes[index].take() {
            self.by_id.remove(&id);
            self.free.push(node);
        }
    }

    fn remove_edge(&mut self, up: NodeId, down: NodeId) -> bool {
        let removed = self.downstream[up.0 as usize].remove(&down);
        if removed {
            self.upstream[down.0 as usize].remove(&up);
            self.edge_count -= 1;
            self.release_if_isolated(up);
            self.release_if_isolated(down);
        }
        removed
    }

    fn resolve_all(&self, nodes: &BTreeSet<NodeId>) -> Vec<Identifier> {
        nodes
            .iter()
            .filter_map(|node| self.nodes[node.0 as usize].clone())
            .collect()
    }
}

impl std::fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyRegistry")
            .field("nodes", &self.by_id.len())
            .field("edges", &self.edge_count)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Propagation host backed by nothing but the registry itself
struct RegistryHost<'a, F> {
    registry: &'a mut DependencyRegistry,
    invalidate: F,
}

impl<F> PropagationHost for RegistryHost<'_, F>
where
    F: FnMut(&Identifier),
{
    fn downstream_of(&mut self, id: &Identifier) -> Vec<Identifier> {
        self.registry.downstream_of(id)
    }

    fn invalidate(&mut self, id: &Identifier) {
        (self.invalidate)(id);
        for listener in &self.registry.listeners {
            listener.notify(id);
        }
    }

    fn drop_dependency(&mut self, upstream: &Identifier, downstream: &Identifier) {
        self.registry.deregister_dependency(upstream, downstream);
    }
}
