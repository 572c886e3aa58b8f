//! metaweave-registry: who must be recomputed when something changes
//!
//! The [`DependencyRegistry`] is a directed graph over [`Identifier`]s. An
//! edge `upstream -> downstream` says that a change to `upstream` makes the
//! value of `downstream` stale. Edges are discovered while providers compute
//! their metadata, so the graph grows and shrinks as the project evolves.
//!
//! Change notification walks the graph breadth-first with an explicit
//! worklist ([`Propagation`]). A per-pass visited set guarantees termination
//! on cyclic graphs: every identifier is invalidated at most once per pass.
//!
//! Invariants enforced on every edge:
//! - no self edges
//! - no edges between identifiers of the same class tag
//! - physical type identifiers are only ever upstream

mod error;
mod graph;
mod listener;
mod propagate;

pub use error::RegistryError;
pub use graph::{DependencyRegistry, NodeId};
pub use listener::NotificationListener;
pub use propagate::{Propagation, PropagationHost, PropagationReport};

pub use metaweave_ids::Identifier;
