//! Error types for dependency registration

use metaweave_ids::{ClassTag, Identifier};
use thiserror::Error;

/// Rejected dependency edges.
///
/// Each of these means a provider tried to wire the graph in a way that could
/// never be correct, so they are surfaced instead of being ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// E-EDGE-001: an identifier registered as its own dependency
    #[error("invalid edge: {id} cannot depend on itself")]
    SelfDependency { id: Identifier },

    /// E-EDGE-002: both ends share a class tag
    #[error("invalid edge: {upstream} -> {downstream} share class tag '{class}'")]
    SameClass {
        upstream: Identifier,
        downstream: Identifier,
        class: ClassTag,
    },

    /// E-EDGE-003: a physical type identifier used as a downstream
    #[error("invalid edge: physical type {downstream} cannot depend on {upstream}")]
    PhysicalDownstream {
        upstream: Identifier,
        downstream: Identifier,
    },
}

impl RegistryError {
    /// Error code for machine-readable output
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::SelfDependency { .. } => "E-EDGE-001",
            RegistryError::SameClass { .. } => "E-EDGE-002",
            RegistryError::PhysicalDownstream { .. } => "E-EDGE-003",
        }
    }
}
