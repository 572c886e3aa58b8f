//! Metaweave - incremental metadata derivation
//!
//! This is the root workspace crate that provides integration tests.
//! The actual implementation is in the workspace member crates.

// Re-export main crates for convenience
pub use metaweave_engine as engine;
pub use metaweave_ids as ids;
pub use metaweave_providers as providers;
pub use metaweave_registry as registry;

pub use metaweave_engine::{MetadataProvider, MetadataService, MetadataValue};
pub use metaweave_ids::Identifier;
