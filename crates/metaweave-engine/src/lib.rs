//! metaweave-engine: incremental metadata service
//!
//! The [`MetadataService`] answers "what is the metadata of this identifier?"
//! by delegating to the [`MetadataProvider`] registered for the identifier's
//! class tag, memoizing the answer, and invalidating it when anything it was
//! computed from changes.
//!
//! Providers read type facts and other metadata through a [`ComputeContext`];
//! each such read registers a dependency edge, so the graph needs no
//! up-front declaration. Type changes enter through
//! [`MetadataService::notify_type_changed`], which consults the
//! [`TriggerIndex`] to find the providers concerned.
//!
//! Misconfigured types never fail a read: the affected identifier reads as
//! [`MetadataValue::Absent`] and a [`Diagnostic`] is published once the
//! current propagation settles.

mod annotation;
mod cache;
mod config;
mod context;
mod diagnostics;
mod error;
mod facts;
mod provider;
mod service;
mod trigger;
mod value;

pub use annotation::AnnotationValues;
pub use cache::{CacheLookup, CacheStamp, CacheStats, MetadataCache};
pub use config::EngineConfig;
pub use context::ComputeContext;
pub use diagnostics::{Diagnostic, Severity};
pub use error::{ComputeError, ConfigurationError, EngineError, Result};
pub use facts::{
    AttributeValue, Attributes, Cardinality, FieldFacts, InMemoryFacts, TypeFacts, TypeFactsSource,
};
pub use provider::{ChangeSubject, MetadataProvider};
pub use service::MetadataService;
pub use trigger::TriggerIndex;
pub use value::{MetadataItem, MetadataValue};

pub use metaweave_ids::{ClassTag, Identifier, LogicalPath, Marker, TypeKey, TypeName};
pub use metaweave_registry::{NotificationListener, PropagationReport};
