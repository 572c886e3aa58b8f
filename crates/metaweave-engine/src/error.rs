//! Error types for the metadata engine

use std::io;

use metaweave_ids::{ClassTag, Identifier, IdentifierError, Marker, TypeName};
use metaweave_registry::RegistryError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Structural failures: the graph or a provider implementation cannot be trusted.
///
/// These cross the `get` boundary as `Err`. Missing prerequisites and user
/// misconfiguration never do; they become [`MetadataValue::Absent`](crate::MetadataValue).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("a provider for class '{0}' is already active")]
    DuplicateProvider(ClassTag),

    #[error("class tag '{0}' is reserved")]
    ReservedClassTag(ClassTag),

    #[error("identifier {found} does not belong to class '{expected}'")]
    ClassMismatch { expected: ClassTag, found: Identifier },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid engine configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl EngineError {
    /// Error code for machine-readable output
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Identifier(err) => err.code(),
            EngineError::Registry(err) => err.code(),
            EngineError::DuplicateProvider(_) => "E-ENGINE-001",
            EngineError::ReservedClassTag(_) => "E-ENGINE-002",
            EngineError::ClassMismatch { .. } => "E-ENGINE-003",
            EngineError::Io(_) => "E-ENGINE-004",
            EngineError::Config(_) => "E-ENGINE-005",
        }
    }
}

/// A governing type carries a triggering marker but its attributes cannot produce an artifact.
///
/// Reported to the user with the owning type, the attribute and the
/// offending value; the affected identifier stays Absent until fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// E-CONFIG-001: a required attribute is missing or empty
    #[error("in {owner}, marker '{marker}' must have a '{attribute}' value")]
    MissingAttribute {
        owner: TypeName,
        marker: Marker,
        attribute: String,
    },

    /// E-CONFIG-002: an attribute has a value the provider cannot use
    #[error("in {owner}, '{marker}.{attribute}' has unsupported value '{value}': {reason}")]
    InvalidAttribute {
        owner: TypeName,
        marker: Marker,
        attribute: String,
        value: String,
        reason: String,
    },

    /// E-CONFIG-003: an attribute names something that does not exist
    #[error("in {owner}, '{marker}.{attribute}' value '{value}' not found on '{target}'")]
    UnresolvedReference {
        owner: TypeName,
        marker: Marker,
        attribute: String,
        value: String,
        target: String,
    },
}

impl ConfigurationError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigurationError::MissingAttribute { .. } => "E-CONFIG-001",
            ConfigurationError::InvalidAttribute { .. } => "E-CONFIG-002",
            ConfigurationError::UnresolvedReference { .. } => "E-CONFIG-003",
        }
    }

    /// The user-authored type that needs fixing
    pub fn owner(&self) -> &TypeName {
        match self {
            ConfigurationError::MissingAttribute { owner, .. }
            | ConfigurationError::InvalidAttribute { owner, .. }
            | ConfigurationError::UnresolvedReference { owner, .. } => owner,
        }
    }

    pub fn attribute(&self) -> &str {
        match self {
            ConfigurationError::MissingAttribute { attribute, .. }
            | ConfigurationError::InvalidAttribute { attribute, .. }
            | ConfigurationError::UnresolvedReference { attribute, .. } => attribute,
        }
    }
}

/// Why a provider computation did not produce a value
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<IdentifierError> for ComputeError {
    fn from(err: IdentifierError) -> Self {
        ComputeError::Engine(err.into())
    }
}

impl From<RegistryError> for ComputeError {
    fn from(err: RegistryError) -> Self {
        ComputeError::Engine(err.into())
    }
}
