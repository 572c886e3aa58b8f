//! Error types for identifier construction and decoding

use thiserror::Error;

/// Errors raised when an identifier or one of its components is malformed.
///
/// These are defects in whoever builds the identifier, not user input
/// problems, so callers are expected to propagate them rather than recover.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// A class tag is empty or contains a reserved separator
    #[error("malformed class tag '{tag}': {reason}")]
    MalformedClassTag { tag: String, reason: &'static str },

    /// A type name, logical path or instance key is empty or contains a reserved separator
    #[error("malformed instance key '{key}': {reason}")]
    MalformedKey { key: String, reason: &'static str },

    /// An encoded identifier string does not follow `MID:<class>#<path>?<type>`
    #[error("malformed identifier '{id}': {reason}")]
    MalformedIdentifier { id: String, reason: &'static str },
}

impl IdentifierError {
    /// Error code for machine-readable output
    pub fn code(&self) -> &'static str {
        match self {
            IdentifierError::MalformedClassTag { .. } => "E-ID-001",
            IdentifierError::MalformedKey { .. } => "E-ID-002",
            IdentifierError::MalformedIdentifier { .. } => "E-ID-003",
        }
    }
}
