//! User-facing diagnostics collected during propagation

use std::fmt;

use metaweave_ids::Identifier;

use crate::ConfigurationError;

/// Severity level of a diagnostic.
///
/// Every configuration error keeps its artifact Absent, so all of them are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A configuration problem attached to the identifier it prevented
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub identifier: Identifier,
    pub error: ConfigurationError,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn new(identifier: Identifier, error: ConfigurationError) -> Self {
        Self {
            identifier,
            error,
            severity: Severity::Error,
        }
    }

    /// Error code (e.g., "E-CONFIG-001")
    pub fn code(&self) -> &'static str {
        self.error.code()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {} ({})", self.severity, self.code(), self.error, self.identifier)
    }
}
