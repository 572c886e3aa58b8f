//! The contract every metadata provider implements

use std::collections::BTreeSet;

use metaweave_ids::{ClassTag, Identifier, LogicalPath, Marker, TypeKey, TypeName};

use crate::{ComputeContext, ComputeError, EngineError, MetadataValue, TypeFactsSource};

/// Something that changed and may concern a provider's own identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSubject {
    /// A type's facts changed (including appearing or disappearing)
    Type(TypeKey),
    /// A metadata identifier was invalidated
    Metadata(Identifier),
}

/// Computes the metadata of one artifact kind.
///
/// Providers are registered with the
/// [`MetadataService`](crate::MetadataService) at runtime, one per class tag.
/// They hold no shared state other than a private reverse index of the
/// identifiers they own, which is rebuilt from scratch on activation.
pub trait MetadataProvider: Send + Sync {
    /// The class tag of every identifier this provider owns
    fn provides_class_tag(&self) -> ClassTag;

    /// Markers that make a governing type relevant to this provider
    fn interested_triggers(&self) -> BTreeSet<Marker>;

    fn create_local_identifier(&self, governor: &TypeName, path: &LogicalPath) -> Identifier {
        Identifier::new(
            self.provides_class_tag(),
            TypeKey::new(governor.clone(), path.clone()),
        )
    }

    /// Inverse of [`create_local_identifier`](Self::create_local_identifier)
    fn decompose_local_identifier(&self, id: &Identifier) -> Result<TypeKey, EngineError> {
        let expected = self.provides_class_tag();
        if id.class_tag() != &expected {
            return Err(EngineError::ClassMismatch {
                expected,
                found: id.clone(),
            });
        }
        Ok(id.key().clone())
    }

    /// Compute the value of one of this provider's identifiers.
    ///
    /// Every upstream read must go through `ctx`, which records the dependency
    /// edge. A governing type that no longer qualifies yields
    /// `Ok(MetadataValue::Absent)`; user misconfiguration yields
    /// `Err(ComputeError::Configuration(..))`.
    fn compute_metadata(
        &self,
        id: &Identifier,
        ctx: &mut ComputeContext<'_>,
    ) -> Result<MetadataValue, ComputeError>;

    /// Map a change elsewhere to the identifiers of this provider that must be recomputed.
    ///
    /// Covers what edges cannot: changes to types the provider never managed
    /// to read (a target that did not exist yet) and layer components that
    /// manage the provider's domain types.
    fn local_identifier_affected_by(
        &self,
        _changed: &ChangeSubject,
        _facts: &dyn TypeFactsSource,
    ) -> Vec<Identifier> {
        Vec::new()
    }

    /// Whether `downstream` (owned by this provider) still reads `upstream`.
    ///
    /// Asked before a change is propagated along an edge; answering false
    /// drops the edge.
    fn still_depends_on(
        &self,
        _downstream: &Identifier,
        _upstream: &Identifier,
        _facts: &dyn TypeFactsSource,
    ) -> bool {
        true
    }

    /// Called when the provider becomes active
    fn on_activate(&self) {}

    /// Called after the provider has been removed
    fn on_deactivate(&self) {}
}
