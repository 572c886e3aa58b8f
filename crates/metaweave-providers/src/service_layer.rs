//! Service layer metadata: the plural and base path under which a domain type is exposed

use std::collections::BTreeSet;

use metaweave_engine::{
    AnnotationValues, ChangeSubject, ComputeContext, ComputeError, MetadataProvider,
    MetadataValue, TypeFactsSource,
};
use metaweave_ids::{ClassTag, Identifier, Marker, TypeName};
use serde::Serialize;

use crate::paths::{normalize_prefix, prefix_problem};
use crate::plural::pluralize;
use crate::SERVICE;

pub const SERVICE_MARKER: Marker = Marker::from_static("service");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceMetadata {
    pub domain_type: TypeName,
    pub plural: String,
    /// `<prefix>/<lower-case plural>`, always starting with a slash
    pub path: String,
}

/// Provides [`ServiceMetadata`] for types carrying the `service` marker.
///
/// Attributes: `plural` (defaults to the English plural of the simple name)
/// and `path_prefix`.
#[derive(Debug, Default)]
pub struct ServiceLayerProvider;

impl ServiceLayerProvider {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataProvider for ServiceLayerProvider {
    fn provides_class_tag(&self) -> ClassTag {
        SERVICE
    }

    fn interested_triggers(&self) -> BTreeSet<Marker> {
        [SERVICE_MARKER].into_iter().collect()
    }

    fn compute_metadata(
        &self,
        _id: &Identifier,
        ctx: &mut ComputeContext<'_>,
    ) -> Result<MetadataValue, ComputeError> {
        let Some(facts) = ctx.governor_facts()? else {
            return Ok(MetadataValue::Absent);
        };
        let Some(service) = AnnotationValues::read(&facts, &SERVICE_MARKER) else {
            return Ok(MetadataValue::Absent);
        };

        let plural = match service.text("plural")? {
            Some(plural) => plural.to_string(),
            None => pluralize(facts.name.simple_name()),
        };
        let prefix = service.text("path_prefix")?;
        if let Some(reason) = prefix.and_then(prefix_problem) {
            let value = prefix.unwrap_or_default().to_string();
            return Err(service.invalid("path_prefix", value, reason).into());
        }

        let path = format!("{}/{}", normalize_prefix(prefix), plural.to_lowercase());
        tracing::trace!("service path of {} is {}", facts.name, path);
        Ok(MetadataValue::present(ServiceMetadata {
            domain_type: facts.name.clone(),
            plural,
            path,
        }))
    }

    /// A layer component (repository, service implementation) managing a
    /// domain type changes that type's service metadata.
    fn local_identifier_affected_by(
        &self,
        changed: &ChangeSubject,
        facts: &dyn TypeFactsSource,
    ) -> Vec<Identifier> {
        let ChangeSubject::Type(key) = changed else {
            return Vec::new();
        };
        let Some(component) = facts.type_facts(key) else {
            return Vec::new();
        };
        component
            .layer_entities
            .iter()
            .filter_map(|entity| facts.locate(entity))
            .filter(|entity_key| entity_key != key)
            .map(|entity_key| self.create_local_identifier(&entity_key.name, &entity_key.path))
            .collect()
    }
}
