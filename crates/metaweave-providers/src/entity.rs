//! Entity metadata: the persistent shape of a domain type

use std::collections::BTreeSet;

use metaweave_engine::{
    AnnotationValues, Cardinality, ComputeContext, ComputeError, MetadataProvider, MetadataValue,
};
use metaweave_ids::{ClassTag, Identifier, Marker, TypeName};
use serde::Serialize;

use crate::ENTITY;

pub const ENTITY_MARKER: Marker = Marker::from_static("entity");

/// A field pointing at another entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationField {
    pub name: String,
    pub cardinality: Cardinality,
    /// Element type for collections, the field type otherwise
    pub child: TypeName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityMetadata {
    pub entity: TypeName,
    /// Name of the identifier field, `id` unless the marker says otherwise
    pub identifier_field: String,
    /// Plain fields, in declaration order
    pub fields: Vec<String>,
    pub relations: Vec<RelationField>,
}

impl EntityMetadata {
    pub fn relation(&self, name: &str) -> Option<&RelationField> {
        self.relations.iter().find(|relation| relation.name == name)
    }
}

/// Provides [`EntityMetadata`] for types carrying the `entity` marker
#[derive(Debug, Default)]
pub struct EntityProvider;

impl EntityProvider {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataProvider for EntityProvider {
    fn provides_class_tag(&self) -> ClassTag {
        ENTITY
    }

    fn interested_triggers(&self) -> BTreeSet<Marker> {
        [ENTITY_MARKER].into_iter().collect()
    }

    fn compute_metadata(
        &self,
        _id: &Identifier,
        ctx: &mut ComputeContext<'_>,
    ) -> Result<MetadataValue, ComputeError> {
        let Some(facts) = ctx.governor_facts()? else {
            return Ok(MetadataValue::Absent);
        };
        let Some(entity) = AnnotationValues::read(&facts, &ENTITY_MARKER) else {
            return Ok(MetadataValue::Absent);
        };
        let identifier_field = entity.text("identifier")?.unwrap_or("id").to_string();

        let mut fields = Vec::new();
        let mut relations = Vec::new();
        for field in &facts.fields {
            match field.cardinality {
                Some(cardinality) => relations.push(RelationField {
                    name: field.name.clone(),
                    cardinality,
                    child: field
                        .element_type
                        .clone()
                        .unwrap_or_else(|| field.field_type.clone()),
                }),
                None if field.name != identifier_field => fields.push(field.name.clone()),
                None => {}
            }
        }

        Ok(MetadataValue::present(EntityMetadata {
            entity: facts.name.clone(),
            identifier_field,
            fields,
            relations,
        }))
    }
}
