//! JSON endpoint metadata

use std::collections::{BTreeSet, HashMap};

use metaweave_engine::{
    AnnotationValues, ChangeSubject, ComputeContext, ComputeError, MetadataProvider,
    MetadataValue, TypeFactsSource,
};
use metaweave_ids::{ClassTag, Identifier, Marker, TypeName};
use parking_lot::Mutex;
use serde::Serialize;

use crate::controller::CONTROLLER_MARKER;
use crate::entity::EntityMetadata;
use crate::service_layer::ServiceMetadata;
use crate::{CONTROLLER, ENTITY, SERVICE, WEB_JSON};

pub const WEB_JSON_MARKER: Marker = Marker::from_static("web_json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebJsonMetadata {
    pub json_object: TypeName,
    pub path: String,
    pub identifier_field: String,
    /// False when a controller on the same type already brings the layer components in
    pub introduce_layer_components: bool,
}

/// Provides [`WebJsonMetadata`] for types carrying the `web_json` marker.
///
/// Requires the entity and service metadata of the `json_object` type. When
/// the same type is also a controller, the controller metadata is registered
/// as an upstream without being read.
#[derive(Debug, Default)]
pub struct WebJsonProvider {
    /// Managed object type name to the endpoints exposing it
    objects: Mutex<HashMap<TypeName, BTreeSet<Identifier>>>,
}

impl WebJsonProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_object(&self, endpoint: &Identifier, object: Option<&TypeName>) {
        let mut index = self.objects.lock();
        index.retain(|_, ids| {
            ids.remove(endpoint);
            !ids.is_empty()
        });
        if let Some(object) = object {
            index
                .entry(object.clone())
                .or_default()
                .insert(endpoint.clone());
        }
    }

    fn endpoints_of(&self, object: &TypeName) -> Vec<Identifier> {
        self.objects
            .lock()
            .get(object)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl MetadataProvider for WebJsonProvider {
    fn provides_class_tag(&self) -> ClassTag {
        WEB_JSON
    }

    fn interested_triggers(&self) -> BTreeSet<Marker> {
        [WEB_JSON_MARKER].into_iter().collect()
    }

    fn compute_metadata(
        &self,
        id: &Identifier,
        ctx: &mut ComputeContext<'_>,
    ) -> Result<MetadataValue, ComputeError> {
        let Some(facts) = ctx.governor_facts()? else {
            self.record_object(id, None);
            return Ok(MetadataValue::Absent);
        };
        let Some(web_json) = AnnotationValues::read(&facts, &WEB_JSON_MARKER) else {
            self.record_object(id, None);
            return Ok(MetadataValue::Absent);
        };
        let object = web_json.required_type_name("json_object")?;
        self.record_object(id, Some(&object));

        let Some(object_key) = ctx.locate(&object) else {
            return Err(web_json
                .unresolved("json_object", object.as_str(), "the project")
                .into());
        };

        let entity = ctx.get(&Identifier::new(ENTITY, object_key.clone()))?;
        let Some(entity) = entity.downcast::<EntityMetadata>() else {
            return Ok(MetadataValue::Absent);
        };
        let service = ctx.get(&Identifier::new(SERVICE, object_key))?;
        let Some(service) = service.downcast::<ServiceMetadata>() else {
            return Ok(MetadataValue::Absent);
        };

        let is_controller = facts.has_marker(&CONTROLLER_MARKER);
        if is_controller {
            ctx.register_dependency(&id.with_class(CONTROLLER))?;
        }

        Ok(MetadataValue::present(WebJsonMetadata {
            json_object: object,
            path: service.path.clone(),
            identifier_field: entity.identifier_field.clone(),
            introduce_layer_components: !is_controller,
        }))
    }

    fn local_identifier_affected_by(
        &self,
        changed: &ChangeSubject,
        facts: &dyn TypeFactsSource,
    ) -> Vec<Identifier> {
        let ChangeSubject::Type(key) = changed else {
            return Vec::new();
        };
        let mut affected = self.endpoints_of(&key.name);
        if let Some(component) = facts.type_facts(key) {
            for object in &component.layer_entities {
                affected.extend(self.endpoints_of(object));
            }
        }
        affected.retain(|endpoint| endpoint.key() != key);
        affected
    }

    fn on_activate(&self) {
        self.objects.lock().clear();
    }

    fn on_deactivate(&self) {
        self.objects.lock().clear();
    }
}
