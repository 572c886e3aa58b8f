//! Controller metadata: web controllers targeting a domain type

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use metaweave_engine::{
    AnnotationValues, ChangeSubject, ComputeContext, ComputeError, ConfigurationError,
    MetadataProvider, MetadataValue, TypeFacts, TypeFactsSource,
};
use metaweave_ids::{ClassTag, Identifier, Marker, TypeKey, TypeName};
use parking_lot::Mutex;
use serde::Serialize;

use crate::entity::EntityMetadata;
use crate::paths::{join, normalize_prefix, prefix_problem};
use crate::service_layer::ServiceMetadata;
use crate::{CONTROLLER, ENTITY, SERVICE};

pub const CONTROLLER_MARKER: Marker = Marker::from_static("controller");
pub const DETAIL_MARKER: Marker = Marker::from_static("detail");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    Collection,
    Item,
    Search,
    Detail,
}

impl FromStr for ControllerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "collection" => Ok(ControllerKind::Collection),
            "item" => Ok(ControllerKind::Item),
            "search" => Ok(ControllerKind::Search),
            "detail" => Ok(ControllerKind::Detail),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerKind::Collection => "collection",
            ControllerKind::Item => "item",
            ControllerKind::Search => "search",
            ControllerKind::Detail => "detail",
        };
        f.write_str(name)
    }
}

/// The relation a detail controller exposes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailBinding {
    pub relation_field: String,
    pub child: TypeName,
    /// Base path of the child's service
    pub child_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerMetadata {
    pub controller: TypeName,
    pub entity: TypeName,
    pub kind: ControllerKind,
    /// Controller prefix followed by the entity's service path
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<DetailBinding>,
}

/// What a controller's attributes say it targets
struct Target {
    entity: TypeKey,
    child: Option<TypeName>,
}

/// Provides [`ControllerMetadata`] for types carrying the `controller` marker.
///
/// Attributes: `entity` (required), `type` (defaults to `collection`) and
/// `path_prefix`. Detail controllers also need the `detail` marker with a
/// `relation_field` naming a collection relation of the entity.
#[derive(Debug, Default)]
pub struct ControllerProvider {
    /// Entity (and detail child) type name to the controllers targeting it
    targets: Mutex<HashMap<TypeName, BTreeSet<Identifier>>>,
}

impl ControllerProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Controllers last seen targeting `entity`
    pub fn controllers_of(&self, entity: &TypeName) -> Vec<Identifier> {
        self.targets
            .lock()
            .get(entity)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn record_targets(&self, controller: &Identifier, targets: &[&TypeName]) {
        let mut index = self.targets.lock();
        index.retain(|_, ids| {
            ids.remove(controller);
            !ids.is_empty()
        });
        for target in targets {
            index
                .entry((*target).clone())
                .or_default()
                .insert(controller.clone());
        }
    }

    /// Read the targets from the controller's facts without computing anything
    fn current_target(facts: &TypeFacts, source: &dyn TypeFactsSource) -> Option<Target> {
        let controller = AnnotationValues::read(facts, &CONTROLLER_MARKER)?;
        let entity = controller.type_name("entity").ok()??;
        let child = AnnotationValues::read(facts, &DETAIL_MARKER)
            .and_then(|detail| detail.text("relation_field").ok().flatten().map(str::to_string))
            .and_then(|field| {
                let entity_facts = source.type_facts(&source.locate(&entity)?)?;
                let relation = entity_facts.field(&field)?;
                relation
                    .element_type
                    .clone()
                    .or_else(|| Some(relation.field_type.clone()))
            });
        Some(Target {
            entity: source.locate(&entity)?,
            child,
        })
    }

    fn detail_binding(
        &self,
        id: &Identifier,
        ctx: &mut ComputeContext<'_>,
        facts: &TypeFacts,
        entity_key: &TypeKey,
    ) -> Result<Option<DetailBinding>, ComputeError> {
        let Some(detail) = AnnotationValues::read(facts, &DETAIL_MARKER) else {
            return Err(ConfigurationError::MissingAttribute {
                owner: facts.name.clone(),
                marker: DETAIL_MARKER,
                attribute: "relation_field".to_string(),
            }
            .into());
        };
        let relation_field = detail.required_text("relation_field")?;

        let entity = ctx.get(&Identifier::new(ENTITY, entity_key.clone()))?;
        let Some(entity) = entity.downcast::<EntityMetadata>() else {
            return Ok(None);
        };
        let Some(relation) = entity.relation(relation_field) else {
            return Err(detail
                .unresolved("relation_field", relation_field, entity.entity.as_str())
                .into());
        };
        if !relation.cardinality.is_collection() {
            let reason = format!(
                "{} relations cannot back a detail controller, use one_to_many or many_to_many",
                relation.cardinality
            );
            return Err(detail
                .invalid("relation_field", relation_field.to_string(), &reason)
                .into());
        }

        // before locating, so the child appearing later reaches this controller
        self.record_targets(id, &[&entity.entity, &relation.child]);
        let Some(child_key) = ctx.locate(&relation.child) else {
            return Err(detail
                .unresolved("relation_field", relation_field, relation.child.as_str())
                .into());
        };
        let child_service = ctx.get(&Identifier::new(SERVICE, child_key))?;
        let Some(child_service) = child_service.downcast::<ServiceMetadata>() else {
            return Ok(None);
        };

        Ok(Some(DetailBinding {
            relation_field: relation.name.clone(),
            child: relation.child.clone(),
            child_path: child_service.path.clone(),
        }))
    }
}

impl MetadataProvider for ControllerProvider {
    fn provides_class_tag(&self) -> ClassTag {
        CONTROLLER
    }

    fn interested_triggers(&self) -> BTreeSet<Marker> {
        [CONTROLLER_MARKER, DETAIL_MARKER].into_iter().collect()
    }

    fn compute_metadata(
        &self,
        id: &Identifier,
        ctx: &mut ComputeContext<'_>,
    ) -> Result<MetadataValue, ComputeError> {
        let Some(facts) = ctx.governor_facts()? else {
            self.record_targets(id, &[]);
            return Ok(MetadataValue::Absent);
        };
        let Some(controller) = AnnotationValues::read(&facts, &CONTROLLER_MARKER) else {
            self.record_targets(id, &[]);
            return Ok(MetadataValue::Absent);
        };

        let entity = controller.required_type_name("entity")?;
        self.record_targets(id, &[&entity]);

        let kind = match controller.text("type")? {
            None => ControllerKind::Collection,
            Some(kind) => kind.parse::<ControllerKind>().map_err(|_| {
                controller.invalid(
                    "type",
                    kind.to_string(),
                    "expected collection, item, search or detail",
                )
            })?,
        };
        let prefix = controller.text("path_prefix")?.map(str::to_lowercase);
        if let Some(reason) = prefix.as_deref().and_then(prefix_problem) {
            let value = prefix.clone().unwrap_or_default();
            return Err(controller.invalid("path_prefix", value, reason).into());
        }

        let Some(entity_key) = ctx.locate(&entity) else {
            return Err(controller
                .unresolved("entity", entity.as_str(), "the project")
                .into());
        };
        let service = ctx.get(&Identifier::new(SERVICE, entity_key.clone()))?;
        let Some(service) = service.downcast::<ServiceMetadata>() else {
            return Ok(MetadataValue::Absent);
        };
        let path = join(&normalize_prefix(prefix.as_deref()), &service.path);

        let detail = if kind == ControllerKind::Detail {
            let Some(binding) = self.detail_binding(id, ctx, &facts, &entity_key)? else {
                return Ok(MetadataValue::Absent);
            };
            Some(binding)
        } else {
            None
        };

        Ok(MetadataValue::present(ControllerMetadata {
            controller: facts.name.clone(),
            entity,
            kind,
            path,
            detail,
        }))
    }

    /// Controllers targeting a changed type, or a domain type the changed
    /// layer component manages.
    fn local_identifier_affected_by(
        &self,
        changed: &ChangeSubject,
        facts: &dyn TypeFactsSource,
    ) -> Vec<Identifier> {
        let ChangeSubject::Type(key) = changed else {
            return Vec::new();
        };
        let mut affected = self.controllers_of(&key.name);
        if let Some(component) = facts.type_facts(key) {
            for entity in &component.layer_entities {
                affected.extend(self.controllers_of(entity));
            }
        }
        affected.retain(|controller| controller.key() != key);
        affected
    }

    /// An edge from another type's entity or service metadata is stale once
    /// the controller targets something else.
    fn still_depends_on(
        &self,
        downstream: &Identifier,
        upstream: &Identifier,
        facts: &dyn TypeFactsSource,
    ) -> bool {
        let class = upstream.class_tag();
        if class != &SERVICE && class != &ENTITY {
            return true;
        }
        let Some(own) = facts.type_facts(downstream.key()) else {
            return true;
        };
        let Some(target) = Self::current_target(&own, facts) else {
            return false;
        };
        if upstream.key() == &target.entity {
            return true;
        }
        class == &SERVICE && target.child.as_ref() == Some(upstream.type_name())
    }

    fn on_activate(&self) {
        self.targets.lock().clear();
    }

    fn on_deactivate(&self) {
        self.targets.lock().clear();
    }
}
