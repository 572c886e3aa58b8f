//! UI scaffolding metadata: the list shell generated for a proxied entity

use std::collections::{BTreeSet, HashMap};

use metaweave_engine::{
    AnnotationValues, ChangeSubject, ComputeContext, ComputeError, MetadataProvider,
    MetadataValue, TypeFactsSource,
};
use metaweave_ids::{ClassTag, Identifier, Marker, TypeName};
use parking_lot::Mutex;
use serde::Serialize;

use crate::controller::ControllerMetadata;
use crate::entity::EntityMetadata;
use crate::{CONTROLLER, ENTITY, SCAFFOLD};

pub const SCAFFOLD_MARKER: Marker = Marker::from_static("ui_scaffold");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaffoldMetadata {
    pub proxy_for: TypeName,
    /// Columns of the list view: the identifier, then every plain field
    pub columns: Vec<String>,
    /// Where the list loads from, when a controller for it exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_path: Option<String>,
}

/// Provides [`ScaffoldMetadata`] for types carrying the `ui_scaffold` marker.
///
/// Requires the entity named by `proxy_for`. A `controller` attribute names
/// the controller type backing the list; while that controller is Absent the
/// scaffold is still produced, without a list path.
#[derive(Debug, Default)]
pub struct ScaffoldProvider {
    /// Proxied and controller type names to the scaffolds naming them
    references: Mutex<HashMap<TypeName, BTreeSet<Identifier>>>,
}

impl ScaffoldProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scaffolds last seen naming `ty` as proxied entity or controller
    pub fn scaffolds_of(&self, ty: &TypeName) -> Vec<Identifier> {
        self.references
            .lock()
            .get(ty)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Recorded before the names are resolved, so a type created later still
    /// reaches the scaffold that named it
    fn record_references(&self, scaffold: &Identifier, names: &[&TypeName]) {
        let mut index = self.references.lock();
        index.retain(|_, ids| {
            ids.remove(scaffold);
            !ids.is_empty()
        });
        for name in names {
            index
                .entry((*name).clone())
                .or_default()
                .insert(scaffold.clone());
        }
    }
}

impl MetadataProvider for ScaffoldProvider {
    fn provides_class_tag(&self) -> ClassTag {
        SCAFFOLD
    }

    fn interested_triggers(&self) -> BTreeSet<Marker> {
        [SCAFFOLD_MARKER].into_iter().collect()
    }

    fn compute_metadata(
        &self,
        id: &Identifier,
        ctx: &mut ComputeContext<'_>,
    ) -> Result<MetadataValue, ComputeError> {
        let Some(facts) = ctx.governor_facts()? else {
            self.record_references(id, &[]);
            return Ok(MetadataValue::Absent);
        };
        let Some(scaffold) = AnnotationValues::read(&facts, &SCAFFOLD_MARKER) else {
            self.record_references(id, &[]);
            return Ok(MetadataValue::Absent);
        };
        let proxy_for = scaffold.required_type_name("proxy_for")?;
        let controller = scaffold.type_name("controller")?;
        let mut named = vec![&proxy_for];
        named.extend(controller.as_ref());
        self.record_references(id, &named);

        let Some(proxy_key) = ctx.locate(&proxy_for) else {
            return Err(scaffold
                .unresolved("proxy_for", proxy_for.as_str(), "the project")
                .into());
        };
        let entity = ctx.get(&Identifier::new(ENTITY, proxy_key))?;
        let Some(entity) = entity.downcast::<EntityMetadata>() else {
            return Ok(MetadataValue::Absent);
        };

        let list_path = match controller {
            None => None,
            Some(controller) => {
                let Some(controller_key) = ctx.locate(&controller) else {
                    return Err(scaffold
                        .unresolved("controller", controller.as_str(), "the project")
                        .into());
                };
                let value = ctx.get(&Identifier::new(CONTROLLER, controller_key))?;
                let path = value
                    .downcast::<ControllerMetadata>()
                    .map(|controller| controller.path.clone());
                if path.is_none() {
                    tracing::debug!(
                        "controller {} of scaffold {} is absent, omitting list path",
                        controller,
                        facts.name
                    );
                }
                path
            }
        };

        let columns = std::iter::once(entity.identifier_field.clone())
            .chain(entity.fields.iter().cloned())
            .collect();
        Ok(MetadataValue::present(ScaffoldMetadata {
            proxy_for,
            columns,
            list_path,
        }))
    }

    /// Scaffolds naming a changed type that may just have been created
    fn local_identifier_affected_by(
        &self,
        changed: &ChangeSubject,
        _facts: &dyn TypeFactsSource,
    ) -> Vec<Identifier> {
        let ChangeSubject::Type(key) = changed else {
            return Vec::new();
        };
        let mut affected = self.scaffolds_of(&key.name);
        affected.retain(|scaffold| scaffold.key() != key);
        affected
    }

    fn on_activate(&self) {
        self.references.lock().clear();
    }

    fn on_deactivate(&self) {
        self.references.lock().clear();
    }
}
