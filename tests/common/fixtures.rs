use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use metaweave::engine::{
    AnnotationValues, Cardinality, ComputeContext, ComputeError, EngineConfig, FieldFacts,
    InMemoryFacts, MetadataProvider, MetadataService, MetadataValue, TypeFacts,
};
use metaweave::ids::{ClassTag, Identifier, Marker, TypeKey, TypeName};
use parking_lot::Mutex;
use serde::Serialize;

pub const RELAY_MARKER: Marker = Marker::from_static("relay");

pub fn key(name: &str) -> TypeKey {
    TypeKey::main(name).unwrap()
}

pub fn type_name(name: &str) -> TypeName {
    TypeName::new(name).unwrap()
}

pub fn class(tag: &str) -> ClassTag {
    ClassTag::new(tag).unwrap()
}

pub fn id(tag: &str, ty: &str) -> Identifier {
    Identifier::new(class(tag), key(ty))
}

/// Value produced by a [`RelayProvider`]: the governing type's `label`
/// followed by every upstream label it read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relay {
    pub labels: Vec<String>,
}

type Hook = Arc<dyn Fn(&Identifier) + Send + Sync>;

/// Test provider reading the same governing type under other classes.
///
/// Absent when the governing type lacks the `relay` marker or any upstream
/// is Absent (unless tolerant). A blank `label` is a configuration error.
pub struct RelayProvider {
    class: ClassTag,
    upstreams: Vec<ClassTag>,
    tolerant: bool,
    calls: AtomicUsize,
    after_reads: Mutex<Option<Hook>>,
}

impl RelayProvider {
    pub fn new(tag: &str, upstreams: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            class: class(tag),
            upstreams: upstreams.iter().map(|t| class(t)).collect(),
            tolerant: false,
            calls: AtomicUsize::new(0),
            after_reads: Mutex::new(None),
        })
    }

    pub fn tolerant(tag: &str, upstreams: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            class: class(tag),
            upstreams: upstreams.iter().map(|t| class(t)).collect(),
            tolerant: true,
            calls: AtomicUsize::new(0),
            after_reads: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Run `hook` after the upstream reads of every computation
    pub fn set_after_reads(&self, hook: impl Fn(&Identifier) + Send + Sync + 'static) {
        *self.after_reads.lock() = Some(Arc::new(hook));
    }
}

impl MetadataProvider for RelayProvider {
    fn provides_class_tag(&self) -> ClassTag {
        self.class.clone()
    }

    fn interested_triggers(&self) -> BTreeSet<Marker> {
        [RELAY_MARKER].into_iter().collect()
    }

    fn compute_metadata(
        &self,
        id: &Identifier,
        ctx: &mut ComputeContext<'_>,
    ) -> Result<MetadataValue, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(facts) = ctx.governor_facts()? else {
            return Ok(MetadataValue::Absent);
        };
        let Some(relay) = AnnotationValues::read(&facts, &RELAY_MARKER) else {
            return Ok(MetadataValue::Absent);
        };
        let mut labels = vec![format!("{}:{}", self.class, relay.required_text("label")?)];

        for upstream in &self.upstreams {
            let value = ctx.get(&id.with_class(upstream.clone()))?;
            match value.downcast::<Relay>() {
                Some(relay) => labels.extend(relay.labels.iter().cloned()),
                None if self.tolerant => {}
                None => return Ok(MetadataValue::Absent),
            }
        }

        let hook = self.after_reads.lock().clone();
        if let Some(hook) = hook {
            hook(id);
        }
        Ok(MetadataValue::present(Relay { labels }))
    }
}

pub fn relay_type(name: &str, label: &str) -> TypeFacts {
    TypeFacts::new(key(name)).with_attribute(RELAY_MARKER, "label", label)
}

/// A service over one relay type `T` labelled `t`, with the given providers active
pub fn relay_service(providers: &[Arc<RelayProvider>]) -> (Arc<InMemoryFacts>, Arc<MetadataService>) {
    relay_service_with(providers, EngineConfig::default())
}

pub fn relay_service_with(
    providers: &[Arc<RelayProvider>],
    config: EngineConfig,
) -> (Arc<InMemoryFacts>, Arc<MetadataService>) {
    let facts = Arc::new(InMemoryFacts::new());
    facts.put(relay_type("T", "t"));
    let service = Arc::new(MetadataService::with_config(facts.clone(), config));
    for provider in providers {
        service.activate_provider(provider.clone()).unwrap();
    }
    (facts, service)
}

fn field(name: &str, ty: &str) -> FieldFacts {
    FieldFacts {
        name: name.to_string(),
        field_type: type_name(ty),
        cardinality: None,
        element_type: None,
    }
}

/// `shop.Order`: entity, service and controller targeting itself
pub fn order() -> TypeFacts {
    TypeFacts::new(key("shop.Order"))
        .with_marker(Marker::new("entity"))
        .with_marker(Marker::new("service"))
        .with_attribute(Marker::new("controller"), "entity", "shop.Order")
        .with_field(field("id", "Long"))
        .with_field(field("reference", "String"))
        .with_field(FieldFacts {
            name: "lines".to_string(),
            field_type: type_name("java.util.Set"),
            cardinality: Some(Cardinality::OneToMany),
            element_type: Some(type_name("shop.LineItem")),
        })
}

pub fn line_item() -> TypeFacts {
    TypeFacts::new(key("shop.LineItem"))
        .with_marker(Marker::new("entity"))
        .with_marker(Marker::new("service"))
        .with_field(field("id", "Long"))
        .with_field(field("quantity", "Integer"))
}

/// A service over the shop types with every built-in provider active
pub fn shop_service() -> (Arc<InMemoryFacts>, Arc<MetadataService>) {
    let facts = Arc::new(InMemoryFacts::new());
    facts.put(order());
    facts.put(line_item());
    let service = Arc::new(MetadataService::new(facts.clone()));
    metaweave::providers::register_builtin(&service).unwrap();
    (facts, service)
}
