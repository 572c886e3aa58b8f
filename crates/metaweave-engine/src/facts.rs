//! Type facts: what the outside world knows about governing types
//!
//! The engine never parses sources. A [`TypeFactsSource`] hands out the
//! current markers, attributes and fields of a type and is assumed to be up to
//! date whenever it is asked.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use metaweave_ids::{LogicalPath, Marker, TypeKey, TypeName};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Value of one marker attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            AttributeValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

/// Attribute name to value for one marker occurrence
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Relationship multiplicity of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Whether the field holds a collection of the element type
    pub fn is_collection(self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cardinality::OneToOne => "one_to_one",
            Cardinality::OneToMany => "one_to_many",
            Cardinality::ManyToOne => "many_to_one",
            Cardinality::ManyToMany => "many_to_many",
        };
        f.write_str(name)
    }
}

/// A field declared on a governing type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFacts {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: TypeName,
    /// Set for relation fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
    /// Element type of collection fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<TypeName>,
}

/// Everything the engine may read about one governing type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeFacts {
    pub name: TypeName,

    #[serde(default)]
    pub path: LogicalPath,

    /// Markers present on the type, with their attributes
    #[serde(default)]
    pub markers: BTreeMap<Marker, Attributes>,

    #[serde(default)]
    pub fields: Vec<FieldFacts>,

    /// Domain types managed by this type when it is a layer component (service, repository)
    #[serde(default)]
    pub layer_entities: Vec<TypeName>,
}

impl TypeFacts {
    /// Facts for a type with no markers or fields yet
    pub fn new(key: TypeKey) -> Self {
        Self {
            name: key.name,
            path: key.path,
            markers: BTreeMap::new(),
            fields: Vec::new(),
            layer_entities: Vec::new(),
        }
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::new(self.name.clone(), self.path.clone())
    }

    pub fn has_marker(&self, marker: &Marker) -> bool {
        self.markers.contains_key(marker)
    }

    pub fn marker_set(&self) -> BTreeSet<Marker> {
        self.markers.keys().cloned().collect()
    }

    pub fn attributes(&self, marker: &Marker) -> Option<&Attributes> {
        self.markers.get(marker)
    }

    pub fn attribute(&self, marker: &Marker, name: &str) -> Option<&AttributeValue> {
        self.markers.get(marker).and_then(|attrs| attrs.get(name))
    }

    pub fn field(&self, name: &str) -> Option<&FieldFacts> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Add a marker without attributes
    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.entry(marker).or_default();
        self
    }

    /// Set a marker attribute, adding the marker if needed
    pub fn with_attribute(
        mut self,
        marker: Marker,
        name: &str,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.markers
            .entry(marker)
            .or_default()
            .insert(name.to_string(), value.into());
        self
    }

    pub fn with_field(mut self, field: FieldFacts) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_layer_entity(mut self, entity: TypeName) -> Self {
        self.layer_entities.push(entity);
        self
    }
}

/// Read-only view of the current type facts
pub trait TypeFactsSource: Send + Sync {
    /// Current facts of a type, or None if it does not exist
    fn type_facts(&self, key: &TypeKey) -> Option<TypeFacts>;

    /// Find the logical path of a type known only by name
    fn locate(&self, name: &TypeName) -> Option<TypeKey>;

    /// Every known type, used for a full re-scan
    fn all_types(&self) -> Vec<TypeKey>;
}

/// In-memory type facts store
///
/// Backs tests and the CLI, which loads facts from JSON files.
#[derive(Debug, Default)]
pub struct InMemoryFacts {
    types: RwLock<BTreeMap<TypeKey, TypeFacts>>,
}

impl InMemoryFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a type's facts, returning the previous ones
    pub fn put(&self, facts: TypeFacts) -> Option<TypeFacts> {
        self.types.write().insert(facts.key(), facts)
    }

    pub fn remove(&self, key: &TypeKey) -> Option<TypeFacts> {
        self.types.write().remove(key)
    }

    /// Modify a type's facts in place, returning false if the type is unknown
    pub fn update<F>(&self, key: &TypeKey, edit: F) -> bool
    where
        F: FnOnce(&mut TypeFacts),
    {
        match self.types.write().get_mut(key) {
            Some(facts) => {
                edit(facts);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

impl TypeFactsSource for InMemoryFacts {
    fn type_facts(&self, key: &TypeKey) -> Option<TypeFacts> {
        self.types.read().get(key).cloned()
    }

    fn locate(&self, name: &TypeName) -> Option<TypeKey> {
        self.types
            .read()
            .keys()
            .find(|key| &key.name == name)
            .cloned()
    }

    fn all_types(&self) -> Vec<TypeKey> {
        self.types.read().keys().cloned().collect()
    }
}
