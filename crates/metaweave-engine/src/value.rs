//! Metadata values produced by providers

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// A computed artifact, opaque to the engine.
///
/// Implemented for every `Serialize + Debug` type, so providers only need to
/// derive those on their metadata structs.
pub trait MetadataItem: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// JSON rendering used for diagnostics and the CLI
    fn to_json(&self) -> serde_json::Value;
}

impl<T> MetadataItem for T
where
    T: Any + fmt::Debug + Send + Sync + Serialize,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Result of computing one identifier.
///
/// `Absent` is a legitimate value meaning "no artifact can exist right now",
/// which is different from "not computed yet".
#[derive(Debug, Clone)]
pub enum MetadataValue {
    Absent,
    Present(Arc<dyn MetadataItem>),
}

impl MetadataValue {
    pub fn present<T: MetadataItem>(item: T) -> Self {
        MetadataValue::Present(Arc::new(item))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, MetadataValue::Absent)
    }

    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    pub fn item(&self) -> Option<&Arc<dyn MetadataItem>> {
        match self {
            MetadataValue::Present(item) => Some(item),
            MetadataValue::Absent => None,
        }
    }

    /// Borrow the artifact as its concrete type, if present and of that type
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.item().and_then(|item| {
            let item: &dyn MetadataItem = item.as_ref();
            item.as_any().downcast_ref::<T>()
        })
    }

    /// Whether both values are the very same computed object (or both Absent)
    pub fn same_object(&self, other: &MetadataValue) -> bool {
        match (self, other) {
            (MetadataValue::Absent, MetadataValue::Absent) => true,
            (MetadataValue::Present(a), MetadataValue::Present(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetadataValue::Present(item) => item.to_json(),
            MetadataValue::Absent => serde_json::Value::Null,
        }
    }
}

impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other) || (self.is_present() && other.is_present() && self.to_json() == other.to_json())
    }
}
