//! metaweave-providers: the built-in metadata providers
//!
//! | Class        | Marker        | Reads                                  |
//! |--------------|---------------|----------------------------------------|
//! | `Entity`     | `entity`      | governing type                         |
//! | `Service`    | `service`     | governing type                         |
//! | `Controller` | `controller`  | target `Service`, detail `Entity`      |
//! | `WebJson`    | `web_json`    | object `Entity` and `Service`          |
//! | `Scaffold`   | `ui_scaffold` | proxied `Entity`, optional `Controller`|

use std::sync::Arc;

use metaweave_engine::{MetadataProvider, MetadataService, Result};
use metaweave_ids::ClassTag;

pub mod controller;
pub mod entity;
pub mod paths;
pub mod plural;
pub mod scaffold;
pub mod service_layer;
pub mod web_json;

pub use controller::{ControllerKind, ControllerMetadata, ControllerProvider, DetailBinding};
pub use entity::{EntityMetadata, EntityProvider, RelationField};
pub use scaffold::{ScaffoldMetadata, ScaffoldProvider};
pub use service_layer::{ServiceLayerProvider, ServiceMetadata};
pub use web_json::{WebJsonMetadata, WebJsonProvider};

pub const ENTITY: ClassTag = ClassTag::from_static("Entity");
pub const SERVICE: ClassTag = ClassTag::from_static("Service");
pub const CONTROLLER: ClassTag = ClassTag::from_static("Controller");
pub const WEB_JSON: ClassTag = ClassTag::from_static("WebJson");
pub const SCAFFOLD: ClassTag = ClassTag::from_static("Scaffold");

/// A fresh instance of every built-in provider
pub fn builtin_providers() -> Vec<Arc<dyn MetadataProvider>> {
    vec![
        Arc::new(EntityProvider::new()),
        Arc::new(ServiceLayerProvider::new()),
        Arc::new(ControllerProvider::new()),
        Arc::new(WebJsonProvider::new()),
        Arc::new(ScaffoldProvider::new()),
    ]
}

/// Activate every built-in provider on `service`
pub fn register_builtin(service: &MetadataService) -> Result<()> {
    for provider in builtin_providers() {
        service.activate_provider(provider)?;
    }
    Ok(())
}
