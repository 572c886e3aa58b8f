//! metaweave-ids: metadata identifiers
//!
//! Every derived artifact is addressed by an [`Identifier`] made of two parts:
//! - the [`ClassTag`] of the provider that owns it
//! - the [`TypeKey`] of the governing type (fully qualified name + [`LogicalPath`])
//!
//! Identifiers travel as strings of the form `MID:<class>#<path>?<type>`.
//! The codec here is a bijection between well-formed components and those
//! strings; anything that would break it is rejected with an
//! [`IdentifierError`].
//!
//! # Example
//!
//! ```
//! use metaweave_ids::{ClassTag, Identifier, LogicalPath, TypeKey, TypeName};
//!
//! const CONTROLLER: ClassTag = ClassTag::from_static("Controller");
//!
//! let key = TypeKey::new(TypeName::new("shop.Order").unwrap(), LogicalPath::main());
//! let id = Identifier::new(CONTROLLER, key);
//! assert_eq!(id.to_string(), "MID:Controller#main?shop.Order");
//! assert_eq!(id.to_string().parse::<Identifier>().unwrap(), id);
//! ```

mod error;
mod identifier;
mod names;

pub use error::IdentifierError;
pub use identifier::{class_tag_of, decode, encode, Identifier};
pub use names::{ClassTag, LogicalPath, Marker, TypeKey, TypeName};

/// Prefix every encoded identifier starts with
pub const MID_PREFIX: &str = "MID:";

/// Separates the class tag from the instance key
pub const CLASS_SEPARATOR: char = '#';

/// Separates the logical path from the type name inside an instance key
pub const TYPE_SEPARATOR: char = '?';

/// Separates an optional module from the source root inside a logical path
pub const MODULE_SEPARATOR: char = '|';
