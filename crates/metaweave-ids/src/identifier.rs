//! The identifier type and its string codec

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ClassTag, IdentifierError, LogicalPath, TypeKey, TypeName, CLASS_SEPARATOR, MID_PREFIX};

/// Names one artifact instance: which provider owns it and which governing type it was computed for.
///
/// Equality, hashing and ordering are component-wise, which coincides with
/// comparing the encoded strings because the codec is a bijection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    class: ClassTag,
    key: TypeKey,
}

impl Identifier {
    /// Build an identifier from already validated components
    pub fn new(class: ClassTag, key: TypeKey) -> Self {
        Self { class, key }
    }

    /// The identifier of a type's raw facts
    pub fn physical(key: TypeKey) -> Self {
        Self::new(ClassTag::PHYSICAL_TYPE, key)
    }

    pub fn class_tag(&self) -> &ClassTag {
        &self.class
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn type_name(&self) -> &TypeName {
        &self.key.name
    }

    pub fn path(&self) -> &LogicalPath {
        &self.key.path
    }

    pub fn is_physical(&self) -> bool {
        self.class.is_physical()
    }

    /// Whether both identifiers belong to the same provider
    pub fn same_class(&self, other: &Identifier) -> bool {
        self.class == other.class
    }

    /// The same governing type under another class tag
    pub fn with_class(&self, class: ClassTag) -> Identifier {
        Identifier::new(class, self.key.clone())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}", MID_PREFIX, self.class, CLASS_SEPARATOR, self.key)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (class, key) = decode(s)?;
        Ok(Identifier::new(class, key))
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.to_string()
    }
}

/// Encode a class tag and an instance key (`<path>?<type>`) into an identifier.
///
/// Fails if either part is malformed, in particular when the instance key
/// contains the class separator.
pub fn encode(class_tag: &str, instance_key: &str) -> Result<Identifier, IdentifierError> {
    if instance_key.contains(CLASS_SEPARATOR) {
        return Err(IdentifierError::MalformedKey {
            key: instance_key.to_string(),
            reason: "instance key contains the class separator",
        });
    }
    let class = ClassTag::new(class_tag)?;
    let key: TypeKey = instance_key.parse()?;
    Ok(Identifier::new(class, key))
}

/// Split an encoded identifier into its class tag and instance key
pub fn decode(id: &str) -> Result<(ClassTag, TypeKey), IdentifierError> {
    let body = id
        .strip_prefix(MID_PREFIX)
        .ok_or_else(|| IdentifierError::MalformedIdentifier {
            id: id.to_string(),
            reason: "missing MID: prefix",
        })?;
    let (class, key) = body
        .split_once(CLASS_SEPARATOR)
        .ok_or_else(|| IdentifierError::MalformedIdentifier {
            id: id.to_string(),
            reason: "missing class separator",
        })?;
    Ok((ClassTag::new(class)?, key.parse()?))
}

/// The class tag of an encoded identifier, without validating the instance key
pub fn class_tag_of(id: &str) -> Result<ClassTag, IdentifierError> {
    let body = id
        .strip_prefix(MID_PREFIX)
        .ok_or_else(|| IdentifierError::MalformedIdentifier {
            id: id.to_string(),
            reason: "missing MID: prefix",
        })?;
    let class = body.split(CLASS_SEPARATOR).next().unwrap_or(body);
    ClassTag::new(class)
}
