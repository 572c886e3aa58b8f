//! Identifier components: class tags, markers, type names and logical paths

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{IdentifierError, CLASS_SEPARATOR, MODULE_SEPARATOR, TYPE_SEPARATOR};

/// The artifact kind a provider produces (e.g. `Controller`, `WebJson`).
///
/// Non-empty and free of `#`, `?` and `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassTag(Cow<'static, str>);

impl ClassTag {
    /// Class tag reserved for the raw facts of a governing type
    pub const PHYSICAL_TYPE: ClassTag = ClassTag::from_static("PhysicalType");

    /// Create a class tag from a runtime string
    pub fn new(tag: impl Into<String>) -> Result<Self, IdentifierError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(IdentifierError::MalformedClassTag {
                tag,
                reason: "class tag is empty",
            });
        }
        if tag.contains([CLASS_SEPARATOR, TYPE_SEPARATOR, ':']) {
            return Err(IdentifierError::MalformedClassTag {
                tag,
                reason: "class tag contains a reserved separator",
            });
        }
        Ok(ClassTag(Cow::Owned(tag)))
    }

    /// Create a class tag from a literal, validated at compile time when used in a `const`
    pub const fn from_static(tag: &'static str) -> Self {
        let bytes = tag.as_bytes();
        assert!(!bytes.is_empty(), "class tag is empty");
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            assert!(
                b != b'#' && b != b'?' && b != b':',
                "class tag contains a reserved separator"
            );
            i += 1;
        }
        ClassTag(Cow::Borrowed(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the reserved physical-type class
    pub fn is_physical(&self) -> bool {
        *self == Self::PHYSICAL_TYPE
    }
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ClassTag {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ClassTag::new(value)
    }
}

impl From<ClassTag> for String {
    fn from(tag: ClassTag) -> Self {
        tag.0.into_owned()
    }
}

/// An annotation carried by a governing type (e.g. `controller`, `entity`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Marker(Cow<'static, str>);

impl Marker {
    pub fn new(marker: impl Into<String>) -> Self {
        Marker(Cow::Owned(marker.into()))
    }

    pub const fn from_static(marker: &'static str) -> Self {
        Marker(Cow::Borrowed(marker))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Marker {
    fn from(value: String) -> Self {
        Marker::new(value)
    }
}

impl From<Marker> for String {
    fn from(marker: Marker) -> Self {
        marker.0.into_owned()
    }
}

/// Fully qualified name of a governing type, e.g. `shop.domain.Order`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Result<Self, IdentifierError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IdentifierError::MalformedKey {
                key: name,
                reason: "type name is empty",
            });
        }
        if name.contains([CLASS_SEPARATOR, TYPE_SEPARATOR]) {
            return Err(IdentifierError::MalformedKey {
                key: name,
                reason: "type name contains a reserved separator",
            });
        }
        Ok(TypeName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after the last `.`, or the whole name for unqualified types
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TypeName {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeName::new(s)
    }
}

impl TryFrom<String> for TypeName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TypeName::new(value)
    }
}

impl From<TypeName> for String {
    fn from(name: TypeName) -> Self {
        name.0
    }
}

/// Distinguishes source roots that may contain same-named types.
///
/// Encoded as `<root>` or `<module>|<root>`, e.g. `main`, `test`, `billing|main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalPath {
    module: Option<String>,
    root: String,
}

impl LogicalPath {
    pub fn new(module: Option<&str>, root: &str) -> Result<Self, IdentifierError> {
        if let Some(module) = module {
            Self::check_part(module, "module is empty")?;
        }
        Self::check_part(root, "source root is empty")?;
        Ok(LogicalPath {
            module: module.map(str::to_string),
            root: root.to_string(),
        })
    }

    /// Production sources of the root module
    pub fn main() -> Self {
        LogicalPath {
            module: None,
            root: "main".to_string(),
        }
    }

    /// Test sources of the root module
    pub fn test() -> Self {
        LogicalPath {
            module: None,
            root: "test".to_string(),
        }
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn check_part(part: &str, empty_reason: &'static str) -> Result<(), IdentifierError> {
        if part.is_empty() {
            return Err(IdentifierError::MalformedKey {
                key: part.to_string(),
                reason: empty_reason,
            });
        }
        if part.contains([CLASS_SEPARATOR, TYPE_SEPARATOR, MODULE_SEPARATOR]) {
            return Err(IdentifierError::MalformedKey {
                key: part.to_string(),
                reason: "logical path contains a reserved separator",
            });
        }
        Ok(())
    }
}

impl Default for LogicalPath {
    fn default() -> Self {
        Self::main()
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}{}{}", module, MODULE_SEPARATOR, self.root),
            None => f.write_str(&self.root),
        }
    }
}

impl FromStr for LogicalPath {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(MODULE_SEPARATOR) {
            Some((module, root)) => LogicalPath::new(Some(module), root),
            None => LogicalPath::new(None, s),
        }
    }
}

impl TryFrom<String> for LogicalPath {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogicalPath> for String {
    fn from(path: LogicalPath) -> Self {
        path.to_string()
    }
}

/// The instance half of an identifier: a governing type in one logical path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey {
    pub name: TypeName,
    #[serde(default)]
    pub path: LogicalPath,
}

impl TypeKey {
    pub fn new(name: TypeName, path: LogicalPath) -> Self {
        Self { name, path }
    }

    /// Shorthand for a type in the production root, mostly useful in tests and fixtures
    pub fn main(name: &str) -> Result<Self, IdentifierError> {
        Ok(Self::new(TypeName::new(name)?, LogicalPath::main()))
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.path, TYPE_SEPARATOR, self.name)
    }
}

impl FromStr for TypeKey {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, name) = s
            .split_once(TYPE_SEPARATOR)
            .ok_or_else(|| IdentifierError::MalformedKey {
                key: s.to_string(),
                reason: "instance key has no type separator",
            })?;
        Ok(TypeKey::new(TypeName::new(name)?, path.parse()?))
    }
}
