//! Typed access to a marker's attributes on a governing type

use metaweave_ids::{Marker, TypeName};

use crate::{AttributeValue, ConfigurationError, TypeFacts};

/// The attributes of one marker on one type, with errors phrased for the user
pub struct AnnotationValues<'a> {
    facts: &'a TypeFacts,
    marker: Marker,
}

impl<'a> AnnotationValues<'a> {
    /// None if the type does not carry the marker
    pub fn read(facts: &'a TypeFacts, marker: &Marker) -> Option<Self> {
        facts.has_marker(marker).then(|| Self {
            facts,
            marker: marker.clone(),
        })
    }

    pub fn owner(&self) -> &TypeName {
        &self.facts.name
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    pub fn raw(&self, attribute: &str) -> Option<&'a AttributeValue> {
        self.facts.attribute(&self.marker, attribute)
    }

    /// A text attribute, None when absent or blank
    pub fn text(&self, attribute: &str) -> Result<Option<&'a str>, ConfigurationError> {
        match self.raw(attribute) {
            None => Ok(None),
            Some(AttributeValue::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(AttributeValue::Text(s)) => Ok(Some(s.trim())),
            Some(other) => Err(self.invalid(attribute, other.to_string(), "expected text")),
        }
    }

    pub fn required_text(&self, attribute: &str) -> Result<&'a str, ConfigurationError> {
        self.text(attribute)?.ok_or_else(|| self.missing(attribute))
    }

    /// A text attribute naming a type
    pub fn type_name(&self, attribute: &str) -> Result<Option<TypeName>, ConfigurationError> {
        match self.text(attribute)? {
            None => Ok(None),
            Some(name) => TypeName::new(name)
                .map(Some)
                .map_err(|err| self.invalid(attribute, name.to_string(), &err.to_string())),
        }
    }

    pub fn required_type_name(&self, attribute: &str) -> Result<TypeName, ConfigurationError> {
        self.type_name(attribute)?
            .ok_or_else(|| self.missing(attribute))
    }

    pub fn flag(&self, attribute: &str, default: bool) -> Result<bool, ConfigurationError> {
        match self.raw(attribute) {
            None => Ok(default),
            Some(AttributeValue::Bool(b)) => Ok(*b),
            Some(other) => Err(self.invalid(attribute, other.to_string(), "expected true or false")),
        }
    }

    pub fn missing(&self, attribute: &str) -> ConfigurationError {
        ConfigurationError::MissingAttribute {
            owner: self.facts.name.clone(),
            marker: self.marker.clone(),
            attribute: attribute.to_string(),
        }
    }

    pub fn invalid(&self, attribute: &str, value: String, reason: &str) -> ConfigurationError {
        ConfigurationError::InvalidAttribute {
            owner: self.facts.name.clone(),
            marker: self.marker.clone(),
            attribute: attribute.to_string(),
            value,
            reason: reason.to_string(),
        }
    }

    pub fn unresolved(&self, attribute: &str, value: &str, target: impl Into<String>) -> ConfigurationError {
        ConfigurationError::UnresolvedReference {
            owner: self.facts.name.clone(),
            marker: self.marker.clone(),
            attribute: attribute.to_string(),
            value: value.to_string(),
            target: target.into(),
        }
    }
}
