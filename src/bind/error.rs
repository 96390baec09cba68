use std::fmt;

use thiserror::Error;

use super::validation::ValidationErrors;
use crate::config::{ConfigurationProperty, PlaceholderError, PropertyName};

/// Failure to bind the properties under a name to a target type.
///
/// The [`cause`](Self::cause) says what went wrong; [`property`](Self::property)
/// is the property being bound when it happened, if there was one.
#[derive(Debug, Clone, Error)]
#[error("Failed to bind properties under '{name}' to {target}")]
pub struct BindError {
    name: PropertyName,
    target: String,
    property: Option<ConfigurationProperty>,
    #[source]
    cause: BindFailure,
    located: bool,
}

/// What went wrong while binding.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum BindFailure {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    UnboundElements(#[from] UnboundElements),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    #[error("{0}")]
    Message(String),
}

/// Properties that were supplied but never consumed by the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnboundElements {
    properties: Vec<ConfigurationProperty>,
}

impl UnboundElements {
    pub fn new(properties: Vec<ConfigurationProperty>) -> Self {
        Self { properties }
    }

    pub fn properties(&self) -> &[ConfigurationProperty] {
        &self.properties
    }
}

impl fmt::Display for UnboundElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("The elements [")?;
        for (i, property) in self.properties.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", property.name)?;
        }
        f.write_str("] were left unbound.")
    }
}

impl std::error::Error for UnboundElements {}

/// A value that could not be converted to the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to convert value \"{value}\" to {target}: {message}")]
pub struct ConversionError {
    pub value: String,
    pub target: &'static str,
    pub message: String,
}

impl BindError {
    pub fn new(
        name: PropertyName,
        target: impl Into<String>,
        property: Option<ConfigurationProperty>,
        cause: impl Into<BindFailure>,
    ) -> Self {
        Self {
            name,
            target: target.into(),
            property,
            cause: cause.into(),
            located: true,
        }
    }

    /// An error raised without knowing which property was being bound. The
    /// binder attaches the name on the way out.
    pub(crate) fn unlocated(cause: impl Into<BindFailure>) -> Self {
        Self {
            name: PropertyName::empty(),
            target: String::new(),
            property: None,
            cause: cause.into(),
            located: false,
        }
    }

    pub(crate) fn located(mut self, name: &PropertyName) -> Self {
        if !self.located {
            self.name = name.clone();
            self.located = true;
        }
        self
    }

    pub(crate) fn with_target(mut self, target: &str) -> Self {
        if self.target.is_empty() {
            self.target = target.to_string();
        }
        self
    }

    pub fn name(&self) -> &PropertyName {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn property(&self) -> Option<&ConfigurationProperty> {
        self.property.as_ref()
    }

    pub fn cause(&self) -> &BindFailure {
        &self.cause
    }
}

impl serde::de::Error for BindError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        BindError::unlocated(BindFailure::Message(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Origin;

    fn property(key: &str, value: &str) -> ConfigurationProperty {
        ConfigurationProperty::new(PropertyName::of(key).unwrap(), value, Origin::new("test", key))
    }

    #[test]
    fn test_unbound_elements_message_lists_every_name() {
        let unbound = UnboundElements::new(vec![
            property("test.foo.listValue[2]", "world"),
            property("test.foo.listValue[3]", "!"),
        ]);
        assert_eq!(
            unbound.to_string(),
            "The elements [test.foo.listvalue[2], test.foo.listvalue[3]] were left unbound."
        );
    }

    #[test]
    fn test_custom_errors_are_located_once() {
        let error: BindError = serde::de::Error::custom("missing field `port`");
        let inner = PropertyName::of("server.http").unwrap();
        let outer = PropertyName::of("server").unwrap();
        let error = error.located(&inner).located(&outer).with_target("Http");

        assert_eq!(error.name(), &inner);
        assert_eq!(
            error.to_string(),
            "Failed to bind properties under 'server.http' to Http"
        );
        assert_eq!(error.cause().to_string(), "missing field `port`");
    }
}
