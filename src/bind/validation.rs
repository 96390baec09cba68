use std::fmt;

use thiserror::Error;

use crate::config::{ConfigurationProperty, Origin, PropertyName};

/// Message used for object errors rejected without one of their own.
pub const OBJECT_ERROR_MESSAGE: &str = "This object could not be bound.";

/// Trait for validating a bound configuration value.
///
/// Called by [`Binder::bind_validated`](crate::Binder::bind_validated) after
/// binding. Implementations report problems into `errors`; field paths are
/// relative to the value being validated.
///
/// ## Example
///
/// ```
/// use dragon_bind::{Errors, Validate};
///
/// struct Server {
///     host: Option<String>,
///     port: u16,
/// }
///
/// impl Validate for Server {
///     fn validate(&self, errors: &mut Errors) {
///         if self.host.is_none() {
///             errors.reject_null("host", "may not be null");
///         }
///         if self.port < 1024 {
///             errors.reject_value("port", self.port, "must be at least 1024");
///         }
///     }
/// }
/// ```
pub trait Validate {
    /// The default implementation accepts everything.
    fn validate(&self, _errors: &mut Errors) {}
}

/// A validation error on a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    field: String,
    rejected: Option<String>,
    message: String,
}

impl FieldError {
    /// Dotted path of the field, relative to the validated value.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The rejected value, or `None` when the field had no value.
    pub fn rejected_value(&self) -> Option<&str> {
        self.rejected.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A validation error on the value as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectError {
    message: String,
}

impl ObjectError {
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for ObjectError {
    fn default() -> Self {
        Self {
            message: OBJECT_ERROR_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Field(FieldError),
    Object(ObjectError),
}

impl ValidationError {
    pub fn message(&self) -> &str {
        match self {
            ValidationError::Field(error) => error.message(),
            ValidationError::Object(error) => error.message(),
        }
    }
}

/// Collects validation errors in the order they are reported.
#[derive(Debug, Clone, Default)]
pub struct Errors {
    errors: Vec<ValidationError>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the value as a whole.
    pub fn reject(&mut self, message: impl Into<String>) {
        self.errors.push(ValidationError::Object(ObjectError {
            message: message.into(),
        }));
    }

    /// Rejects the value as a whole with the default message.
    pub fn reject_object(&mut self) {
        self.errors.push(ValidationError::Object(ObjectError::default()));
    }

    /// Rejects a field that holds `value`.
    pub fn reject_value(&mut self, field: &str, value: impl fmt::Display, message: impl Into<String>) {
        self.push_field(field, Some(value.to_string()), message.into());
    }

    /// Rejects a field that has no value.
    pub fn reject_null(&mut self, field: &str, message: impl Into<String>) {
        self.push_field(field, None, message.into());
    }

    /// Validates a nested value, prefixing its field paths with `field`.
    pub fn nested<V: Validate + ?Sized>(&mut self, field: &str, value: &V) {
        let mut nested = Errors::new();
        value.validate(&mut nested);
        for error in nested.errors {
            match error {
                ValidationError::Field(mut error) => {
                    error.field = format!("{field}.{}", error.field);
                    self.errors.push(ValidationError::Field(error));
                }
                object => self.errors.push(object),
            }
        }
    }

    fn push_field(&mut self, field: &str, rejected: Option<String>, message: String) {
        self.errors.push(ValidationError::Field(FieldError {
            field: field.to_string(),
            rejected,
            message,
        }));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.errors
    }
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self, errors: &mut Errors) {
        if let Some(value) = self {
            value.validate(errors);
        }
    }
}

/// Validation failure of a bound value.
///
/// Carries the properties consumed while binding so diagnostics can report
/// where a rejected value came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Binding validation errors on {name}")]
pub struct ValidationErrors {
    name: PropertyName,
    errors: Vec<ValidationError>,
    bound: Vec<ConfigurationProperty>,
}

impl ValidationErrors {
    pub fn new(
        name: PropertyName,
        errors: Vec<ValidationError>,
        bound: Vec<ConfigurationProperty>,
    ) -> Self {
        Self {
            name,
            errors,
            bound,
        }
    }

    pub fn name(&self) -> &PropertyName {
        &self.name
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn bound_properties(&self) -> &[ConfigurationProperty] {
        &self.bound
    }

    /// Full property name of a field error.
    pub fn property_name(&self, error: &FieldError) -> PropertyName {
        match PropertyName::of(error.field()) {
            Ok(field) => self.name.join(&field),
            Err(_) => self.name.append(error.field()),
        }
    }

    /// Origin of the property bound under `name`, if it was bound.
    pub fn origin_of(&self, name: &PropertyName) -> Option<&Origin> {
        self.bound
            .iter()
            .find(|property| &property.name == name)
            .map(|property| &property.origin)
    }
}
