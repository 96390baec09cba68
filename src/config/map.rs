//! In-memory configuration source.

use super::name::PropertyName;
use super::source::{ConfigurationProperty, Origin, PropertySource};
use super::ConfigError;

/// A named set of key/value pairs, kept in insertion order.
///
/// Useful for defaults supplied by the application and for tests.
#[derive(Debug, Clone)]
pub struct MapSource {
    name: String,
    entries: Vec<(String, String)>,
}

impl MapSource {
    pub fn new<K, V>(name: impl Into<String>, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            entries: entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl PropertySource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self) -> Result<Vec<ConfigurationProperty>, ConfigError> {
        self.entries
            .iter()
            .map(|(key, value)| {
                let name = PropertyName::of(key)?;
                Ok(ConfigurationProperty::new(
                    name,
                    value.clone(),
                    Origin::new(&self.name, key),
                ))
            })
            .collect()
    }
}
