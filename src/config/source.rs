use std::collections::BTreeMap;
use std::fmt;

use super::name::PropertyName;
use super::ConfigError;

/// Where a configuration value came from.
///
/// The key is kept exactly as the source supplied it, so diagnostics can point
/// at `listValue[2]` even though the property is known as `listvalue[2]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    source: String,
    key: String,
}

impl Origin {
    pub fn new(source: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            key: key.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" from property source \"{}\"", self.key, self.source)
    }
}

/// A single configuration value together with its name and origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationProperty {
    pub name: PropertyName,
    pub value: String,
    pub origin: Origin,
}

impl ConfigurationProperty {
    pub fn new(name: PropertyName, value: impl Into<String>, origin: Origin) -> Self {
        Self {
            name,
            value: value.into(),
            origin,
        }
    }
}

/// A named provider of configuration properties.
pub trait PropertySource: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn properties(&self) -> Result<Vec<ConfigurationProperty>, ConfigError>;
}

#[derive(Debug, Clone)]
struct LoadedSource {
    name: String,
    properties: BTreeMap<PropertyName, ConfigurationProperty>,
}

impl LoadedSource {
    /// Properties strictly below `name`, in name order.
    fn descendants<'s>(&'s self, name: &PropertyName) -> Vec<&'s ConfigurationProperty> {
        self.properties
            .range(name..)
            .skip_while(|(key, _)| *key == name)
            .take_while(|(key, _)| name.is_ancestor_of(key))
            .map(|(_, property)| property)
            .collect()
    }

    fn contains(&self, name: &PropertyName) -> bool {
        self.properties.contains_key(name) || !self.descendants(name).is_empty()
    }
}

/// The materialized, ordered set of property sources used for binding.
///
/// Sources pushed later take precedence over sources pushed earlier.
#[derive(Debug, Clone, Default)]
pub struct PropertySources {
    sources: Vec<LoadedSource>,
}

impl PropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source with higher precedence than every source added before it.
    ///
    /// Within one source, a later property replaces an earlier one with the
    /// same relaxed name.
    pub fn push(
        &mut self,
        name: impl Into<String>,
        properties: impl IntoIterator<Item = ConfigurationProperty>,
    ) {
        let properties = properties
            .into_iter()
            .map(|property| (property.name.clone(), property))
            .collect();
        self.sources.push(LoadedSource {
            name: name.into(),
            properties,
        });
    }

    /// Source names, lowest precedence first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|source| source.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.sources.iter().all(|source| source.properties.is_empty())
    }

    /// Every source, merged by precedence.
    pub fn scope(&self) -> SourceScope<'_> {
        SourceScope {
            sources: &self.sources,
        }
    }

    /// Looks up the effective property with exactly this name.
    pub fn get(&self, name: &PropertyName) -> Option<&ConfigurationProperty> {
        self.scope().get(name)
    }

    pub fn contains_descendant_of(&self, name: &PropertyName) -> bool {
        self.scope().contains_descendant_of(name)
    }

    /// Returns true when there is a value at `name` or anything below it.
    pub fn contains(&self, name: &PropertyName) -> bool {
        self.scope().contains(name)
    }

    /// Effective properties strictly below `name`, in name order.
    pub fn descendants(&self, name: &PropertyName) -> Vec<&ConfigurationProperty> {
        self.scope().descendants(name)
    }

    /// Names of the immediate children of `name`, in name order.
    pub fn children(&self, name: &PropertyName) -> Vec<PropertyName> {
        self.scope().children(name)
    }
}

/// A view over some of the sources of a [`PropertySources`].
///
/// Either every source, merged by precedence, or a single source on its own.
#[derive(Debug, Clone, Copy)]
pub struct SourceScope<'a> {
    sources: &'a [LoadedSource],
}

impl<'a> SourceScope<'a> {
    /// Names of the sources in view, lowest precedence first.
    pub fn names(self) -> impl Iterator<Item = &'a str> {
        self.sources.iter().map(|source| source.name.as_str())
    }

    /// The highest-precedence source with a value at `name` or below it.
    pub fn source_of(self, name: &PropertyName) -> Option<SourceScope<'a>> {
        let index = self.sources.iter().rposition(|source| source.contains(name))?;
        Some(SourceScope {
            sources: &self.sources[index..=index],
        })
    }

    pub fn get(self, name: &PropertyName) -> Option<&'a ConfigurationProperty> {
        self.sources
            .iter()
            .rev()
            .find_map(|source| source.properties.get(name))
    }

    pub fn contains_descendant_of(self, name: &PropertyName) -> bool {
        self.sources
            .iter()
            .any(|source| !source.descendants(name).is_empty())
    }

    pub fn contains(self, name: &PropertyName) -> bool {
        self.sources.iter().any(|source| source.contains(name))
    }

    pub fn descendants(self, name: &PropertyName) -> Vec<&'a ConfigurationProperty> {
        let mut merged = BTreeMap::new();
        for source in self.sources {
            for property in source.descendants(name) {
                merged.insert(&property.name, property);
            }
        }
        merged.into_values().collect()
    }

    pub fn children(self, name: &PropertyName) -> Vec<PropertyName> {
        let depth = name.number_of_elements() + 1;
        let mut children: Vec<PropertyName> = Vec::new();
        for source in self.sources {
            for property in source.descendants(name) {
                let child = property.name.chop(depth);
                if !children.contains(&child) {
                    children.push(child);
                }
            }
        }
        children.sort();
        children
    }
}
