use tracing::trace;

use super::name::{Element, PropertyName};
use super::source::{ConfigurationProperty, Origin, PropertySource};
use super::ConfigError;

/// Name under which environment variables are reported in diagnostics.
pub const ENV_SOURCE_NAME: &str = "systemEnvironment";

/// Environment variables mapped onto property names.
///
/// With prefix `MYAPP` and separator `__`, `MYAPP__DATABASE__HOST` becomes
/// `database.host`. Segments are lower-cased and purely numeric segments act
/// as indexes, so `MYAPP__SERVERS__0__HOST` binds `servers[0].host`. An empty
/// prefix maps every variable.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    separator: String,
    vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        assert!(!separator.is_empty(), "separator must not be empty");
        Self {
            prefix: prefix.into(),
            separator,
            vars: None,
        }
    }

    /// Uses a fixed set of variables instead of the process environment.
    pub fn with_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars = Some(
            vars.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }

    fn property_name(&self, key: &str) -> Option<PropertyName> {
        let path = if self.prefix.is_empty() {
            key
        } else {
            key.strip_prefix(&self.prefix)?
                .strip_prefix(&self.separator)?
        };
        if path.is_empty() {
            return None;
        }

        let mut elements = Vec::new();
        for segment in path.split(&self.separator) {
            if segment.is_empty() {
                return None;
            }
            if segment.bytes().all(|b| b.is_ascii_digit()) {
                elements.push(Element::indexed(segment));
            } else {
                elements.push(Element::dashed(segment));
            }
        }
        Some(PropertyName::from_elements(elements))
    }
}

impl PropertySource for EnvSource {
    fn name(&self) -> &str {
        ENV_SOURCE_NAME
    }

    fn properties(&self) -> Result<Vec<ConfigurationProperty>, ConfigError> {
        let vars = match &self.vars {
            Some(vars) => vars.clone(),
            None => std::env::vars().collect(),
        };

        let mut properties = Vec::new();
        for (key, value) in vars {
            match self.property_name(&key) {
                Some(name) => {
                    let origin = Origin::new(ENV_SOURCE_NAME, &key);
                    properties.push(ConfigurationProperty::new(name, value, origin));
                }
                None => trace!(variable = %key, "environment variable not mapped"),
            }
        }

        Ok(properties)
    }
}
