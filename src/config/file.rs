//! File-based configuration source.

use std::path::{Path, PathBuf};

use toml::Value;
use tracing::debug;

use super::name::PropertyName;
use super::source::{ConfigurationProperty, Origin, PropertySource};
use super::ConfigError;

/// A configuration source that loads from a TOML file.
///
/// Files can be marked as required or optional. Required files that don't exist
/// cause an error; optional files that don't exist are silently skipped.
///
/// Tables and arrays are flattened into dotted and indexed property names:
///
/// ```toml
/// [server]
/// hosts = ["a", "b"]
/// ```
///
/// yields `server.hosts[0]` and `server.hosts[1]`. The source is named after
/// the file path.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    required: bool,
}

impl FileSource {
    /// Creates a new file source.
    ///
    /// If `required` is true, the build will fail if the file doesn't exist.
    pub fn new(path: impl AsRef<Path>, required: bool) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            path,
            required,
        }
    }
}

impl PropertySource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self) -> Result<Vec<ConfigurationProperty>, ConfigError> {
        let Some(table) = load_config_file(&self.path, self.required)? else {
            debug!(path = %self.path.display(), "optional config file not found, skipping");
            return Ok(Vec::new());
        };

        let mut properties = Vec::new();
        for (key, value) in &table {
            flatten(&self.name, &PropertyName::empty(), key, value, &mut properties);
        }
        Ok(properties)
    }
}

/// Loads and parses a TOML config file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
fn load_config_file(path: &Path, required: bool) -> Result<Option<toml::Table>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let table = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(Some(table))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn flatten(
    source: &str,
    parent: &PropertyName,
    segment: &str,
    value: &Value,
    out: &mut Vec<ConfigurationProperty>,
) {
    let name = parent.append(segment);
    flatten_value(source, name, value, out);
}

fn flatten_value(source: &str, name: PropertyName, value: &Value, out: &mut Vec<ConfigurationProperty>) {
    let text = match value {
        Value::Table(table) => {
            for (key, value) in table {
                flatten(source, &name, key, value, out);
            }
            return;
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_value(source, name.append_index(index), item, out);
            }
            return;
        }
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(dt) => dt.to_string(),
    };

    let key = name.to_string();
    out.push(ConfigurationProperty::new(name, text, Origin::new(source, key)));
}
