//! Command-line argument configuration source.

use super::name::PropertyName;
use super::source::{ConfigurationProperty, Origin, PropertySource};
use super::ConfigError;

/// Name under which command-line arguments are reported in diagnostics.
pub const COMMAND_LINE_SOURCE_NAME: &str = "commandLineArgs";

/// Reads `--key=value` options from a list of arguments.
///
/// `--flag` without a value binds the empty string. Arguments that do not
/// start with `--` are not options and are ignored, as is everything after a
/// bare `--`.
#[derive(Debug, Clone)]
pub struct CommandLineSource {
    args: Vec<String>,
}

impl CommandLineSource {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl PropertySource for CommandLineSource {
    fn name(&self) -> &str {
        COMMAND_LINE_SOURCE_NAME
    }

    fn properties(&self) -> Result<Vec<ConfigurationProperty>, ConfigError> {
        let mut properties = Vec::new();

        for arg in &self.args {
            if arg == "--" {
                break;
            }
            let Some(option) = arg.strip_prefix("--") else {
                continue;
            };
            let (key, value) = option.split_once('=').unwrap_or((option, ""));
            let name = PropertyName::of(key.trim())?;
            if name.is_empty() {
                return Err(ConfigError::InvalidPropertyName(arg.clone()));
            }
            properties.push(ConfigurationProperty::new(
                name,
                value,
                Origin::new(COMMAND_LINE_SOURCE_NAME, key.trim()),
            ));
        }

        Ok(properties)
    }
}
