use std::path::Path;

use tracing::debug;

use super::args::CommandLineSource;
use super::env::EnvSource;
use super::file::FileSource;
use super::map::MapSource;
use super::source::{PropertySource, PropertySources};
use super::ConfigError;

/// Builder for loading configuration properties from multiple sources.
///
/// Sources are applied in registration order, with later sources taking
/// precedence over earlier ones. Values are kept as text; conversion to the
/// target types happens when they are bound.
///
/// ## Placeholders
///
/// String values can reference other properties using `${path.to.field}`
/// syntax, with an optional default after a colon:
///
/// ```toml
/// [server]
/// host = "localhost"
/// port = 8080
/// url = "http://${server.host}:${server.port}/${server.path:api}"
/// ```
///
/// Use `$$` to escape a literal `$` (e.g., `$${VAR}` becomes `${VAR}`).
/// Placeholders are resolved when a value is bound, against all sources.
///
/// ## Example
///
/// ```no_run
/// use dragon_bind::{Binder, Config};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Server {
///     host: String,
///     port: u16,
/// }
///
/// let sources = Config::builder()
///     .with_file("config/default.toml", true)
///     .with_file("config/local.toml", false)
///     .with_env("MYAPP", "__")
///     .build()?;
///
/// let server: Option<Server> = Binder::new(sources).bind("server")?;
/// # Ok::<(), dragon_bind::Error>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct Config {
    sources: Vec<Box<dyn PropertySource>>,
}

impl Config {
    /// Creates a new configuration builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Adds a TOML file to be loaded.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    /// Optional files that are missing are silently skipped.
    pub fn with_file(self, path: impl AsRef<Path>, required: bool) -> Self {
        self.with_source(FileSource::new(path, required))
    }

    /// Loads configuration from environment variables with the given prefix.
    ///
    /// Environment variables are mapped to property names by:
    /// 1. Removing the prefix and separator
    /// 2. Splitting remaining segments on the separator
    /// 3. Converting path segments to lowercase
    ///
    /// With `MYAPP__DATABASE__HOST=localhost`, `database.host` binds to
    /// `localhost`.
    pub fn with_env(self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.with_source(EnvSource::new(prefix, separator))
    }

    /// Adds a named set of in-memory properties.
    pub fn with_map<K, V>(
        self,
        name: impl Into<String>,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.with_source(MapSource::new(name, entries))
    }

    /// Adds `--key=value` command-line options.
    pub fn with_args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_source(CommandLineSource::new(args))
    }

    /// Adds any other [`PropertySource`].
    pub fn with_source(mut self, source: impl PropertySource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Loads every registered source.
    pub fn build(self) -> Result<PropertySources, ConfigError> {
        let mut loaded = PropertySources::new();

        for source in self.sources {
            let properties = source.properties()?;
            debug!(
                source = source.name(),
                properties = properties.len(),
                "loaded property source"
            );
            loaded.push(source.name(), properties);
        }

        Ok(loaded)
    }
}
