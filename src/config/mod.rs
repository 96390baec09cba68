//! Configuration sources and property names.

mod args;
mod builder;
mod env;
mod error;
mod file;
mod map;
pub mod name;
mod resolve;
mod source;

pub use args::{CommandLineSource, COMMAND_LINE_SOURCE_NAME};
pub use builder::Config;
pub use env::{EnvSource, ENV_SOURCE_NAME};
pub use error::ConfigError;
pub use file::FileSource;
pub use map::MapSource;
pub use name::PropertyName;
pub use resolve::{PlaceholderError, PlaceholderResolver};
pub use source::{ConfigurationProperty, Origin, PropertySource, PropertySources, SourceScope};
