//! Binds hierarchical configuration properties to typed values.
//!
//! Properties are gathered from TOML files, environment variables,
//! command-line arguments and in-memory maps by [`Config`], then bound to any
//! [`serde::Deserialize`] type by a [`Binder`]. A [`BindHandler`] observes
//! every node of the bind and can veto it. Failures carry the origin of each
//! offending property, and [`BindFailureAnalyzer`] turns them into a report.

pub mod bind;
pub mod config;
pub mod context;
pub mod diagnostics;
mod error;

pub use bind::{
    BindContext, BindError, BindFailure, BindHandler, Bindable, Binder, Errors,
    IgnoreNestedPropertiesBindHandler, NoUnboundElementsBindHandler, TracingBindHandler, Validate,
    ValidationErrors,
};
pub use config::{Config, ConfigError, PropertyName, PropertySources};
pub use context::AppContext;
pub use diagnostics::{BindFailureAnalyzer, FailureAnalysis, FailureAnalyzer, FailureAnalyzers};
pub use error::Error;
