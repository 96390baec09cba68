use std::fmt;

use tracing::debug;

use super::analysis::FailureAnalysis;
use crate::bind::{BindError, BindFailure, UnboundElements, ValidationError, ValidationErrors};
use crate::config::Origin;
use crate::Error;

const UPDATE_CONFIGURATION: &str = "Update your application's configuration";

/// Recognizes a kind of failure and explains it.
pub trait FailureAnalyzer: Send + Sync + fmt::Debug {
    /// Returns `None` when the failure is not one this analyzer understands.
    fn analyze(&self, failure: &Error) -> Option<FailureAnalysis>;
}

/// Explains the first [`BindError`] in a failure's cause chain.
///
/// Each offending property is described in its own block:
///
/// ```text
///     Property: test.foo.value
///     Value: 4
///     Origin: "test.foo.value" from property source "test"
///     Reason: at least five
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct BindFailureAnalyzer;

impl FailureAnalyzer for BindFailureAnalyzer {
    fn analyze(&self, failure: &Error) -> Option<FailureAnalysis> {
        let error = failure.bind_error()?;
        let description = match error.cause() {
            BindFailure::Validation(validation) => describe_validation(error, validation),
            BindFailure::UnboundElements(unbound) => describe_unbound(error, unbound),
            _ => describe_failure(error),
        };
        Some(FailureAnalysis::new(
            description,
            UPDATE_CONFIGURATION,
            error.clone(),
        ))
    }
}

/// One property block of a description.
#[derive(Default)]
struct Block<'e> {
    property: Option<String>,
    value: Option<&'e str>,
    origin: Option<&'e Origin>,
    reason: String,
}

impl fmt::Display for Block<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        if let Some(property) = &self.property {
            writeln!(f, "    Property: {property}")?;
        }
        if let Some(value) = self.value {
            writeln!(f, "    Value: {value}")?;
        }
        if let Some(origin) = self.origin {
            writeln!(f, "    Origin: {origin}")?;
        }
        writeln!(f, "    Reason: {}", self.reason)
    }
}

fn render<'e>(header: String, blocks: impl IntoIterator<Item = Block<'e>>) -> String {
    let mut description = header;
    description.push('\n');
    for block in blocks {
        description.push_str(&block.to_string());
    }
    description.truncate(description.trim_end().len());
    description
}

fn describe_validation(error: &BindError, validation: &ValidationErrors) -> String {
    let blocks = validation.errors().iter().map(|failure| match failure {
        ValidationError::Field(field) => {
            let name = validation.property_name(field);
            Block {
                value: Some(field.rejected_value().unwrap_or("null")),
                origin: validation.origin_of(&name),
                property: Some(name.to_string()),
                reason: field.message().to_string(),
            }
        }
        ValidationError::Object(object) => Block {
            reason: object.message().to_string(),
            ..Block::default()
        },
    });
    render(format!("Binding to target {} failed:", error.target()), blocks)
}

fn describe_unbound(error: &BindError, unbound: &UnboundElements) -> String {
    let reason = unbound.to_string();
    let blocks = unbound.properties().iter().map(|property| Block {
        property: Some(property.name.to_string()),
        value: Some(&property.value),
        origin: Some(&property.origin),
        reason: reason.clone(),
    });
    render(format!("Binding to target {} failed:", error.target()), blocks)
}

fn describe_failure(error: &BindError) -> String {
    let property = error.property();
    let block = Block {
        property: Some(
            property
                .map(|property| property.name.to_string())
                .unwrap_or_else(|| error.name().to_string()),
        ),
        value: property.map(|property| property.value.as_str()),
        origin: property.map(|property| &property.origin),
        reason: error.cause().to_string(),
    };
    render(format!("{error}:"), [block])
}

/// Runs several analyzers, keeping the first analysis produced.
#[derive(Debug)]
pub struct FailureAnalyzers {
    analyzers: Vec<Box<dyn FailureAnalyzer>>,
}

impl FailureAnalyzers {
    /// No analyzers at all.
    pub fn empty() -> Self {
        Self {
            analyzers: Vec::new(),
        }
    }

    /// Appends an analyzer, consulted after the ones already present.
    pub fn with(mut self, analyzer: impl FailureAnalyzer + 'static) -> Self {
        self.analyzers.push(Box::new(analyzer));
        self
    }

    /// Analyzes `failure` and logs the report, if any analyzer recognized it.
    ///
    /// Returns whether a report was produced.
    pub fn report(&self, failure: &Error) -> bool {
        match self.analyze(failure) {
            Some(analysis) => {
                analysis.report();
                true
            }
            None => false,
        }
    }
}

impl Default for FailureAnalyzers {
    /// The built-in analyzers.
    fn default() -> Self {
        Self::empty().with(BindFailureAnalyzer)
    }
}

impl FailureAnalyzer for FailureAnalyzers {
    fn analyze(&self, failure: &Error) -> Option<FailureAnalysis> {
        self.analyzers.iter().find_map(|analyzer| {
            let analysis = analyzer.analyze(failure);
            if analysis.is_some() {
                debug!(analyzer = ?analyzer, "failure analyzed");
            }
            analysis
        })
    }
}
