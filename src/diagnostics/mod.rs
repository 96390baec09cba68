//! Turns startup failures into human-readable reports.
//!
//! A [`FailureAnalyzer`] inspects an [`Error`](crate::Error) and, when it
//! recognizes the failure, describes what went wrong and how to fix it.

mod analysis;
mod analyzer;

pub use analysis::FailureAnalysis;
pub use analyzer::{BindFailureAnalyzer, FailureAnalyzer, FailureAnalyzers};
