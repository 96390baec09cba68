use std::error::Error as StdError;
use std::fmt;

use tracing::error;

/// The outcome of analyzing a failure.
#[derive(Debug)]
pub struct FailureAnalysis {
    description: String,
    action: String,
    cause: Box<dyn StdError + Send + Sync>,
}

impl FailureAnalysis {
    pub fn new(
        description: impl Into<String>,
        action: impl Into<String>,
        cause: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            description: description.into(),
            action: action.into(),
            cause: cause.into(),
        }
    }

    /// What went wrong.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// What to do about it.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The error that was analyzed.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// Logs the report at error level.
    pub fn report(&self) {
        error!("{self}");
    }
}

impl fmt::Display for FailureAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "***************************")?;
        writeln!(f, "APPLICATION FAILED TO START")?;
        writeln!(f, "***************************")?;
        writeln!(f)?;
        writeln!(f, "Description:")?;
        writeln!(f)?;
        writeln!(f, "{}", self.description)?;
        writeln!(f)?;
        writeln!(f, "Action:")?;
        writeln!(f)?;
        write!(f, "{}", self.action)
    }
}
