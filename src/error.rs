use crate::bind::BindError;
use crate::config::ConfigError;
use thiserror::Error;

/// Top-level error type for the dragon-bind library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bind(#[from] BindError),

    /// A component could not be created because one of its inputs failed.
    #[error("error creating {target}")]
    Creation {
        target: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("application context requires a configuration")]
    MissingConfig,
}

impl Error {
    /// This error followed by every error it wraps through
    /// [`Creation`](Error::Creation).
    pub fn causes(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |error| match error {
            Error::Creation { source, .. } => Some(source.as_ref()),
            _ => None,
        })
    }

    /// The first bind failure in the cause chain.
    pub fn bind_error(&self) -> Option<&BindError> {
        self.causes().find_map(|error| match error {
            Error::Bind(error) => Some(error),
            _ => None,
        })
    }
}
