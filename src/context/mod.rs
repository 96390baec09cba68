//! Application context for managing shared application state.

use std::any::type_name;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{BindError, Binder, Error, Validate};

/// Central application context holding configuration and shared resources.
///
/// Generic over the configuration type `C`, which is bound once at build time.
/// Access configuration via [`config()`](Self::config) for zero-cost reads.
///
/// ## Example
///
/// ```no_run
/// use dragon_bind::{AppContext, Binder, Config};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct MyConfig {
///     name: String,
///     port: u16,
/// }
///
/// let binder = Binder::new(
///     Config::builder()
///         .with_file("config.toml", true)
///         .build()?,
/// );
///
/// let ctx = AppContext::builder()
///     .with_bound_config::<MyConfig>(&binder, "app")
///     .build()?;
///
/// let config = ctx.config();  // &MyConfig, zero-cost
/// # Ok::<(), dragon_bind::Error>(())
/// ```
#[derive(Debug)]
pub struct AppContext<C> {
    config: C,
}

impl<C> AppContext<C> {
    /// Returns a reference to the configuration.
    ///
    /// This is a zero-cost operation since the config was bound at build time.
    pub fn config(&self) -> &C {
        &self.config
    }
}

impl AppContext<()> {
    /// Creates a new builder for constructing an `AppContext`.
    pub fn builder() -> AppContextBuilder<()> {
        AppContextBuilder {
            config: None,
            failure: None,
        }
    }
}

/// Builder for constructing an [`AppContext`].
///
/// The builder starts with no config (`AppContextBuilder<()>`) and transitions
/// to `AppContextBuilder<C>` when [`with_config`](Self::with_config) or
/// [`with_bound_config`](Self::with_bound_config) is called.
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct AppContextBuilder<C> {
    config: Option<C>,
    failure: Option<Error>,
}

impl AppContextBuilder<()> {
    /// Attaches an already constructed configuration.
    pub fn with_config<C>(self, config: C) -> AppContextBuilder<C> {
        AppContextBuilder {
            config: Some(config),
            failure: None,
        }
    }

    /// Binds the configuration from the properties under `prefix`.
    ///
    /// A bind failure is reported by [`build`](AppContextBuilder::build) as
    /// [`Error::Creation`] wrapping the [`Error::Bind`] cause.
    pub fn with_bound_config<C: DeserializeOwned>(
        self,
        binder: &Binder,
        prefix: &str,
    ) -> AppContextBuilder<C> {
        Self::bound(prefix, binder.bind::<C>(prefix))
    }

    /// Binds the configuration like [`with_bound_config`](Self::with_bound_config),
    /// falling back to `C::default()`, then validates it.
    pub fn with_validated_config<C>(self, binder: &Binder, prefix: &str) -> AppContextBuilder<C>
    where
        C: DeserializeOwned + Default + Validate,
    {
        Self::bound(prefix, binder.bind_validated::<C>(prefix).map(Some))
    }

    fn bound<C>(prefix: &str, result: Result<Option<C>, BindError>) -> AppContextBuilder<C> {
        match result {
            Ok(config) => AppContextBuilder {
                config,
                failure: None,
            },
            Err(error) => {
                debug!(prefix, target = type_name::<C>(), "configuration could not be bound");
                AppContextBuilder {
                    config: None,
                    failure: Some(Error::Creation {
                        target: type_name::<C>(),
                        source: Box::new(Error::Bind(error)),
                    }),
                }
            }
        }
    }
}

impl<C> AppContextBuilder<C> {
    /// Builds the `AppContext`.
    ///
    /// Returns the binding failure if there was one, or an error if no
    /// configuration was provided.
    pub fn build(self) -> Result<AppContext<C>, Error> {
        if let Some(failure) = self.failure {
            return Err(failure);
        }
        Ok(AppContext {
            config: self.config.ok_or(Error::MissingConfig)?,
        })
    }
}
