use crate::config::ConfigError;
use crate::settings::BindError;
use thiserror::Error;

/// Top-level error type for the appsettings-di library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind section '{section}': {source}")]
    Binding {
        section: &'static str,
        source: BindError,
    },

    #[error("required configuration section not found: {0}")]
    MissingSection(&'static str),

    #[error("no registration found for type {0}")]
    UnregisteredType(&'static str),

    #[error("circular dependency detected while resolving {0}")]
    CircularDependency(&'static str),

    #[error("registration for {0} produced an instance of another type")]
    InstanceTypeMismatch(&'static str),

    #[error("application context requires a configuration")]
    MissingConfig,
}
