//! Application context tying configuration and the container together.

use std::sync::Arc;

use crate::config::Configuration;
use crate::container::Container;
use crate::settings::Settings;
use crate::Error;

type Registrar = Box<dyn FnOnce(&Configuration, &mut Container) -> Result<(), Error>>;

/// Central application context holding configuration and registered services.
///
/// Built once at startup and passed by reference to whatever needs settings.
///
/// ## Example
///
/// ```no_run
/// use appsettings_di::{AppContext, Configuration, Settings};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// #[serde(rename_all = "PascalCase")]
/// struct MyAppSettings {
///     string_setting: String,
/// }
///
/// impl Settings for MyAppSettings {
///     const SECTION: &'static str = "MyAppSettings";
/// }
///
/// let ctx = AppContext::builder()
///     .with_config(Configuration::from_file("appsettings.toml", true)?)
///     .with_settings::<MyAppSettings>()
///     .build()?;
///
/// let settings = ctx.resolve::<MyAppSettings>()?;
/// println!("{}", settings.string_setting);
/// # Ok::<(), appsettings_di::Error>(())
/// ```
#[derive(Debug)]
pub struct AppContext {
    configuration: Configuration,
    container: Container,
}

impl AppContext {
    /// Creates a new builder for constructing an `AppContext`.
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder {
            configuration: None,
            registrars: Vec::new(),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Resolves `T` from the container.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        self.container.resolve()
    }
}

/// Builder for constructing an [`AppContext`].
///
/// Registrations are queued and run in order by [`build`](Self::build), once the
/// configuration is known.
#[must_use = "builders do nothing until .build() is called"]
pub struct AppContextBuilder {
    configuration: Option<Configuration>,
    registrars: Vec<Registrar>,
}

impl AppContextBuilder {
    /// Attaches the configuration root.
    pub fn with_config(mut self, configuration: Configuration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Binds `T` from its section and registers it. See [`Container::add_settings`].
    pub fn with_settings<T: Settings>(self) -> Self {
        self.configure(|configuration, container| {
            container.add_settings::<T>(configuration)?;
            Ok(())
        })
    }

    /// Queues an arbitrary registration against the container.
    pub fn configure<F>(mut self, registrar: F) -> Self
    where
        F: FnOnce(&Configuration, &mut Container) -> Result<(), Error> + 'static,
    {
        self.registrars.push(Box::new(registrar));
        self
    }

    /// Builds the `AppContext`.
    ///
    /// Returns an error if no configuration was provided or any registration fails.
    pub fn build(self) -> Result<AppContext, Error> {
        let configuration = self.configuration.ok_or(Error::MissingConfig)?;
        let mut container = Container::new();

        for registrar in self.registrars {
            registrar(&configuration, &mut container)?;
        }
        tracing::debug!(registrations = container.len(), "application context built");

        Ok(AppContext {
            configuration,
            container,
        })
    }
}

impl std::fmt::Debug for AppContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContextBuilder")
            .field("configuration", &self.configuration)
            .field("registrars", &self.registrars.len())
            .finish()
    }
}
