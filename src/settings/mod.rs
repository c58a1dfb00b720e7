//! Binding configuration sections to strongly-typed settings.

mod de;

use serde::de::DeserializeOwned;
use serde::Deserialize;

pub use de::BindError;
use de::ValueDeserializer;

use crate::config::Configuration;
use crate::container::Container;
use crate::Error;

/// A settings type bound from the configuration section named [`SECTION`](Self::SECTION).
///
/// Fields missing from the section take their zero value (empty string, `0`,
/// `false`, `None`), so a plain `#[derive(Deserialize)]` struct is enough.
///
/// ## Example
///
/// ```
/// use appsettings_di::{bind, Configuration, Settings};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// #[serde(rename_all = "PascalCase")]
/// struct MyAppSettings {
///     string_setting: String,
///     int_setting: i32,
///     bool_setting: bool,
/// }
///
/// impl Settings for MyAppSettings {
///     const SECTION: &'static str = "MyAppSettings";
/// }
///
/// let config = Configuration::from_toml_str("[MyAppSettings]\nIntSetting = \"42\"")?;
/// let settings: MyAppSettings = bind(&config)?;
///
/// assert_eq!(settings.int_setting, 42);
/// assert_eq!(settings.string_setting, "");
/// # Ok::<(), appsettings_di::Error>(())
/// ```
pub trait Settings: DeserializeOwned + Send + Sync + 'static {
    /// The section name, matched case-sensitively. Usually the type's own name.
    const SECTION: &'static str;
}

/// Binds `T` from its section. A missing section yields all defaults.
pub fn bind<T: Settings>(config: &Configuration) -> Result<T, Error> {
    let section = config.section(T::SECTION);
    if section.is_none() {
        tracing::debug!(section = T::SECTION, "section not found, binding defaults");
    }
    deserialize_section(section)
}

/// Like [`bind`], but fails with [`Error::MissingSection`] when the section is absent.
pub fn bind_required<T: Settings>(config: &Configuration) -> Result<T, Error> {
    match config.section(T::SECTION) {
        Some(section) => deserialize_section(Some(section)),
        None => Err(Error::MissingSection(T::SECTION)),
    }
}

fn deserialize_section<T: Settings>(section: Option<&toml::Value>) -> Result<T, Error> {
    <T as Deserialize<'_>>::deserialize(ValueDeserializer::new(section, T::SECTION)).map_err(|source| {
        Error::Binding {
            section: T::SECTION,
            source,
        }
    })
}

impl Container {
    /// Binds `T` from `config` and registers the instance as a singleton.
    ///
    /// Every later `resolve::<T>()` returns the same instance. Nothing is
    /// registered when binding fails.
    pub fn add_settings<T: Settings>(&mut self, config: &Configuration) -> Result<&mut Self, Error> {
        let settings = bind::<T>(config)?;
        tracing::debug!(section = T::SECTION, "settings bound");
        self.register_instance(settings);
        Ok(self)
    }
}
