use std::io::ErrorKind;
use std::path::Path;

use toml::{Table, Value};

use super::source::{merge_at_path, split_key, ConfigEntry, ConfigSource};
use super::{ConfigError, EnvSource};

/// The configuration root: a key/value tree loaded once at startup.
///
/// Keys are addressed with `:`-separated paths. Sections are the top-level
/// tables, one per settings type.
///
/// ## Example
///
/// ```
/// use appsettings_di::Configuration;
///
/// let config = Configuration::from_toml_str(
///     r#"
///     [MyAppSettings]
///     IntSetting = "42"
///     "#,
/// )?;
///
/// assert_eq!(
///     config.get("MyAppSettings:IntSetting").and_then(|v| v.as_str()),
///     Some("42")
/// );
/// # Ok::<(), appsettings_di::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    root: Table,
}

impl Configuration {
    /// Loads every entry of `source` into a fresh root.
    ///
    /// Entries are applied in order; nested tables merge, other values are replaced.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let config = Self::from_entries(source.entries()?);
        tracing::debug!(?source, sections = config.root.len(), "configuration loaded");
        Ok(config)
    }

    pub(crate) fn from_entries(entries: impl IntoIterator<Item = ConfigEntry>) -> Self {
        let mut root = Table::new();
        for entry in entries {
            merge_at_path(&mut root, &entry.path, entry.value);
        }
        Self { root }
    }

    /// Loads a TOML file as the whole configuration.
    ///
    /// A missing file is an empty configuration unless `required` is set, in
    /// which case it fails with [`ConfigError::FileNotFound`].
    pub fn from_file(path: impl AsRef<Path>, required: bool) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound && required => {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using empty configuration");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::ReadError {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let root = toml::from_str(&text).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(Self { root })
    }

    /// Loads environment variables. See [`EnvSource`].
    pub fn from_env(prefix: impl Into<String>, separator: impl Into<String>) -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource::new(prefix, separator))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            root: toml::from_str(text)?,
        })
    }

    /// Looks up a `:`-separated key. An empty key yields `None`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let path = split_key(key);
        let (first, rest) = path.split_first()?;

        let mut current = self.root.get(first)?;
        for part in rest {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Returns the subtree named `name`, matched case-sensitively.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    pub fn as_table(&self) -> &Table {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

impl From<Table> for Configuration {
    fn from(root: Table) -> Self {
        Self { root }
    }
}
