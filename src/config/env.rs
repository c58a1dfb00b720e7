use toml::Value;

use super::source::{ConfigEntry, ConfigSource};
use super::ConfigError;

/// Reads configuration from environment variables.
///
/// `MYAPP__MyAppSettings__IntSetting=42` with prefix `MYAPP` and separator `__`
/// becomes the string `"42"` at `MyAppSettings:IntSetting`. Segment case is kept
/// as-is and values are left as strings for the binder to coerce.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    separator: String,
}

impl EnvSource {
    /// Creates an environment source. An empty `prefix` accepts every variable.
    ///
    /// # Panics
    ///
    /// Panics if `separator` is empty.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        assert!(!separator.is_empty(), "separator must not be empty");
        Self {
            prefix: prefix.into(),
            separator,
        }
    }

    pub(crate) fn collect(&self, vars: impl IntoIterator<Item = (String, String)>) -> Vec<ConfigEntry> {
        let prefix_with_sep = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}{}", self.prefix, self.separator)
        };

        let mut entries = Vec::new();
        for (key, value) in vars {
            let Some(path_str) = key.strip_prefix(&prefix_with_sep) else {
                continue;
            };

            let path: Vec<String> = path_str
                .split(self.separator.as_str())
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect();
            if path.is_empty() {
                continue;
            }

            entries.push(ConfigEntry::at_path(path, Value::String(value)));
        }

        entries
    }
}

impl ConfigSource for EnvSource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
        let entries = self.collect(vars);
        tracing::debug!(prefix = %self.prefix, count = entries.len(), "collected environment entries");
        Ok(entries)
    }
}
