use toml::Value;

use super::source::{ConfigEntry, ConfigSource};
use super::ConfigError;

/// In-memory `key = value` pairs, keys written as `Section:Key`.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pairs: Vec<(String, String)>,
}

impl MemorySource {
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigSource for MemorySource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        Ok(self
            .pairs
            .iter()
            .map(|(key, value)| ConfigEntry::at_key(key, Value::String(value.clone())))
            .filter(|entry| !entry.path.is_empty())
            .collect())
    }
}
