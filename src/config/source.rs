use toml::{Table, Value};

use super::{ConfigError, KEY_DELIMITER};

/// A value contributed by a source at a position in the configuration tree.
///
/// An empty `path` places a table at the root.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub path: Vec<String>,
    pub value: Value,
}

impl ConfigEntry {
    pub fn at_path(path: Vec<String>, value: Value) -> Self {
        Self { path, value }
    }

    /// Builds an entry from a `:`-separated key such as `MyAppSettings:IntSetting`.
    pub fn at_key(key: &str, value: Value) -> Self {
        Self::at_path(split_key(key), value)
    }
}

/// Something that can produce configuration entries.
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError>;
}

pub(crate) fn split_key(key: &str) -> Vec<String> {
    key.split(KEY_DELIMITER)
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Places `value` at `path` inside `table`, merging tables recursively.
///
/// A scalar sitting where an intermediate table is needed is replaced by a table.
pub(crate) fn merge_at_path(table: &mut Table, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        if let Value::Table(overlay) = value {
            deep_merge(table, overlay);
        }
        return;
    };

    if rest.is_empty() {
        match (table.get_mut(first), value) {
            (Some(Value::Table(base)), Value::Table(overlay)) => deep_merge(base, overlay),
            (_, value) => {
                table.insert(first.clone(), value);
            }
        }
        return;
    }

    if !matches!(table.get(first), Some(Value::Table(_))) {
        table.insert(first.clone(), Value::Table(Table::new()));
    }

    if let Some(Value::Table(nested)) = table.get_mut(first) {
        merge_at_path(nested, rest, value);
    }
}

fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(key: &str) -> Vec<String> {
        split_key(key)
    }

    #[test]
    fn test_split_key_ignores_empty_segments() {
        assert_eq!(split_key("A::B:"), vec!["A".to_string(), "B".to_string()]);
        assert!(split_key("").is_empty());
    }

    #[test]
    fn test_merge_creates_intermediate_tables() {
        let mut table = Table::new();
        merge_at_path(&mut table, &path("Outer:Inner:Key"), Value::from("v"));

        assert_eq!(table["Outer"]["Inner"]["Key"].as_str(), Some("v"));
    }

    #[test]
    fn test_merge_keeps_sibling_keys() {
        let mut table = Table::new();
        merge_at_path(&mut table, &path("Section:A"), Value::from("1"));
        merge_at_path(&mut table, &path("Section:B"), Value::from("2"));

        let section = table["Section"].as_table().unwrap();
        assert_eq!(section.len(), 2);
        assert_eq!(section["A"].as_str(), Some("1"));
        assert_eq!(section["B"].as_str(), Some("2"));
    }

    #[test]
    fn test_later_scalar_overrides_earlier() {
        let mut table = Table::new();
        merge_at_path(&mut table, &path("Section:A"), Value::from("old"));
        merge_at_path(&mut table, &path("Section:A"), Value::from("new"));

        assert_eq!(table["Section"]["A"].as_str(), Some("new"));
    }

    #[test]
    fn test_scalar_replaced_by_nested_table() {
        let mut table = Table::new();
        merge_at_path(&mut table, &path("Section"), Value::from("scalar"));
        merge_at_path(&mut table, &path("Section:A"), Value::from("1"));

        assert_eq!(table["Section"]["A"].as_str(), Some("1"));
    }

    #[test]
    fn test_root_entry_deep_merges() {
        let mut table: Table = toml::from_str("[Section]\nA = 1\nB = 2").unwrap();
        let overlay: Table = toml::from_str("[Section]\nB = 3").unwrap();
        merge_at_path(&mut table, &[], Value::Table(overlay));

        assert_eq!(table["Section"]["A"].as_integer(), Some(1));
        assert_eq!(table["Section"]["B"].as_integer(), Some(3));
    }
}
