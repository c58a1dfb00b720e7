//! A serde deserializer over configuration values.
//!
//! Configuration values are usually strings (environment variables, in-memory
//! pairs), so primitives are parsed from their textual form. A key that is
//! absent deserializes to the target type's zero value instead of failing; a key
//! that is present must convert, blank text included.

use std::fmt;

use serde::de::value::StrDeserializer;
use serde::de::{self, DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;
use thiserror::Error;
use toml::{Table, Value};

use crate::config::KEY_DELIMITER;

/// A value in a configuration section could not be converted to its field type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BindError(String);

impl de::Error for BindError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

pub(crate) struct ValueDeserializer<'a> {
    value: Option<&'a Value>,
    path: String,
}

impl<'a> ValueDeserializer<'a> {
    pub(crate) fn new(value: Option<&'a Value>, path: impl Into<String>) -> Self {
        Self {
            value,
            path: path.into(),
        }
    }

    fn mismatch(&self, expected: &str) -> BindError {
        let found = match self.value {
            Some(Value::String(s)) => format!("'{s}'"),
            Some(Value::Table(_)) => "a table".to_string(),
            Some(Value::Array(_)) => "an array".to_string(),
            Some(other) => other.to_string(),
            None => "nothing".to_string(),
        };
        BindError(format!(
            "cannot convert {found} at '{}' to {expected}",
            self.path
        ))
    }

    /// The value as trimmed text, or `None` when absent or blank.
    fn text(&self) -> Option<&'a str> {
        match self.value {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self.value, Some(Value::String(s)) if s.trim().is_empty())
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}{KEY_DELIMITER}{key}")
    }
}

fn key_deserializer(key: &str) -> StrDeserializer<'_, BindError> {
    key.into_deserializer()
}

macro_rules! deserialize_integer {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
            if self.value.is_none() {
                return visitor.$visit(0);
            }
            let parsed = match (self.value, self.text()) {
                (Some(Value::Integer(i)), _) => <$ty>::try_from(*i).ok(),
                (_, Some(text)) => text.parse::<$ty>().ok(),
                _ => None,
            };
            match parsed {
                Some(n) => visitor.$visit(n),
                None => Err(self.mismatch(stringify!($ty))),
            }
        }
    };
}

macro_rules! deserialize_float {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
            if self.value.is_none() {
                return visitor.$visit(0.0);
            }
            let parsed = match (self.value, self.text()) {
                (Some(Value::Float(f)), _) => Some(*f as $ty),
                (Some(Value::Integer(i)), _) => Some(*i as $ty),
                (_, Some(text)) => text.parse::<$ty>().ok(),
                _ => None,
            };
            match parsed {
                Some(n) => visitor.$visit(n),
                None => Err(self.mismatch(stringify!($ty))),
            }
        }
    };
}

impl<'de, 'a> Deserializer<'de> for ValueDeserializer<'a> {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            None => visitor.visit_unit(),
            Some(Value::String(s)) => visitor.visit_str(s),
            Some(Value::Integer(i)) => visitor.visit_i64(*i),
            Some(Value::Float(f)) => visitor.visit_f64(*f),
            Some(Value::Boolean(b)) => visitor.visit_bool(*b),
            Some(Value::Datetime(dt)) => visitor.visit_string(dt.to_string()),
            Some(Value::Array(items)) => visitor.visit_seq(ArrayAccess::new(items, self.path)),
            Some(Value::Table(table)) => visitor.visit_map(TableAccess::new(table, self.path)),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        if self.value.is_none() {
            return visitor.visit_bool(false);
        }
        match (self.value, self.text()) {
            (Some(Value::Boolean(b)), _) => visitor.visit_bool(*b),
            (_, Some(text)) if text.eq_ignore_ascii_case("true") => visitor.visit_bool(true),
            (_, Some(text)) if text.eq_ignore_ascii_case("false") => visitor.visit_bool(false),
            _ => Err(self.mismatch("bool")),
        }
    }

    deserialize_integer!(deserialize_i8, visit_i8, i8);
    deserialize_integer!(deserialize_i16, visit_i16, i16);
    deserialize_integer!(deserialize_i32, visit_i32, i32);
    deserialize_integer!(deserialize_i64, visit_i64, i64);
    deserialize_integer!(deserialize_u8, visit_u8, u8);
    deserialize_integer!(deserialize_u16, visit_u16, u16);
    deserialize_integer!(deserialize_u32, visit_u32, u32);
    deserialize_integer!(deserialize_u64, visit_u64, u64);
    deserialize_float!(deserialize_f32, visit_f32, f32);
    deserialize_float!(deserialize_f64, visit_f64, f64);

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let mut chars = match self.value {
            Some(Value::String(s)) => s.chars(),
            _ => return Err(self.mismatch("char")),
        };
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(self.mismatch("char")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            None => visitor.visit_str(""),
            Some(Value::String(s)) => visitor.visit_str(s),
            Some(Value::Table(_) | Value::Array(_)) => Err(self.mismatch("string")),
            Some(scalar) => visitor.visit_string(scalar.to_string()),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        if self.value.is_none() || self.is_blank() {
            return visitor.visit_none();
        }
        visitor.visit_some(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            None => visitor.visit_seq(ArrayAccess::new(&[], self.path)),
            Some(Value::Array(items)) => visitor.visit_seq(ArrayAccess::new(items, self.path)),
            Some(_) => Err(self.mismatch("a sequence")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            None => visitor.visit_map(TableAccess::empty(self.path)),
            Some(Value::Table(table)) => visitor.visit_map(TableAccess::new(table, self.path)),
            Some(_) => Err(self.mismatch("a table")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        match self.value {
            None => visitor.visit_map(StructAccess::new(None, fields, self.path)),
            Some(Value::Table(table)) => visitor.visit_map(StructAccess::new(Some(table), fields, self.path)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        match self.text() {
            Some(text) => visitor.visit_enum(key_deserializer(text)),
            None => Err(self.mismatch(name)),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        i128 u128 bytes byte_buf
    }
}

/// Yields every declared field of a struct, present in the table or not.
///
/// Keys in the table that the struct does not declare are skipped.
struct StructAccess<'a> {
    table: Option<&'a Table>,
    fields: std::slice::Iter<'static, &'static str>,
    current: Option<&'static str>,
    path: String,
}

impl<'a> StructAccess<'a> {
    fn new(table: Option<&'a Table>, fields: &'static [&'static str], path: String) -> Self {
        Self {
            table,
            fields: fields.iter(),
            current: None,
            path,
        }
    }
}

impl<'de, 'a> MapAccess<'de> for StructAccess<'a> {
    type Error = BindError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, BindError> {
        match self.fields.next() {
            Some(&field) => {
                self.current = Some(field);
                seed.deserialize(key_deserializer(field)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, BindError> {
        let field = self
            .current
            .take()
            .ok_or_else(|| <BindError as de::Error>::custom("value requested before key"))?;
        let value = self.table.and_then(|table| table.get(field));
        seed.deserialize(ValueDeserializer::new(value, child_path(&self.path, field)))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len())
    }
}

struct TableAccess<'a> {
    entries: std::vec::IntoIter<(&'a String, &'a Value)>,
    current: Option<(&'a String, &'a Value)>,
    path: String,
}

impl<'a> TableAccess<'a> {
    fn new(table: &'a Table, path: String) -> Self {
        Self {
            entries: table.iter().collect::<Vec<_>>().into_iter(),
            current: None,
            path,
        }
    }

    fn empty(path: String) -> Self {
        Self {
            entries: Vec::new().into_iter(),
            current: None,
            path,
        }
    }
}

impl<'de, 'a> MapAccess<'de> for TableAccess<'a> {
    type Error = BindError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, BindError> {
        match self.entries.next() {
            Some((key, value)) => {
                self.current = Some((key, value));
                seed.deserialize(key_deserializer(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, BindError> {
        let (key, value) = self
            .current
            .take()
            .ok_or_else(|| <BindError as de::Error>::custom("value requested before key"))?;
        seed.deserialize(ValueDeserializer::new(Some(value), child_path(&self.path, key)))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct ArrayAccess<'a> {
    items: std::iter::Enumerate<std::slice::Iter<'a, Value>>,
    path: String,
}

impl<'a> ArrayAccess<'a> {
    fn new(items: &'a [Value], path: String) -> Self {
        Self {
            items: items.iter().enumerate(),
            path,
        }
    }
}

impl<'de, 'a> SeqAccess<'de> for ArrayAccess<'a> {
    type Error = BindError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>, BindError> {
        match self.items.next() {
            Some((index, value)) => seed
                .deserialize(ValueDeserializer::new(Some(value), child_path(&self.path, &index.to_string())))
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}
