//! tri-state field values.
//!
//! every nested record, list and map of a resource is wrapped in [`Field`]
//! so that "not mentioned" and "explicitly cleared" stay distinguishable.
//! struct fields using it are declared as
//! `#[serde(default, skip_serializing_if = "Field::is_absent")]`.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// a value that is either absent, explicitly empty, or populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    /// the key was not present.
    Absent,
    /// the key was present but null or blank.
    Empty,
    /// the key carried a value.
    Value(T),
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Field::Empty)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(value) => value.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None => Ok(Field::Empty),
            Some(raw) if is_blank(&raw) => Ok(Field::Empty),
            Some(raw) => serde_json::from_value(raw)
                .map(Field::Value)
                .map_err(de::Error::custom),
        }
    }
}

/// deserializer for a variant payload inside a one-of group.
///
/// unlike the default, `{}` selects the variant with default contents; only
/// null clears it.
pub fn deserialize_variant<'de, D, T>(deserializer: D) -> Result<Field<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(Field::Empty),
        Some(raw) => serde_json::from_value(raw)
            .map(Field::Value)
            .map_err(de::Error::custom),
    }
}

/// true for json values that carry no content: null, "", [] and {}.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
