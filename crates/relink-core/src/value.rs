//! Dynamic record model.
//!
//! Collections are `Vec<Item>` where `Item = Arc<Record>`. A record is an
//! open-ended map from field name to [`Value`]; nested records are held by
//! `Arc`, so cloning a record is a shallow copy and attached targets are
//! shared with the collection they came from.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Shared handle to a record; the element type of every collection.
pub type Item = Arc<Record>;

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("expected a JSON object for a record, found {found}")]
    NotARecord { found: &'static str },
    #[error("JSON conversion failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Default)]
#[derive(Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    /// Unsigned integers above `i64::MAX`; anything smaller is `Int`.
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Record(Item),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) => u64::try_from(*i).ok(),
            Value::UInt(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Item> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Field access through a record value; `None` for non-records.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_record().and_then(|r| r.get(field))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::UInt(u) => serde_json::Value::from(*u),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(r) => r.to_json(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Int(i),
                (None, Some(u)) => Value::UInt(u),
                (None, None) => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Record(Arc::new(Record::from_json_map(map))),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        value.to_json()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        match i64::try_from(u) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::UInt(u),
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(Arc::new(r))
    }
}

impl From<Item> for Value {
    fn from(r: Item) -> Self {
        Value::Record(r)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// An open-ended record.
#[derive(Debug, Clone, PartialEq, Default)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_item(self) -> Item {
        Arc::new(self)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, ValueError> {
        Self::try_from(value)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        }
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = ValueError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(Self::from_json_map(map)),
            other => Err(ValueError::NotARecord {
                found: Value::from(other).kind(),
            }),
        }
    }
}

impl From<Record> for serde_json::Value {
    fn from(record: Record) -> Self {
        record.to_json()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Parse a JSON array of objects into a collection.
pub fn items_from_json(value: serde_json::Value) -> Result<Vec<Item>, ValueError> {
    match value {
        serde_json::Value::Array(values) => values
            .into_iter()
            .map(|v| Record::try_from(v).map(Arc::new))
            .collect(),
        other => Record::try_from(other).map(|r| vec![Arc::new(r)]),
    }
}

/// Convert typed rows into a collection through their serde representation.
pub fn to_items<T: Serialize>(rows: &[T]) -> Result<Vec<Item>, ValueError> {
    rows.iter()
        .map(|row| Record::try_from(serde_json::to_value(row)?).map(Arc::new))
        .collect()
}

/// Convert records back into typed rows. Attached association fields are
/// ignored unless `T` declares them.
pub fn from_items<T: DeserializeOwned>(items: &[Item]) -> Result<Vec<T>, ValueError> {
    items
        .iter()
        .map(|item| Ok(serde_json::from_value(item.to_json())?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_round_trip_keeps_nested_records_shared_on_clone() {
        let record = Record::from_json(json!({
            "id": 1,
            "name": "Yerin",
            "score": 1.5,
            "tags": ["sword", null],
            "rank": { "rank": "Herald" }
        }))
        .unwrap();

        assert_eq!(record.get("id"), Some(&Value::Int(1)));
        assert_eq!(record.get("score"), Some(&Value::Float(1.5)));
        assert_eq!(
            record.get("rank").and_then(|r| r.get("rank")),
            Some(&Value::Str("Herald".into()))
        );

        let copy = record.clone();
        let (Some(Value::Record(a)), Some(Value::Record(b))) = (record.get("rank"), copy.get("rank"))
        else {
            panic!("rank should be a record");
        };
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(copy.to_json()["tags"], json!(["sword", null]));
    }

    #[test]
    fn non_object_is_not_a_record() {
        let err = Record::from_json(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ValueError::NotARecord { found: "list" }));
    }

    #[test]
    fn typed_rows_convert_through_serde() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Rank {
            #[serde(rename = "userId")]
            user_id: u32,
            rank: String,
        }

        let rows = vec![Rank {
            user_id: 1,
            rank: "Arch Lord".into(),
        }];
        let items = to_items(&rows).unwrap();
        assert_eq!(items[0].get("userId"), Some(&Value::Int(1)));

        let back: Vec<Rank> = from_items(&items).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn non_finite_floats_serialize_as_null() {
        assert_eq!(Value::Float(f64::INFINITY).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn unsigned_ids_above_i64_stay_exact() {
        let items = items_from_json(json!([
            { "id": u64::MAX },
            { "id": u64::MAX - 1 },
            { "id": 7u64 }
        ]))
        .unwrap();

        assert_eq!(items[0].get("id"), Some(&Value::UInt(u64::MAX)));
        assert_eq!(items[1].get("id"), Some(&Value::UInt(u64::MAX - 1)));
        assert_eq!(items[2].get("id"), Some(&Value::Int(7)));
        assert_eq!(items[0].to_json(), json!({ "id": u64::MAX }));
        assert_eq!(Value::from(7u64), Value::Int(7));
    }
}
