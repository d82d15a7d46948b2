//! Key references and key values.
//!
//! A [`KeyRef`] names the field a join reads. [`KeyValue`] is the hashable
//! scalar a field value is reduced to before it reaches an index.

use std::fmt;
use std::sync::Arc;

use crate::value::{Record, Value};

/// Token naming one field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyRef(Arc<str>);

impl KeyRef {
    pub fn new(field: impl AsRef<str>) -> Self {
        Self(Arc::from(field.as_ref()))
    }

    pub fn field(&self) -> &str {
        &self.0
    }

    /// Key values carried by `record` under this field.
    ///
    /// A list value fans out one level: every scalar element becomes a key.
    /// Missing fields, nulls and non-scalars yield nothing.
    pub fn values_in(&self, record: &Record) -> Vec<KeyValue> {
        match record.get(self.field()) {
            None => Vec::new(),
            Some(Value::List(elements)) => elements.iter().filter_map(KeyValue::from_value).collect(),
            Some(value) => KeyValue::from_value(value).into_iter().collect(),
        }
    }
}

impl From<&str> for KeyRef {
    fn from(field: &str) -> Self {
        Self::new(field)
    }
}

impl From<String> for KeyRef {
    fn from(field: String) -> Self {
        Self(Arc::from(field))
    }
}

impl From<&KeyRef> for KeyRef {
    fn from(key: &KeyRef) -> Self {
        key.clone()
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scalar join key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// Bit pattern of a non-integral float.
    Float(u64),
    Str(Arc<str>),
}

impl KeyValue {
    /// Reduce a scalar value to a key. Integral floats collapse onto `Int`
    /// so `1.0` and `1` meet in the same bucket; every NaN is one key.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(KeyValue::Bool(*b)),
            Value::Int(i) => Some(KeyValue::Int(*i)),
            Value::UInt(u) => Some(KeyValue::UInt(*u)),
            Value::Float(f) => Some(Self::from_f64(*f)),
            Value::Str(s) => Some(KeyValue::Str(Arc::from(s.as_str()))),
            Value::Null | Value::List(_) | Value::Record(_) => None,
        }
    }

    fn from_f64(f: f64) -> Self {
        if f.is_nan() {
            return KeyValue::Float(f64::NAN.to_bits());
        }
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
            return KeyValue::Int(f as i64);
        }
        if f.fract() == 0.0 && f >= i64::MAX as f64 && f < u64::MAX as f64 {
            return KeyValue::UInt(f as u64);
        }
        KeyValue::Float(f.to_bits())
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Bool(b) => write!(f, "{b}"),
            KeyValue::Int(i) => write!(f, "{i}"),
            KeyValue::UInt(u) => write!(f, "{u}"),
            KeyValue::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            KeyValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_fields_fan_out_and_skip_nulls() {
        let record = Record::new().with(
            "parentIds",
            Value::List(vec![Value::Int(4), Value::Null, Value::Int(5)]),
        );
        let keys = KeyRef::new("parentIds").values_in(&record);
        assert_eq!(keys, vec![KeyValue::Int(4), KeyValue::Int(5)]);
    }

    #[test]
    fn missing_and_null_fields_have_no_keys() {
        let record = Record::new().with("elderSiblingId", Value::Null);
        assert!(KeyRef::new("elderSiblingId").values_in(&record).is_empty());
        assert!(KeyRef::new("absent").values_in(&record).is_empty());
    }

    #[test]
    fn integral_floats_match_ints() {
        assert_eq!(
            KeyValue::from_value(&Value::Float(2.0)),
            Some(KeyValue::Int(2))
        );
        assert_eq!(
            KeyValue::from_value(&Value::Float(-0.0)),
            Some(KeyValue::Int(0))
        );
        assert_ne!(
            KeyValue::from_value(&Value::Float(2.5)),
            Some(KeyValue::Int(2))
        );
        assert_eq!(
            KeyValue::from_value(&Value::Float(f64::NAN)),
            KeyValue::from_value(&Value::Float(-f64::NAN))
        );
    }

    #[test]
    fn nested_lists_and_records_are_not_keys() {
        let record = Record::new().with(
            "ids",
            Value::List(vec![Value::List(vec![Value::Int(1)]), Record::new().into()]),
        );
        assert!(KeyRef::new("ids").values_in(&record).is_empty());
    }

    #[test]
    fn large_unsigned_keys_stay_distinct() {
        let top = KeyValue::from_value(&Value::UInt(u64::MAX));
        let below = KeyValue::from_value(&Value::UInt(u64::MAX - 1));
        assert_eq!(top, Some(KeyValue::UInt(u64::MAX)));
        assert_ne!(top, below);
        assert_eq!(
            KeyValue::from_value(&Value::Float(9_223_372_036_854_775_808.0)),
            Some(KeyValue::UInt(1 << 63))
        );
    }
}
