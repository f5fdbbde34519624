use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// A dynamically typed SQL value.
///
/// Used both for bound statement parameters and for the cells of a
/// [`RowCursor`](crate::db::RowCursor).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Naive date-time without zone, as returned for `DATETIME` columns.
    Timestamp(NaiveDateTime),
    /// An instant in UTC.
    DateTime(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::DateTime(_) => "datetime",
        }
    }

    /// Integer view used for scalar projections such as `COUNT(1)`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{v}'"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    String => Text,
    Vec<u8> => Bytes,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => DateTime,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Semantic type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldKind {
    Int,
    BigInt,
    Text,
    Bool,
    Float,
    Double,
    Timestamp,
    DateTime,
    Bytes,
    Json,
}

impl FieldKind {
    /// SQL type used when a column carries no explicit type.
    pub const fn default_sql_type(self) -> &'static str {
        match self {
            FieldKind::Int => "INT(11)",
            FieldKind::BigInt => "BIGINT",
            FieldKind::Text => "VARCHAR(255)",
            FieldKind::Bool => "TINYINT(1)",
            FieldKind::Timestamp | FieldKind::DateTime => "DATETIME",
            FieldKind::Float | FieldKind::Double | FieldKind::Bytes | FieldKind::Json => "TEXT",
        }
    }
}

/// A value could not be assigned to a field of the given kind.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMismatch {
    pub expected: FieldKind,
    pub found: &'static str,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {:?}, found {}", self.expected, self.found)
    }
}

impl std::error::Error for TypeMismatch {}

/// Rust types that can back a mapped entity field.
pub trait SqlField: Sized {
    const KIND: FieldKind;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, TypeMismatch>;
}

fn mismatch<T: SqlField>(value: &Value) -> TypeMismatch {
    TypeMismatch {
        expected: T::KIND,
        found: value.type_name(),
    }
}

impl SqlField for i32 {
    const KIND: FieldKind = FieldKind::Int;

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Int(v) => Ok(v),
            Value::BigInt(v) => i32::try_from(v).map_err(|_| TypeMismatch {
                expected: FieldKind::Int,
                found: "bigint",
            }),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlField for i64 {
    const KIND: FieldKind = FieldKind::BigInt;

    fn to_value(&self) -> Value {
        Value::BigInt(*self)
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::BigInt(v) => Ok(v),
            Value::Int(v) => Ok(i64::from(v)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlField for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Bool(v) => Ok(v),
            // TINYINT(1) comes back as an integer
            Value::Int(v @ (0 | 1)) => Ok(v == 1),
            Value::BigInt(v @ (0 | 1)) => Ok(v == 1),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlField for f32 {
    const KIND: FieldKind = FieldKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlField for f64 {
    const KIND: FieldKind = FieldKind::Double;

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Double(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlField for String {
    const KIND: FieldKind = FieldKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlField for Vec<u8> {
    const KIND: FieldKind = FieldKind::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Bytes(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlField for NaiveDateTime {
    const KIND: FieldKind = FieldKind::Timestamp;

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlField for DateTime<Utc> {
    const KIND: FieldKind = FieldKind::DateTime;

    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::DateTime(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlField for Uuid {
    const KIND: FieldKind = FieldKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match &value {
            Value::Text(v) => Uuid::parse_str(v).map_err(|_| mismatch::<Self>(&value)),
            Value::Bytes(v) => Uuid::from_slice(v).map_err(|_| mismatch::<Self>(&value)),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl<T: SqlField> SqlField for Option<T> {
    const KIND: FieldKind = T::KIND;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Field wrapper stored as serialized JSON text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Json<T>(pub T);

impl<T: Serialize + DeserializeOwned> SqlField for Json<T> {
    const KIND: FieldKind = FieldKind::Json;

    fn to_value(&self) -> Value {
        match serde_json::to_string(&self.0) {
            Ok(text) => Value::Text(text),
            Err(_) => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        let parsed = match &value {
            Value::Text(text) => serde_json::from_str(text).ok(),
            Value::Bytes(bytes) => serde_json::from_slice(bytes).ok(),
            _ => None,
        };
        parsed.map(Json).ok_or_else(|| mismatch::<Self>(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sql_types() {
        assert_eq!(FieldKind::Int.default_sql_type(), "INT(11)");
        assert_eq!(FieldKind::BigInt.default_sql_type(), "BIGINT");
        assert_eq!(FieldKind::Text.default_sql_type(), "VARCHAR(255)");
        assert_eq!(FieldKind::Bool.default_sql_type(), "TINYINT(1)");
        assert_eq!(FieldKind::DateTime.default_sql_type(), "DATETIME");
        assert_eq!(FieldKind::Timestamp.default_sql_type(), "DATETIME");
        assert_eq!(FieldKind::Double.default_sql_type(), "TEXT");
        assert_eq!(FieldKind::Json.default_sql_type(), "TEXT");
    }

    #[test]
    fn test_option_maps_none_to_null() {
        let none: Option<i32> = None;
        assert_eq!(none.to_value(), Value::Null);
        assert_eq!(Option::<i32>::from_value(Value::Null), Ok(None));
        assert_eq!(Option::<i32>::from_value(Value::Int(4)), Ok(Some(4)));
    }

    #[test]
    fn test_integer_assignment_widens_and_narrows() {
        assert_eq!(i64::from_value(Value::Int(7)), Ok(7));
        assert_eq!(i32::from_value(Value::BigInt(7)), Ok(7));
        assert!(i32::from_value(Value::BigInt(i64::MAX)).is_err());
    }

    #[test]
    fn test_bool_accepts_tinyint() {
        assert_eq!(bool::from_value(Value::Int(1)), Ok(true));
        assert_eq!(bool::from_value(Value::Int(0)), Ok(false));
        assert!(bool::from_value(Value::Int(2)).is_err());
    }

    #[test]
    fn test_text_into_int_is_a_mismatch() {
        let err = i32::from_value(Value::Text("12".into())).unwrap_err();
        assert_eq!(err.expected, FieldKind::Int);
        assert_eq!(err.found, "text");
    }

    #[test]
    fn test_uuid_round_trips_through_text() {
        let id = Uuid::new_v4();
        let value = id.to_value();
        assert_eq!(value, Value::Text(id.to_string()));
        assert_eq!(Uuid::from_value(value), Ok(id));
    }

    #[test]
    fn test_json_field_is_text() {
        let tags = Json(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(tags.to_value(), Value::Text("[\"a\",\"b\"]".into()));
        let back = Json::<Vec<String>>::from_value(Value::Text("[\"x\"]".into())).unwrap();
        assert_eq!(back.0, vec!["x".to_string()]);
    }

    #[test]
    fn test_as_i64_for_count_projection() {
        assert_eq!(Value::BigInt(12).as_i64(), Some(12));
        assert_eq!(Value::Int(3).as_i64(), Some(3));
        assert_eq!(Value::Null.as_i64(), None);
    }
}
