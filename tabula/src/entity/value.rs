use super::Entity;
use crate::schema::ColumnKind;
use rusqlite::types::Value as SqlValue;
use serde::ser::{Serialize, Serializer};

/// A scalar field value of one of the supported kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Blob(Vec<u8>),
}

impl Value {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Value::Text(_) => ColumnKind::Text,
            Value::Integer(_) => ColumnKind::Integer,
            Value::Real(_) => ColumnKind::Real,
            Value::Boolean(_) => ColumnKind::Boolean,
            Value::Blob(_) => ColumnKind::Blob,
        }
    }

    /// Storage encoding: booleans become 0/1 integers, everything else maps 1:1.
    pub fn to_sql(&self) -> SqlValue {
        match self {
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Integer(n) => SqlValue::Integer(*n),
            Value::Real(f) => SqlValue::Real(*f),
            Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
            Value::Blob(b) => SqlValue::Blob(b.clone()),
        }
    }

    /// Return the value in the requested kind if that loses nothing.
    /// Only integer-to-real widening is performed.
    pub fn conform(self, kind: ColumnKind) -> Option<Value> {
        match (self, kind) {
            (Value::Integer(n), ColumnKind::Real) => Some(Value::Real(n as f64)),
            (value, kind) if value.kind() == kind => Some(value),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Blob(b) => b.serialize(serializer),
        }
    }
}

/// What a field slot of an entity holds.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Null,
    Scalar(Value),
    Entity(Box<Entity>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            FieldValue::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            FieldValue::Null => "null".to_string(),
            FieldValue::Scalar(v) => v.kind().to_string(),
            FieldValue::Entity(e) => format!("{} entity", e.schema().name()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Scalar(v) => v.serialize(serializer),
            FieldValue::Entity(e) => e.serialize(serializer),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<Entity> for FieldValue {
    fn from(entity: Entity) -> Self {
        FieldValue::Entity(Box::new(entity))
    }
}

impl From<&Entity> for FieldValue {
    fn from(entity: &Entity) -> Self {
        FieldValue::Entity(Box::new(entity.clone()))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

macro_rules! scalar_from {
    ($($ty:ty => |$v:ident| $conv:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $conv
                }
            }

            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    FieldValue::Scalar(Value::from(v))
                }
            }
        )*
    };
}

scalar_from! {
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_string()),
    i64 => |v| Value::Integer(v),
    i32 => |v| Value::Integer(i64::from(v)),
    u32 => |v| Value::Integer(i64::from(v)),
    f64 => |v| Value::Real(v),
    f32 => |v| Value::Real(f64::from(v)),
    bool => |v| Value::Boolean(v),
    Vec<u8> => |v| Value::Blob(v),
    &[u8] => |v| Value::Blob(v.to_vec()),
}
