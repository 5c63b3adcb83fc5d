use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use super::DataType;
use crate::geometry::Point;

// f64 holds every integer up to this magnitude exactly
const MAX_EXACT_INT: u64 = 1 << 53;

/// A single field value of a row.
///
/// Floats compare and hash by their bit pattern (with `-0.0` folded onto
/// `0.0`) so that `Value` can serve as a hash-index key.
///
/// # Examples
///
/// ```rust
/// use strata::common::Value;
///
/// assert_eq!(Value::from(3).as_f64(), Some(3.0));
/// assert_eq!(Value::from("a").as_f64(), None);
/// assert!(Value::from(vec![1.0, 2.0]).is_numeric_array());
/// ```
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a signed 64-bit integer value.
    I64(i64),
    /// Represents a 64-bit floating point value.
    F64(f64),
    /// Represents a string value.
    String(String),
    /// Represents an array value.
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::I64(_) | Value::F64(_))
    }

    /// Checks whether this is an array holding only numbers.
    pub fn is_numeric_array(&self) -> bool {
        match self {
            Value::Array(values) => values.iter().all(Value::is_numeric),
            _ => false,
        }
    }

    /// Coerces a numeric value to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Like [`Value::as_f64`], but `None` for integers beyond +/- 2^53,
    /// which would collide with their neighbors once converted.
    pub fn as_exact_f64(&self) -> Option<f64> {
        match self {
            Value::I64(v) if v.unsigned_abs() > MAX_EXACT_INT => None,
            _ => self.as_f64(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// The data type of this value; `None` for null and for empty arrays.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DataType::Bool),
            Value::I64(_) => Some(DataType::Int),
            Value::F64(_) => Some(DataType::Float),
            Value::String(_) => Some(DataType::String),
            Value::Array(values) => values
                .first()
                .and_then(Value::data_type)
                .map(|inner| DataType::Array(Box::new(inner))),
        }
    }
}

fn normalized_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => normalized_bits(*a) == normalized_bits(*b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::I64(v) => v.hash(state),
            Value::F64(v) => normalized_bits(*v).hash(state),
            Value::String(v) => v.hash(state),
            Value::Array(v) => v.hash(state),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

impl From<&Point> for Value {
    fn from(point: &Point) -> Self {
        Value::Array(point.coords().iter().map(|c| Value::F64(*c)).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
