use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use super::{DataType, Row, Schema, Value};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::geometry::Point;

/// A declared key expression, resolved against a schema before use.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KeyExpr {
    /// Reads a column by name.
    Column(String),
}

/// Shorthand for [`KeyExpr::Column`].
pub fn col(name: &str) -> KeyExpr {
    KeyExpr::Column(name.to_string())
}

impl KeyExpr {
    /// Resolves the expression against `schema`, producing an evaluator that
    /// no longer looks anything up by name.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` if the schema has no such column.
    pub fn bind(&self, schema: &Schema) -> StrataResult<BoundKey> {
        match self {
            KeyExpr::Column(name) => {
                let index = schema.index_of(name).ok_or_else(|| {
                    log::error!("Column {} not found in schema {}", name, schema);
                    StrataError::new(
                        &format!("Column {} not found in schema {}", name, schema),
                        ErrorKind::ColumnNotFound,
                    )
                })?;
                let data_type = schema
                    .field(index)
                    .map(|f| f.data_type().clone())
                    .ok_or_else(|| {
                        StrataError::new(
                            &format!("Column index {} out of bounds", index),
                            ErrorKind::InternalError,
                        )
                    })?;

                let value_name = name.clone();
                let value: ValueFn = Arc::new(move |row: &Row| {
                    row.get(index).cloned().ok_or_else(|| missing_field(&value_name, row))
                });

                let numeric_name = name.clone();
                let numeric: NumericFn = Arc::new(move |row: &Row| match row.get(index) {
                    Some(v) => to_number(&numeric_name, v),
                    None => Err(missing_field(&numeric_name, row)),
                });

                Ok(BoundKey {
                    name: name.clone(),
                    data_type,
                    value,
                    numeric,
                })
            }
        }
    }
}

impl Display for KeyExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyExpr::Column(name) => write!(f, "{}", name),
        }
    }
}

type ValueFn = Arc<dyn Fn(&Row) -> StrataResult<Value> + Send + Sync>;
type NumericFn = Arc<dyn Fn(&Row) -> StrataResult<f64> + Send + Sync>;
type PointFn = Arc<dyn Fn(&Row) -> StrataResult<Point> + Send + Sync>;

/// A key expression compiled against a schema.
#[derive(Clone)]
pub struct BoundKey {
    name: String,
    data_type: DataType,
    value: ValueFn,
    numeric: NumericFn,
}

impl BoundKey {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type of the bound column.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Evaluates the key to its raw value.
    pub fn eval(&self, row: &Row) -> StrataResult<Value> {
        (self.value)(row)
    }

    /// Evaluates the key and coerces it to a number.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` naming this expression if the value is not numeric
    /// or is NaN.
    pub fn eval_f64(&self, row: &Row) -> StrataResult<f64> {
        (self.numeric)(row)
    }
}

impl Debug for BoundKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundKey")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .finish()
    }
}

/// Compiles one or more key expressions into a `Row -> Point` function.
///
/// Either every key is a numeric column (one coordinate each) or there is
/// exactly one key holding a numeric array.
#[derive(Clone)]
pub struct PointExtractor {
    display: String,
    dim: Option<usize>,
    extract: PointFn,
}

impl PointExtractor {
    /// # Errors
    ///
    /// Returns `KeyTypeMismatch` if no key is given or a key's declared type
    /// cannot produce coordinates, and `ColumnNotFound` for unknown columns.
    pub fn bind(keys: &[KeyExpr], schema: &Schema) -> StrataResult<PointExtractor> {
        if keys.is_empty() {
            log::error!("At least one key column is required to extract a point");
            return Err(StrataError::new(
                "At least one key column is required to extract a point",
                ErrorKind::KeyTypeMismatch,
            ));
        }

        let bound = keys
            .iter()
            .map(|k| k.bind(schema))
            .collect::<StrataResult<Vec<_>>>()?;
        let display = bound.iter().map(BoundKey::name).collect::<Vec<_>>().join(", ");

        if bound.len() == 1 && bound[0].data_type().is_numeric_array() {
            let key = bound[0].clone();
            let extract: PointFn = Arc::new(move |row: &Row| {
                let value = key.eval(row)?;
                to_point(key.name(), &value)
            });
            return Ok(PointExtractor {
                display,
                dim: None,
                extract,
            });
        }

        if let Some(bad) = bound.iter().find(|k| !k.data_type().is_numeric()) {
            log::error!(
                "Key column {} has type {}, expected a numeric type",
                bad.name(),
                bad.data_type()
            );
            return Err(StrataError::new(
                &format!(
                    "Key column {} has type {}, expected a numeric type",
                    bad.name(),
                    bad.data_type()
                ),
                ErrorKind::KeyTypeMismatch,
            ));
        }

        let dim = bound.len();
        let extract: PointFn = Arc::new(move |row: &Row| {
            let coords = bound
                .iter()
                .map(|k| k.eval_f64(row))
                .collect::<StrataResult<Vec<f64>>>()?;
            Ok(Point::new(coords))
        });
        Ok(PointExtractor {
            display,
            dim: Some(dim),
            extract,
        })
    }

    /// Number of coordinates, when known from the declared types alone.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn extract(&self, row: &Row) -> StrataResult<Point> {
        (self.extract)(row)
    }

    /// Comma-separated names of the bound key columns.
    pub fn display(&self) -> &str {
        &self.display
    }
}

impl Debug for PointExtractor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointExtractor")
            .field("keys", &self.display)
            .field("dim", &self.dim)
            .finish()
    }
}

fn to_number(name: &str, value: &Value) -> StrataResult<f64> {
    match value.as_f64() {
        Some(v) if !v.is_nan() => Ok(v),
        Some(_) => Err(StrataError::new(
            &format!("Key expression {} evaluated to NaN", name),
            ErrorKind::TypeError,
        )),
        None => Err(StrataError::new(
            &format!("Key expression {} evaluated to non-numeric value {}", name, value),
            ErrorKind::TypeError,
        )),
    }
}

/// Converts a numeric array into a point.
pub(crate) fn to_point(name: &str, value: &Value) -> StrataResult<Point> {
    match value.as_array() {
        Some(values) => {
            let coords = values
                .iter()
                .map(|v| to_number(name, v))
                .collect::<StrataResult<Vec<f64>>>()?;
            Ok(Point::new(coords))
        }
        None => Err(StrataError::new(
            &format!("Key expression {} evaluated to non-array value {}", name, value),
            ErrorKind::TypeError,
        )),
    }
}

fn missing_field(name: &str, row: &Row) -> StrataError {
    StrataError::new(
        &format!("Key expression {} has no field in row {}", name, row),
        ErrorKind::TypeError,
    )
}
