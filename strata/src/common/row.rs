use std::fmt::{Display, Formatter};
use std::sync::Arc;

use super::Value;

/// An immutable, cheaply cloneable tuple of field values.
///
/// Rows are opaque to the indexes: only the key expressions bound at build
/// time look inside them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Row {
    values: Arc<[Value]>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Row {
        Row {
            values: values.into(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Joined row: the fields of `left` followed by the fields of `right`.
    pub fn concat(left: &Row, right: &Row) -> Row {
        let mut values = Vec::with_capacity(left.len() + right.len());
        values.extend(left.values.iter().cloned());
        values.extend(right.values.iter().cloned());
        Row::new(values)
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

/// Builds a [`Row`] from a list of expressions convertible into [`Value`].
///
/// # Examples
///
/// ```rust
/// use strata::row;
///
/// let r = row![1, 2.5, "name"];
/// assert_eq!(r.len(), 3);
/// ```
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        $crate::common::Row::new(vec![$($crate::common::Value::from($value)),*])
    };
}
