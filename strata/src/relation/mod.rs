//! Relations and the partitioned indexes built over them.

mod index_builder;
mod indexed;

pub use index_builder::*;
pub use indexed::*;

use crate::common::{Row, Schema};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::exec::Dataset;

/// A schema paired with a partitioned collection of rows.
#[derive(Clone, Debug)]
pub struct Relation {
    schema: Schema,
    rows: Dataset<Row>,
}

impl Relation {
    /// # Errors
    ///
    /// Returns `TypeError` if a row's width differs from the schema's.
    pub fn new(schema: Schema, rows: Dataset<Row>) -> StrataResult<Relation> {
        let width = schema.len();
        for partition in rows.partitions() {
            if let Some(bad) = partition.iter().find(|row| row.len() != width) {
                log::error!("Row {} does not match schema {}", bad, schema);
                return Err(StrataError::new(
                    &format!("Row {} does not match schema {}", bad, schema),
                    ErrorKind::TypeError,
                ));
            }
        }
        Ok(Relation { schema, rows })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &Dataset<Row> {
        &self.rows
    }

    pub fn count(&self) -> usize {
        self.rows.count()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn num_partitions(&self) -> usize {
        self.rows.num_partitions()
    }

    pub fn collect(&self) -> Vec<Row> {
        self.rows.collect()
    }
}
