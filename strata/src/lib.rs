//! # Strata - Partitioned Spatial Indexing
//!
//! Strata partitions in-memory relations, builds local indexes per partition
//! with a small global summary on top, and answers spatial queries and exact
//! k-nearest-neighbor joins with partition-level parallelism.
//!
//! ## Key Features
//!
//! - **Index kinds**: hash, ordered and R-tree indexes over partitioned rows
//! - **STR partitioning**: spatially coherent, balanced partitions fitted on a sample
//! - **Global pruning**: a global R-tree over partition bounding boxes skips
//!   partitions that cannot contribute to a query
//! - **KNN join**: exact k-nearest-neighbor join via grid replication and
//!   associative top-k merging
//! - **Session cache**: built indexes are cached by name and reused
//!
//! ## Quick Start
//!
//! ```rust
//! use strata::common::{col, DataType, Field, Schema};
//! use strata::{row, StrataConfig, StrataContext};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StrataConfig::builder().shuffle_partitions(2).random_seed(7).build()?;
//! let context = StrataContext::new(config);
//!
//! let schema = Schema::new(vec![Field::new("x", DataType::Float), Field::new("y", DataType::Float)]);
//! let stores = context.relation(schema.clone(), vec![row![0.0, 0.0], row![5.0, 5.0]])?;
//! let depots = context.relation(schema, vec![row![1.0, 0.0], row![5.0, 6.0], row![10.0, 10.0]])?;
//!
//! let keys = [col("x"), col("y")];
//! let joined = context.knn_join(&stores, &depots, &keys, &keys, 1)?;
//! assert_eq!(joined.count(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Values, rows, schemas, key expressions and the bounded top-k heap
//! - [`errors`] - Error types and result definitions
//! - [`exec`] - Partitioned datasets, the worker pool and the session cache
//! - [`geometry`] - Points, bounding boxes and circles
//! - [`index`] - Local hash, ordered and R-tree indexes
//! - [`join`] - Distributed KNN join
//! - [`partitioner`] - Hash, range and STR partitioners
//! - [`relation`] - Relations and partitioned indexed relations

use std::thread::available_parallelism;

pub mod common;
pub mod errors;
pub mod exec;
pub mod geometry;
pub mod index;
pub mod join;
pub mod partitioner;
pub mod relation;

mod context;
mod strata_config;

pub use context::StrataContext;
pub use strata_config::*;

/// Returns the number of available CPU cores, or 1 if detection fails.
///
/// # Examples
///
/// ```rust
/// use strata::get_cpu_count;
///
/// assert!(get_cpu_count() > 0);
/// ```
pub fn get_cpu_count() -> usize {
    available_parallelism()
        .map(|p| p.get())
        .unwrap_or_else(|err| {
            log::warn!("Failed to detect available parallelism: {}. Defaulting to single thread.", err);
            1
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[ctor::ctor]
    fn init() {
        colog::init();
    }

    #[test]
    fn test_get_cpu_count_positive() {
        assert!(get_cpu_count() > 0);
    }
}
