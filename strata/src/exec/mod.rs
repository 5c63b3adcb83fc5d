//! In-process execution substrate: partitioned datasets, a scoped worker
//! pool that runs one task per partition, and a named materialization cache.

mod catalog;
mod dataset;
mod executor;

pub use catalog::*;
pub use dataset::*;
pub use executor::*;

pub(crate) use dataset::{hash_of, partition_seed};
