//! Strategies that assign keys to output partitions ahead of a shuffle.
//!
//! A partitioner is computed once (from the target count, or from a sample of
//! the keys) and then applied to every row. Assignment is deterministic.

mod hash;
mod range;
mod str_partitioner;

pub use hash::*;
pub use range::*;
pub use str_partitioner::*;

use crate::errors::StrataResult;
use crate::geometry::Mbr;

/// Maps a key to one of `num_partitions()` partition ids.
pub trait Partitioner<K: ?Sized>: Send + Sync {
    fn num_partitions(&self) -> usize;

    /// # Errors
    ///
    /// Returns an error if the key cannot be placed, such as a point whose
    /// dimension differs from the partitioning's.
    fn partition_of(&self, key: &K) -> StrataResult<usize>;
}

/// Summary of one spatial partition.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartitionRecord {
    pub id: usize,
    pub mbr: Mbr,
    pub count: usize,
}

impl PartitionRecord {
    pub fn new(id: usize, mbr: Mbr, count: usize) -> PartitionRecord {
        PartitionRecord { id, mbr, count }
    }
}
