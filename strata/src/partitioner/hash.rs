use super::Partitioner;
use crate::common::Value;
use crate::errors::StrataResult;
use crate::exec::hash_of;

/// Spreads scalar keys over a fixed number of partitions by hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashPartitioner {
    num_partitions: usize,
}

impl HashPartitioner {
    pub fn new(num_partitions: usize) -> HashPartitioner {
        HashPartitioner {
            num_partitions: num_partitions.max(1),
        }
    }
}

impl Partitioner<Value> for HashPartitioner {
    fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    fn partition_of(&self, key: &Value) -> StrataResult<usize> {
        Ok((hash_of(key) % self.num_partitions as u64) as usize)
    }
}
