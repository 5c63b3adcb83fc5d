use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::{CacheCatalog, CachePolicy, Executor};
use crate::errors::{ErrorKind, StrataError, StrataResult};

/// An immutable, partitioned, in-memory collection.
///
/// Every transformation runs one task per partition on the dataset's
/// [`Executor`] and returns a new dataset; the source is never modified.
/// Cloning a dataset shares its partitions.
///
/// # Examples
///
/// ```rust
/// use strata::exec::{Dataset, Executor};
///
/// let data = Dataset::from_vec(Executor::new(2), (1..=10).collect::<Vec<i64>>(), 3);
/// let evens = data.flat_map("evens", |x| Ok((x % 2 == 0).then_some(*x))).unwrap();
/// assert_eq!(evens.count(), 5);
/// ```
#[derive(Clone, Debug)]
pub struct Dataset<T> {
    executor: Executor,
    partitions: Vec<Arc<Vec<T>>>,
}

impl<T> Dataset<T>
where
    T: Clone + Send + Sync,
{
    /// Splits `items` into `num_partitions` contiguous, near-equal partitions.
    pub fn from_vec(executor: Executor, items: Vec<T>, num_partitions: usize) -> Dataset<T> {
        let num_partitions = num_partitions.max(1);
        let len = items.len();
        let mut partitions: Vec<Vec<T>> = (0..num_partitions)
            .map(|_| Vec::with_capacity(len / num_partitions + 1))
            .collect();
        for (i, item) in items.into_iter().enumerate() {
            partitions[i * num_partitions / len].push(item);
        }
        Dataset::from_partitions(executor, partitions)
    }

    pub fn from_partitions(executor: Executor, partitions: Vec<Vec<T>>) -> Dataset<T> {
        Dataset {
            executor,
            partitions: partitions.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Rows of partition `index`; empty for an out-of-range index.
    pub fn partition(&self, index: usize) -> &[T] {
        self.partitions
            .get(index)
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    pub fn partitions(&self) -> impl Iterator<Item = &[T]> {
        self.partitions.iter().map(|p| p.as_slice())
    }

    pub fn partition_counts(&self) -> Vec<usize> {
        self.partitions.iter().map(|p| p.len()).collect()
    }

    pub fn count(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Copies every element, partition by partition.
    pub fn collect(&self) -> Vec<T> {
        self.partitions
            .iter()
            .flat_map(|p| p.iter().cloned())
            .collect()
    }

    /// Whole-partition transform: `task` sees the partition index and its rows.
    pub fn map_partitions<U, F>(&self, stage: &str, task: F) -> StrataResult<Dataset<U>>
    where
        U: Clone + Send + Sync,
        F: Fn(usize, &[T]) -> StrataResult<Vec<U>> + Sync,
    {
        let outputs = self
            .executor
            .run(stage, self.partitions.clone(), |index, partition| {
                task(index, partition.as_slice())
            })?;
        Ok(Dataset::from_partitions(self.executor.clone(), outputs))
    }

    /// Elementwise transform producing zero or more outputs per input.
    pub fn flat_map<U, I, F>(&self, stage: &str, f: F) -> StrataResult<Dataset<U>>
    where
        U: Clone + Send + Sync,
        I: IntoIterator<Item = U>,
        F: Fn(&T) -> StrataResult<I> + Sync,
    {
        self.map_partitions(stage, |_, rows| {
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                out.extend(f(row)?);
            }
            Ok(out)
        })
    }

    pub fn map<U, F>(&self, stage: &str, f: F) -> StrataResult<Dataset<U>>
    where
        U: Clone + Send + Sync,
        F: Fn(&T) -> StrataResult<U> + Sync,
    {
        self.map_partitions(stage, |_, rows| rows.iter().map(&f).collect())
    }

    /// Shuffle: redistributes every element into `num_partitions` partitions
    /// chosen by `partition_of`. Elements keep their relative source order
    /// within each target partition.
    ///
    /// # Errors
    ///
    /// Returns `InternalError` if `partition_of` yields an id outside
    /// `0..num_partitions`.
    pub fn partition_by<F>(&self, stage: &str, num_partitions: usize, partition_of: F) -> StrataResult<Dataset<T>>
    where
        F: Fn(&T) -> usize + Sync,
    {
        let num_partitions = num_partitions.max(1);
        let buckets = self
            .executor
            .run(stage, self.partitions.clone(), |index, partition| {
                let mut buckets: Vec<Vec<T>> = (0..num_partitions).map(|_| Vec::new()).collect();
                for row in partition.iter() {
                    let target = partition_of(row);
                    if target >= num_partitions {
                        return Err(StrataError::new(
                            &format!(
                                "Partition id {} out of range 0..{} in source partition {}",
                                target, num_partitions, index
                            ),
                            ErrorKind::InternalError,
                        ));
                    }
                    buckets[target].push(row.clone());
                }
                Ok(buckets)
            })?;

        // exchange
        let mut targets: Vec<Vec<T>> = (0..num_partitions).map(|_| Vec::new()).collect();
        for source in buckets {
            for (target, rows) in source.into_iter().enumerate() {
                targets[target].extend(rows);
            }
        }

        log::debug!(
            "Stage {}: shuffled {} partitions into {}",
            stage,
            self.num_partitions(),
            num_partitions
        );
        Ok(Dataset::from_partitions(self.executor.clone(), targets))
    }

    /// Concatenates the partitions of both datasets.
    pub fn union(&self, other: &Dataset<T>) -> Dataset<T> {
        let mut partitions = self.partitions.clone();
        partitions.extend(other.partitions.iter().cloned());
        Dataset {
            executor: self.executor.clone(),
            partitions,
        }
    }

    /// Pairs every element with an id unique across the dataset, numbered in
    /// partition order.
    pub fn with_unique_ids(&self, stage: &str) -> StrataResult<Dataset<(u64, T)>> {
        let offsets: Vec<u64> = self
            .partitions
            .iter()
            .scan(0u64, |offset, p| {
                let start = *offset;
                *offset += p.len() as u64;
                Some(start)
            })
            .collect();
        self.map_partitions(stage, |index, rows| {
            let start = offsets[index];
            Ok(rows
                .iter()
                .enumerate()
                .map(|(i, row)| (start + i as u64, row.clone()))
                .collect())
        })
    }

    /// Bernoulli sample: each element is kept with probability `fraction`.
    /// The same seed always yields the same sample.
    pub fn sample(&self, stage: &str, fraction: f64, seed: u64) -> StrataResult<Vec<T>> {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let sampled = self.map_partitions(stage, |index, rows| {
            let mut rng = StdRng::seed_from_u64(partition_seed(seed, index));
            Ok(rows
                .iter()
                .filter(|_| rng.gen_bool(fraction))
                .cloned()
                .collect())
        })?;
        Ok(sampled.collect())
    }

    /// Registers this dataset in `catalog` under `name`.
    pub fn persist(&self, catalog: &CacheCatalog, name: &str, policy: CachePolicy) -> Dataset<T>
    where
        T: 'static,
    {
        log::debug!(
            "Persisting {} ({} partitions, {} rows)",
            name,
            self.num_partitions(),
            self.count()
        );
        catalog.persist(name, self.clone(), policy);
        self.clone()
    }
}

impl<K, V> Dataset<(K, V)>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Key-grouped reduce: values sharing a key are folded with `combine`,
    /// first within each source partition, then again after a hash shuffle
    /// into `num_partitions` partitions.
    ///
    /// `combine` must be associative and commutative; the grouping in which it
    /// is applied is unspecified.
    pub fn reduce_by_key<F>(&self, stage: &str, num_partitions: usize, combine: F) -> StrataResult<Dataset<(K, V)>>
    where
        F: Fn(V, V) -> V + Sync,
    {
        let num_partitions = num_partitions.max(1);
        let combined = self.map_partitions(stage, |_, rows| {
            Ok(fold_by_key(rows.iter().cloned(), &combine))
        })?;
        let shuffled = combined.partition_by(stage, num_partitions, |(key, _)| {
            (hash_of(key) % num_partitions as u64) as usize
        })?;
        shuffled.map_partitions(stage, |_, rows| Ok(fold_by_key(rows.iter().cloned(), &combine)))
    }
}

fn fold_by_key<K, V, F>(rows: impl Iterator<Item = (K, V)>, combine: &F) -> Vec<(K, V)>
where
    K: Hash + Eq,
    F: Fn(V, V) -> V,
{
    let mut groups: IndexMap<K, Option<V>> = IndexMap::new();
    for (key, value) in rows {
        let slot = groups.entry(key).or_insert(None);
        *slot = Some(match slot.take() {
            Some(current) => combine(current, value),
            None => value,
        });
    }
    groups
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
}

pub(crate) fn hash_of<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Derives an independent per-partition seed from a stage seed.
pub(crate) fn partition_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(items: Vec<i64>, partitions: usize) -> Dataset<i64> {
        Dataset::from_vec(Executor::new(4), items, partitions)
    }

    #[test]
    fn test_from_vec_balances_partitions() {
        let data = dataset((0..10).collect(), 3);
        assert_eq!(data.num_partitions(), 3);
        assert_eq!(data.partition_counts().iter().sum::<usize>(), 10);
        let counts = data.partition_counts();
        assert!(counts.iter().max().unwrap() - counts.iter().min().unwrap() <= 1);
        assert_eq!(data.collect(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_from_vec_more_partitions_than_items() {
        let data = dataset(vec![1, 2], 5);
        assert_eq!(data.num_partitions(), 5);
        assert_eq!(data.count(), 2);
    }

    #[test]
    fn test_flat_map_and_map() {
        let data = dataset((1..=4).collect(), 2);
        let doubled = data.flat_map("dup", |x| Ok(vec![*x, *x])).unwrap();
        assert_eq!(doubled.count(), 8);
        let squared = data.map("square", |x| Ok(x * x)).unwrap();
        assert_eq!(squared.collect(), vec![1, 4, 9, 16]);
    }

    #[test]
    fn test_flat_map_error() {
        let data = dataset((1..=4).collect(), 2);
        let err = data
            .flat_map("fail", |x| {
                if *x == 3 {
                    Err(StrataError::new("three", ErrorKind::TypeError))
                } else {
                    Ok(vec![*x])
                }
            })
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TypeError);
    }

    #[test]
    fn test_partition_by() {
        let data = dataset((0..20).collect(), 3);
        let shuffled = data.partition_by("mod", 4, |x| (*x % 4) as usize).unwrap();
        assert_eq!(shuffled.num_partitions(), 4);
        for p in 0..4 {
            assert!(shuffled.partition(p).iter().all(|x| *x % 4 == p as i64));
            assert_eq!(shuffled.partition(p).len(), 5);
        }
        // source order preserved within a target
        assert_eq!(shuffled.partition(1), &[1, 5, 9, 13, 17]);
    }

    #[test]
    fn test_partition_by_out_of_range() {
        let data = dataset((0..5).collect(), 2);
        let err = data.partition_by("bad", 2, |_| 7).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InternalError);
    }

    #[test]
    fn test_union() {
        let a = dataset(vec![1, 2], 2);
        let b = dataset(vec![3], 1);
        let u = a.union(&b);
        assert_eq!(u.num_partitions(), 3);
        assert_eq!(u.collect(), vec![1, 2, 3]);
    }

    #[test]
    fn test_with_unique_ids() {
        let data = dataset((10..20).collect(), 3);
        let ids: Vec<u64> = data
            .with_unique_ids("ids")
            .unwrap()
            .collect()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, (0..10).collect::<Vec<u64>>());
    }

    #[test]
    fn test_reduce_by_key() {
        let pairs: Vec<(i64, i64)> = (0..100).map(|i| (i % 7, 1)).collect();
        let data = Dataset::from_vec(Executor::new(3), pairs, 5);
        let mut sums = data.reduce_by_key("sum", 3, |a, b| a + b).unwrap().collect();
        sums.sort();
        assert_eq!(sums.len(), 7);
        assert_eq!(sums.iter().map(|(_, v)| v).sum::<i64>(), 100);
        assert_eq!(sums[0], (0, 15));
        assert_eq!(sums[6], (6, 14));
    }

    #[test]
    fn test_sample_is_deterministic() {
        let data = dataset((0..1000).collect(), 4);
        let a = data.sample("sample", 0.1, 42).unwrap();
        let b = data.sample("sample", 0.1, 42).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty() && a.len() < 300);
        assert_eq!(data.sample("sample", 1.0, 1).unwrap().len(), 1000);
    }

    #[test]
    fn test_persist_registers_in_catalog() {
        let catalog = CacheCatalog::new(4);
        let data = dataset((0..3).collect(), 1);
        data.persist(&catalog, "numbers", CachePolicy::Pinned);
        let cached: Dataset<i64> = catalog.get("numbers").unwrap();
        assert_eq!(cached.collect(), vec![0, 1, 2]);
    }
}
