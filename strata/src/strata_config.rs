//! Session configuration.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::errors::{ErrorKind, StrataError, StrataResult};

pub const DEFAULT_SHUFFLE_PARTITIONS: usize = 4;
pub const DEFAULT_MAX_ENTRIES_PER_NODE: usize = 25;
pub const DEFAULT_SAMPLE_RATE: f64 = 0.01;
pub const DEFAULT_SAMPLE_THRESHOLD: usize = 100_000;
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Validated, immutable configuration shared by a session.
///
/// # Examples
///
/// ```rust
/// use strata::StrataConfig;
///
/// let config = StrataConfig::builder()
///     .shuffle_partitions(8)
///     .max_entries_per_node(16)
///     .random_seed(42)
///     .build()
///     .unwrap();
/// assert_eq!(config.shuffle_partitions(), 8);
/// ```
#[derive(Clone)]
pub struct StrataConfig {
    /// The pointer to implementation. Uses Arc for cheap cloning.
    inner: Arc<StrataConfigInner>,
}

impl Default for StrataConfig {
    fn default() -> Self {
        StrataConfig {
            inner: Arc::new(StrataConfigInner::default()),
        }
    }
}

impl StrataConfig {
    pub fn builder() -> StrataConfigBuilder {
        StrataConfigBuilder::new()
    }

    /// Partition count used by shuffles; the KNN join replicates over a
    /// grid of this many partitions per side.
    pub fn shuffle_partitions(&self) -> usize {
        self.inner.shuffle_partitions
    }

    /// Fanout of R-tree nodes.
    pub fn max_entries_per_node(&self) -> usize {
        self.inner.max_entries_per_node
    }

    /// Fraction of rows sampled to fit partition boundaries on large inputs.
    pub fn sample_rate(&self) -> f64 {
        self.inner.sample_rate
    }

    /// Inputs of at most this many rows are sampled in full.
    pub fn sample_threshold(&self) -> usize {
        self.inner.sample_threshold
    }

    pub fn worker_threads(&self) -> usize {
        self.inner.worker_threads
    }

    /// Maximum number of entries in the session cache.
    pub fn cache_capacity(&self) -> usize {
        self.inner.cache_capacity
    }

    pub fn random_seed(&self) -> Option<u64> {
        self.inner.random_seed
    }

    /// The configured seed, or a fresh random one if none is configured.
    pub fn seed(&self) -> u64 {
        self.inner.random_seed.unwrap_or_else(rand::random)
    }
}

impl Debug for StrataConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.inner, f)
    }
}

#[derive(Clone, Debug)]
struct StrataConfigInner {
    shuffle_partitions: usize,
    max_entries_per_node: usize,
    sample_rate: f64,
    sample_threshold: usize,
    worker_threads: usize,
    cache_capacity: usize,
    random_seed: Option<u64>,
}

impl Default for StrataConfigInner {
    fn default() -> Self {
        StrataConfigInner {
            shuffle_partitions: DEFAULT_SHUFFLE_PARTITIONS,
            max_entries_per_node: DEFAULT_MAX_ENTRIES_PER_NODE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            sample_threshold: DEFAULT_SAMPLE_THRESHOLD,
            worker_threads: crate::get_cpu_count(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            random_seed: None,
        }
    }
}

impl StrataConfigInner {
    fn validate(&self) -> StrataResult<()> {
        if self.shuffle_partitions < 1 {
            return Err(invalid("shuffle_partitions", "must be at least 1", self.shuffle_partitions));
        }
        if self.max_entries_per_node < 2 {
            return Err(invalid("max_entries_per_node", "must be at least 2", self.max_entries_per_node));
        }
        if !(self.sample_rate > 0.0 && self.sample_rate <= 1.0) {
            return Err(invalid("sample_rate", "must be in (0, 1]", self.sample_rate));
        }
        if self.worker_threads < 1 {
            return Err(invalid("worker_threads", "must be at least 1", self.worker_threads));
        }
        if self.cache_capacity < 1 {
            return Err(invalid("cache_capacity", "must be at least 1", self.cache_capacity));
        }
        Ok(())
    }
}

fn invalid(parameter: &str, rule: &str, value: impl std::fmt::Display) -> StrataError {
    log::error!("Invalid configuration: {} {}, got {}", parameter, rule, value);
    StrataError::new(
        &format!("Invalid configuration: {} {}, got {}", parameter, rule, value),
        ErrorKind::InvalidConfiguration,
    )
}

/// Fluent builder for [`StrataConfig`]; nothing is validated until
/// [`StrataConfigBuilder::build`].
#[derive(Debug, Default)]
pub struct StrataConfigBuilder {
    inner: StrataConfigInner,
}

impl StrataConfigBuilder {
    pub fn new() -> Self {
        StrataConfigBuilder::default()
    }

    pub fn shuffle_partitions(mut self, partitions: usize) -> Self {
        self.inner.shuffle_partitions = partitions;
        self
    }

    pub fn max_entries_per_node(mut self, max_entries: usize) -> Self {
        self.inner.max_entries_per_node = max_entries;
        self
    }

    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.inner.sample_rate = rate;
        self
    }

    pub fn sample_threshold(mut self, rows: usize) -> Self {
        self.inner.sample_threshold = rows;
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.inner.worker_threads = threads;
        self
    }

    pub fn cache_capacity(mut self, entries: usize) -> Self {
        self.inner.cache_capacity = entries;
        self
    }

    /// Fixes the seed of every randomized step, making runs reproducible.
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.inner.random_seed = Some(seed);
        self
    }

    /// # Errors
    ///
    /// Returns `InvalidConfiguration` naming the first offending parameter.
    pub fn build(self) -> StrataResult<StrataConfig> {
        self.inner.validate()?;
        Ok(StrataConfig {
            inner: Arc::new(self.inner),
        })
    }
}
