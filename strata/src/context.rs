use std::sync::Arc;

use crate::common::{KeyExpr, Row, Schema};
use crate::errors::StrataResult;
use crate::exec::{CacheCatalog, Dataset, Executor};
use crate::index::IndexKind;
use crate::join::KnnJoin;
use crate::relation::{IndexBuilder, IndexedRelation, Relation};
use crate::strata_config::StrataConfig;

/// Session entry point: owns the configuration, the worker pool and the
/// cache of built indexes.
///
/// `StrataContext` uses the PIMPL pattern; clones share the same cache.
///
/// # Examples
///
/// ```rust
/// use strata::common::{col, DataType, Field, Schema};
/// use strata::geometry::Point;
/// use strata::index::IndexKind;
/// use strata::{row, StrataContext};
///
/// let context = StrataContext::default();
/// let schema = Schema::new(vec![
///     Field::new("name", DataType::String),
///     Field::new("x", DataType::Float),
///     Field::new("y", DataType::Float),
/// ]);
/// let places = context
///     .relation(schema, vec![row!["a", 0.0, 0.0], row!["b", 4.0, 3.0]])
///     .unwrap();
///
/// let index = context
///     .build_index(&places, IndexKind::RTree, &[col("x"), col("y")], "places_xy")
///     .unwrap();
/// let nearest = index.knn(&Point::new([3.0, 3.0]), 1).unwrap();
/// assert_eq!(nearest[0].0, row!["b", 4.0, 3.0]);
/// assert!(context.cached_index("places_xy").is_ok());
/// ```
#[derive(Clone)]
pub struct StrataContext {
    inner: Arc<StrataContextInner>,
}

struct StrataContextInner {
    config: StrataConfig,
    executor: Executor,
    catalog: CacheCatalog,
}

impl Default for StrataContext {
    fn default() -> Self {
        StrataContext::new(StrataConfig::default())
    }
}

impl StrataContext {
    pub fn new(config: StrataConfig) -> StrataContext {
        log::debug!("Creating context with {:?}", config);
        let executor = Executor::new(config.worker_threads());
        let catalog = CacheCatalog::new(config.cache_capacity());
        StrataContext {
            inner: Arc::new(StrataContextInner {
                config,
                executor,
                catalog,
            }),
        }
    }

    pub fn config(&self) -> &StrataConfig {
        &self.inner.config
    }

    pub fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    pub fn catalog(&self) -> &CacheCatalog {
        &self.inner.catalog
    }

    /// Splits `items` into the configured number of shuffle partitions.
    pub fn parallelize<T>(&self, items: Vec<T>) -> Dataset<T>
    where
        T: Clone + Send + Sync,
    {
        self.parallelize_with(items, self.inner.config.shuffle_partitions())
    }

    pub fn parallelize_with<T>(&self, items: Vec<T>, num_partitions: usize) -> Dataset<T>
    where
        T: Clone + Send + Sync,
    {
        Dataset::from_vec(self.inner.executor.clone(), items, num_partitions)
    }

    /// Builds a relation over `rows`, partitioned like [`StrataContext::parallelize`].
    pub fn relation(&self, schema: Schema, rows: Vec<Row>) -> StrataResult<Relation> {
        Relation::new(schema, self.parallelize(rows))
    }

    /// Builds a partitioned index over `relation` and caches it under `name`.
    pub fn build_index(
        &self,
        relation: &Relation,
        kind: IndexKind,
        keys: &[KeyExpr],
        name: &str,
    ) -> StrataResult<IndexedRelation> {
        IndexBuilder::new(&self.inner.config, &self.inner.catalog).build(relation, kind, keys, name)
    }

    /// Joins every row of `left` with its `k` nearest rows of `right`.
    pub fn knn_join(
        &self,
        left: &Relation,
        right: &Relation,
        left_keys: &[KeyExpr],
        right_keys: &[KeyExpr],
        k: usize,
    ) -> StrataResult<Relation> {
        KnnJoin::new(&self.inner.config).execute(left, right, left_keys, right_keys, k)
    }

    /// # Errors
    ///
    /// Returns `CacheError` if no index is cached under `name`, for instance
    /// because it was evicted.
    pub fn cached_index(&self, name: &str) -> StrataResult<IndexedRelation> {
        self.inner.catalog.fetch::<IndexedRelation>(name)
    }

    /// Drops the cached index under `name`; returns whether one existed.
    pub fn drop_index(&self, name: &str) -> bool {
        self.inner.catalog.unpersist(name)
    }
}

impl std::fmt::Debug for StrataContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrataContext")
            .field("config", &self.inner.config)
            .field("catalog", &self.inner.catalog)
            .finish()
    }
}
