use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::{KeyExpr, Neighbor, PointExtractor, Row, TopK};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::exec::{partition_seed, Dataset};
use crate::geometry::{Mbr, Point};
use crate::index::{LeafEntry, RTree};
use crate::join::merge_top_k;
use crate::relation::Relation;
use crate::strata_config::StrataConfig;

// a bucket this many times the mean size is reported as skewed
const SKEW_FACTOR: f64 = 4.0;
const SKEW_MIN_RECORDS: usize = 1024;

/// How each bucket finds the nearest inner rows of its outer rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocalJoinStrategy {
    /// Scans every inner row of the bucket for every outer row.
    #[default]
    NestedLoop,
    /// Bulk-loads an R-tree over the bucket's inner rows and probes it.
    RTreeProbe,
}

/// An outer row with its nearest inner rows, nearest first.
pub type KnnMatches = (Row, Vec<Neighbor<Row>>);

#[derive(Clone, Debug)]
enum Side {
    Outer(u64),
    Inner,
}

#[derive(Clone, Debug)]
struct Tagged {
    side: Side,
    point: Point,
    row: Row,
}

/// Exact k-nearest-neighbor join over a P x P bucket grid.
///
/// Every outer row draws a random row `r` of the grid and is copied into all
/// `P` buckets of that row; every inner row draws a random column and is
/// copied into all `P` buckets of that column. Each (outer, inner) pair then
/// meets in exactly one bucket, so merging the per-bucket top-k lists of an
/// outer row yields its exact top-k regardless of the random draws.
///
/// # Characteristics
///
/// - **Exact**: results match a brute-force scan up to the order of
///   equidistant neighbors
/// - **Replication**: each input row is copied `P` times
/// - **Shortfall**: an outer row with fewer than `k` inner rows available
///   gets every inner row, never an error
///
/// # Examples
///
/// ```rust
/// use strata::common::{col, DataType, Field, Schema};
/// use strata::join::KnnJoin;
/// use strata::{row, StrataConfig, StrataContext};
///
/// let context = StrataContext::new(StrataConfig::builder().random_seed(3).build().unwrap());
/// let schema = Schema::new(vec![Field::new("x", DataType::Float), Field::new("y", DataType::Float)]);
/// let left = context.relation(schema.clone(), vec![row![0.0, 0.0]]).unwrap();
/// let right = context.relation(schema, vec![row![3.0, 4.0], row![9.0, 9.0]]).unwrap();
///
/// let keys = [col("x"), col("y")];
/// let joined = KnnJoin::new(context.config()).execute(&left, &right, &keys, &keys, 1).unwrap();
/// assert_eq!(joined.collect(), vec![row![0.0, 0.0, 3.0, 4.0]]);
/// ```
#[derive(Clone, Debug)]
pub struct KnnJoin<'a> {
    config: &'a StrataConfig,
    strategy: LocalJoinStrategy,
}

impl<'a> KnnJoin<'a> {
    pub fn new(config: &'a StrataConfig) -> KnnJoin<'a> {
        KnnJoin {
            config,
            strategy: LocalJoinStrategy::default(),
        }
    }

    pub fn strategy(mut self, strategy: LocalJoinStrategy) -> KnnJoin<'a> {
        self.strategy = strategy;
        self
    }

    /// Joins every row of `left` with its `k` nearest rows of `right`.
    ///
    /// The output schema is `left`'s columns followed by `right`'s, with one
    /// row per retained pair. Distances are not projected.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for `k == 0`, even when both relations
    /// are empty, and a key binding error when either side's keys cannot
    /// produce points.
    pub fn execute(
        &self,
        left: &Relation,
        right: &Relation,
        left_keys: &[KeyExpr],
        right_keys: &[KeyExpr],
        k: usize,
    ) -> StrataResult<Relation> {
        let matches = self.neighbors(left, right, left_keys, right_keys, k)?;
        let rows = matches.flat_map("knn_join_emit", |(outer, neighbors)| {
            Ok(neighbors
                .iter()
                .map(|n| Row::concat(outer, &n.item))
                .collect::<Vec<_>>())
        })?;
        let joined = Relation::new(left.schema().join(right.schema()), rows)?;
        log::info!(
            "KNN join (k = {}) of {} outer and {} inner rows produced {} rows",
            k,
            left.count(),
            right.count(),
            joined.count()
        );
        Ok(joined)
    }

    /// Like [`KnnJoin::execute`] but keeps the distances: one entry per
    /// outer row, including outer rows without any neighbor.
    pub fn neighbors(
        &self,
        left: &Relation,
        right: &Relation,
        left_keys: &[KeyExpr],
        right_keys: &[KeyExpr],
        k: usize,
    ) -> StrataResult<Dataset<KnnMatches>> {
        if k == 0 {
            log::error!("KNN join requires k > 0");
            return Err(StrataError::new(
                "KNN join requires k > 0",
                ErrorKind::InvalidConfiguration,
            ));
        }

        let outer_points = PointExtractor::bind(left_keys, left.schema())?;
        let inner_points = PointExtractor::bind(right_keys, right.schema())?;
        if let (Some(outer_dim), Some(inner_dim)) = (outer_points.dim(), inner_points.dim()) {
            if outer_dim != inner_dim {
                log::error!(
                    "KNN join keys ({}) and ({}) have different dimensions {} and {}",
                    outer_points.display(),
                    inner_points.display(),
                    outer_dim,
                    inner_dim
                );
                return Err(StrataError::new(
                    &format!(
                        "KNN join keys ({}) and ({}) have different dimensions {} and {}",
                        outer_points.display(),
                        inner_points.display(),
                        outer_dim,
                        inner_dim
                    ),
                    ErrorKind::DimensionMismatch,
                ));
            }
        }

        let outer = left
            .rows()
            .with_unique_ids("knn_join_ids")?
            .map("knn_join_tag_outer", |(id, row)| {
                Ok(Tagged {
                    side: Side::Outer(*id),
                    point: outer_points.extract(row)?,
                    row: row.clone(),
                })
            })?;
        let inner = right.rows().map("knn_join_tag_inner", |row| {
            Ok(Tagged {
                side: Side::Inner,
                point: inner_points.extract(row)?,
                row: row.clone(),
            })
        })?;

        let grid = self.config.shuffle_partitions();
        let seed = self.config.seed();
        let replicated = outer
            .union(&inner)
            .map_partitions("knn_join_replicate", |index, records| {
                let mut rng = StdRng::seed_from_u64(partition_seed(seed, index));
                let mut out = Vec::with_capacity(records.len() * grid);
                for record in records {
                    let draw = rng.gen_range(0..grid);
                    for i in 0..grid {
                        let bucket = match record.side {
                            Side::Outer(_) => draw * grid + i,
                            Side::Inner => i * grid + draw,
                        };
                        out.push((bucket, record.clone()));
                    }
                }
                Ok(out)
            })?;
        let buckets = replicated.partition_by("knn_join_shuffle", grid * grid, |(bucket, _)| *bucket)?;
        log_bucket_sizes(&buckets.partition_counts());

        let local = buckets.map_partitions("knn_join_local", |_, records| self.local_join(records, k))?;
        let merged = local.reduce_by_key(
            "knn_join_merge",
            grid,
            |(row, a): KnnMatches, (_, b): KnnMatches| (row, merge_top_k(a, b, k)),
        )?;
        merged.map("knn_join_collect", |(_, matches)| Ok(matches.clone()))
    }

    fn local_join(&self, records: &[(usize, Tagged)], k: usize) -> StrataResult<Vec<(u64, KnnMatches)>> {
        let mut outers = Vec::new();
        let mut inners = Vec::new();
        for (_, record) in records {
            match record.side {
                Side::Outer(id) => outers.push((id, record)),
                Side::Inner => inners.push(record),
            }
        }

        match self.strategy {
            LocalJoinStrategy::NestedLoop => outers
                .into_iter()
                .map(|(id, outer)| -> StrataResult<(u64, KnnMatches)> {
                    let mut top = TopK::new(k);
                    for inner in &inners {
                        let distance = outer.point.min_dist(&inner.point)?;
                        top.push(&inner.row, distance);
                    }
                    let neighbors = top
                        .into_sorted_vec()
                        .into_iter()
                        .map(|n| Neighbor::new(n.item.clone(), n.distance))
                        .collect();
                    Ok((id, (outer.row.clone(), neighbors)))
                })
                .collect(),
            LocalJoinStrategy::RTreeProbe => {
                let entries = inners
                    .iter()
                    .enumerate()
                    .map(|(position, inner)| LeafEntry::new(Mbr::from_point(&inner.point), position))
                    .collect();
                let tree = RTree::bulk_load(entries, self.config.max_entries_per_node())?;
                outers
                    .into_iter()
                    .map(|(id, outer)| -> StrataResult<(u64, KnnMatches)> {
                        let neighbors = match &tree {
                            Some(tree) => tree
                                .knn(&outer.point, k)?
                                .into_iter()
                                .map(|n| Neighbor::new(inners[*n.item].row.clone(), n.distance))
                                .collect(),
                            None => Vec::new(),
                        };
                        Ok((id, (outer.row.clone(), neighbors)))
                    })
                    .collect()
            }
        }
    }
}

fn log_bucket_sizes(counts: &[usize]) {
    let total: usize = counts.iter().sum();
    let largest = counts.iter().copied().max().unwrap_or(0);
    log::debug!(
        "KNN join: {} replicated records in {} buckets, largest bucket {}",
        total,
        counts.len(),
        largest
    );

    let mean = total as f64 / counts.len().max(1) as f64;
    if largest >= SKEW_MIN_RECORDS && largest as f64 > SKEW_FACTOR * mean {
        log::warn!(
            "KNN join bucket of {} records is over {} times the mean of {:.1}",
            largest,
            SKEW_FACTOR,
            mean
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{col, DataType, Field, Schema, Value};
    use crate::exec::Executor;
    use crate::row;

    fn config(partitions: usize, seed: u64) -> StrataConfig {
        StrataConfig::builder()
            .shuffle_partitions(partitions)
            .max_entries_per_node(4)
            .worker_threads(2)
            .random_seed(seed)
            .build()
            .unwrap()
    }

    fn points(rows: Vec<Row>) -> Relation {
        let schema = Schema::new(vec![
            Field::new("x", DataType::Float),
            Field::new("y", DataType::Float),
        ]);
        Relation::new(schema, Dataset::from_vec(Executor::new(2), rows, 2)).unwrap()
    }

    fn keys() -> Vec<KeyExpr> {
        vec![col("x"), col("y")]
    }

    fn grid(n: i64, step: f64, offset: f64) -> Vec<Row> {
        (0..n * n)
            .map(|i| row![(i % n) as f64 * step + offset, (i / n) as f64 * step + offset])
            .collect()
    }

    fn brute_force(left: &[Row], right: &[Row], k: usize) -> Vec<Vec<f64>> {
        left.iter()
            .map(|l| {
                let lp = Point::new(l.values().iter().filter_map(|v| v.as_f64()));
                let mut d: Vec<f64> = right
                    .iter()
                    .map(|r| {
                        let rp = Point::new(r.values().iter().filter_map(|v| v.as_f64()));
                        lp.min_dist(&rp).unwrap()
                    })
                    .collect();
                d.sort_by(f64::total_cmp);
                d.truncate(k);
                d
            })
            .collect()
    }

    fn sorted_by_outer(matches: Vec<KnnMatches>) -> Vec<(String, Vec<f64>)> {
        let mut out: Vec<(String, Vec<f64>)> = matches
            .into_iter()
            .map(|(row, n)| (row.to_string(), n.iter().map(|n| n.distance).collect()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    #[test]
    fn test_exact_small_example() {
        let config = config(3, 11);
        let left = points(vec![row![0.0, 0.0], row![5.0, 5.0]]);
        let right = points(vec![row![1.0, 0.0], row![0.0, 1.0], row![5.0, 6.0], row![10.0, 10.0]]);

        for strategy in [LocalJoinStrategy::NestedLoop, LocalJoinStrategy::RTreeProbe] {
            let joined = KnnJoin::new(&config)
                .strategy(strategy)
                .execute(&left, &right, &keys(), &keys(), 1)
                .unwrap();
            assert_eq!(joined.schema().len(), 4);

            let rows = joined.collect();
            assert_eq!(rows.len(), 2);
            let origin = rows.iter().find(|r| r.get(0) == Some(&Value::from(0.0))).unwrap();
            assert!(
                *origin == row![0.0, 0.0, 1.0, 0.0] || *origin == row![0.0, 0.0, 0.0, 1.0],
                "{}",
                origin
            );
            let middle = rows.iter().find(|r| r.get(0) == Some(&Value::from(5.0))).unwrap();
            assert_eq!(*middle, row![5.0, 5.0, 5.0, 6.0]);
        }
    }

    #[test]
    fn test_matches_brute_force() {
        let left_rows = grid(7, 1.3, 0.2);
        let right_rows = grid(9, 1.0, 0.0);
        let left = points(left_rows.clone());
        let right = points(right_rows.clone());
        let k = 5;

        let mut expected: Vec<(String, Vec<f64>)> = left_rows
            .iter()
            .map(|r| r.to_string())
            .zip(brute_force(&left_rows, &right_rows, k))
            .collect();
        expected.sort_by(|a, b| a.0.cmp(&b.0));

        for strategy in [LocalJoinStrategy::NestedLoop, LocalJoinStrategy::RTreeProbe] {
            for partitions in [1, 2, 4] {
                let config = config(partitions, 5);
                let matches = KnnJoin::new(&config)
                    .strategy(strategy)
                    .neighbors(&left, &right, &keys(), &keys(), k)
                    .unwrap();
                let actual = sorted_by_outer(matches.collect());
                assert_eq!(actual.len(), expected.len());
                for ((row, got), (_, want)) in actual.iter().zip(expected.iter()) {
                    assert_eq!(got.len(), want.len(), "{}", row);
                    for (g, w) in got.iter().zip(want.iter()) {
                        assert!((g - w).abs() < 1e-9, "{}: {:?} vs {:?}", row, got, want);
                    }
                }
            }
        }
    }

    #[test]
    fn test_seed_does_not_change_result() {
        let left = points(grid(5, 2.0, 0.5));
        let right = points(grid(6, 1.5, 0.0));
        let a = KnnJoin::new(&config(3, 1))
            .neighbors(&left, &right, &keys(), &keys(), 3)
            .unwrap();
        let b = KnnJoin::new(&config(3, 999))
            .neighbors(&left, &right, &keys(), &keys(), 3)
            .unwrap();
        assert_eq!(sorted_by_outer(a.collect()), sorted_by_outer(b.collect()));
    }

    #[test]
    fn test_k_larger_than_inner() {
        let config = config(2, 2);
        let left = points(grid(3, 1.0, 0.0));
        let right = points(vec![row![0.0, 0.0], row![4.0, 4.0]]);
        let joined = KnnJoin::new(&config).execute(&left, &right, &keys(), &keys(), 10).unwrap();
        assert_eq!(joined.count(), 9 * 2);
    }

    #[test]
    fn test_zero_k_rejected_for_empty_relations() {
        let config = config(2, 2);
        let empty = points(Vec::new());
        let err = KnnJoin::new(&config)
            .execute(&empty, &empty, &keys(), &keys(), 0)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_empty_sides() {
        let config = config(2, 2);
        let empty = points(Vec::new());
        let some = points(grid(2, 1.0, 0.0));

        let joined = KnnJoin::new(&config).execute(&empty, &some, &keys(), &keys(), 1).unwrap();
        assert!(joined.is_empty());

        let matches = KnnJoin::new(&config)
            .neighbors(&some, &empty, &keys(), &keys(), 1)
            .unwrap();
        assert_eq!(matches.count(), 4);
        assert!(matches.collect().iter().all(|(_, n)| n.is_empty()));
    }

    #[test]
    fn test_duplicate_outer_rows_kept_apart() {
        let config = config(3, 8);
        let left = points(vec![row![1.0, 1.0], row![1.0, 1.0]]);
        let right = points(vec![row![1.0, 2.0], row![9.0, 9.0]]);
        let joined = KnnJoin::new(&config).execute(&left, &right, &keys(), &keys(), 1).unwrap();
        assert_eq!(joined.collect(), vec![row![1.0, 1.0, 1.0, 2.0], row![1.0, 1.0, 1.0, 2.0]]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let config = config(2, 2);
        let left = points(vec![row![0.0, 0.0]]);
        let err = KnnJoin::new(&config)
            .execute(&left, &left, &keys(), &[col("x")], 1)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DimensionMismatch);
    }

    #[test]
    fn test_text_key_rejected() {
        let config = config(2, 2);
        let schema = Schema::new(vec![Field::new("name", DataType::String)]);
        let named = Relation::new(
            schema,
            Dataset::from_vec(Executor::new(1), vec![row!["a"]], 1),
        )
        .unwrap();
        let err = KnnJoin::new(&config)
            .execute(&named, &named, &[col("name")], &[col("name")], 1)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::KeyTypeMismatch);
    }
}
