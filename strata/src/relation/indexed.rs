use std::fmt::{Debug, Formatter};
use std::ops::Bound;
use std::sync::Arc;

use crate::common::{to_point, KeyExpr, Row, Schema, TopK, Value};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::exec::Dataset;
use crate::geometry::{Circle, Mbr, Point};
use crate::index::{IndexKind, LocalIndex, RTree};
use crate::partitioner::{HashPartitioner, PartitionRecord, Partitioner, RangePartitioner};

/// The rows of one partition and the index built over them.
///
/// A partition that received no rows carries no index; queries treat it as
/// holding no matches.
#[derive(Clone, Debug)]
pub struct IndexedPartition {
    id: usize,
    rows: Vec<Row>,
    index: Option<LocalIndex>,
}

impl IndexedPartition {
    pub fn new(id: usize, rows: Vec<Row>, index: Option<LocalIndex>) -> IndexedPartition {
        IndexedPartition { id, rows, index }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn index(&self) -> Option<&LocalIndex> {
        self.index.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn rows_at(&self, positions: impl IntoIterator<Item = usize>) -> StrataResult<Vec<Row>> {
        positions
            .into_iter()
            .map(|position| self.row_at(position).cloned())
            .collect()
    }

    fn row_at(&self, position: usize) -> StrataResult<&Row> {
        self.rows.get(position).ok_or_else(|| {
            StrataError::new(
                &format!("Partition {} has no row at position {}", self.id, position),
                ErrorKind::InternalError,
            )
        })
    }
}

/// Summary used to route a query to the partitions that may answer it.
#[derive(Clone, Debug)]
pub enum GlobalIndex {
    /// Keys were hash-partitioned; a key lives in exactly one partition.
    Hash(HashPartitioner),
    /// Keys were range-partitioned at sorted boundaries.
    Ordered(RangePartitioner),
    /// An R-tree over the bounding box of every non-empty partition.
    RTree {
        tree: Option<RTree<PartitionRecord>>,
        records: Vec<PartitionRecord>,
    },
}

/// A relation partitioned and indexed once, queried many times.
///
/// Cloning is cheap; clones share the partitions and indexes.
#[derive(Clone)]
pub struct IndexedRelation {
    inner: Arc<IndexedRelationInner>,
}

struct IndexedRelationInner {
    name: String,
    kind: IndexKind,
    schema: Schema,
    keys: Vec<KeyExpr>,
    partitions: Dataset<IndexedPartition>,
    global: GlobalIndex,
}

impl IndexedRelation {
    pub(crate) fn new(
        name: &str,
        kind: IndexKind,
        schema: Schema,
        keys: Vec<KeyExpr>,
        partitions: Dataset<IndexedPartition>,
        global: GlobalIndex,
    ) -> IndexedRelation {
        IndexedRelation {
            inner: Arc::new(IndexedRelationInner {
                name: name.to_string(),
                kind,
                schema,
                keys,
                partitions,
                global,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> IndexKind {
        self.inner.kind
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub fn keys(&self) -> &[KeyExpr] {
        &self.inner.keys
    }

    pub fn global_index(&self) -> &GlobalIndex {
        &self.inner.global
    }

    pub fn num_partitions(&self) -> usize {
        self.inner.partitions.num_partitions()
    }

    pub fn partition(&self, id: usize) -> Option<&IndexedPartition> {
        self.inner.partitions.partition(id).first()
    }

    pub fn partitions(&self) -> impl Iterator<Item = &IndexedPartition> {
        self.inner.partitions.partitions().flat_map(|p| p.iter())
    }

    /// Row count of every partition, by partition id.
    pub fn partition_counts(&self) -> Vec<usize> {
        self.partitions().map(IndexedPartition::len).collect()
    }

    pub fn count(&self) -> usize {
        self.partitions().map(IndexedPartition::len).sum()
    }

    /// Every indexed row, in partition order.
    pub fn collect(&self) -> Vec<Row> {
        self.partitions().flat_map(|p| p.rows().iter().cloned()).collect()
    }

    /// Rows whose key equals `key`.
    ///
    /// For an R-tree index, `key` is an array of coordinates and the result
    /// holds the rows located exactly at that point.
    pub fn lookup(&self, key: &Value) -> StrataResult<Vec<Row>> {
        match &self.inner.global {
            GlobalIndex::Hash(partitioner) => {
                let id = partitioner.partition_of(key)?;
                self.probe(id, |index| match index {
                    LocalIndex::Hash(hash) => Ok(hash.get(key).to_vec()),
                    other => Err(self.corrupt(other)),
                })
            }
            GlobalIndex::Ordered(partitioner) => {
                let key = numeric_key(key)?;
                let mut rows = Vec::new();
                for id in partitioner.partitions_for_range(key, key) {
                    rows.extend(self.probe(id, |index| match index {
                        LocalIndex::Ordered(ordered) => Ok(ordered.get(key)),
                        other => Err(self.corrupt(other)),
                    })?);
                }
                Ok(rows)
            }
            GlobalIndex::RTree { tree, .. } => {
                let point = to_point("lookup key", key)?;
                let Some(tree) = tree else {
                    return Ok(Vec::new());
                };
                let mut rows = Vec::new();
                for record in tree.lookup(&point)? {
                    rows.extend(self.probe(record.item.id, |index| match index {
                        LocalIndex::RTree(local) => {
                            Ok(local.lookup(&point)?.iter().map(|e| e.item).collect())
                        }
                        other => Err(self.corrupt(other)),
                    })?);
                }
                Ok(rows)
            }
        }
    }

    /// Rows whose key lies in `[low, high]`, visiting only the partitions
    /// whose boundaries overlap the range.
    pub fn range_scan(&self, low: f64, high: f64) -> StrataResult<Vec<Row>> {
        let partitioner = match &self.inner.global {
            GlobalIndex::Ordered(partitioner) => partitioner,
            _ => return Err(self.unsupported("range_scan")),
        };
        if low.is_nan() || high.is_nan() {
            return Err(StrataError::new(
                "Range scan bounds must not be NaN",
                ErrorKind::TypeError,
            ));
        }
        if low > high {
            return Ok(Vec::new());
        }

        let ids: Vec<usize> = partitioner.partitions_for_range(low, high).collect();
        self.gather("range_scan", ids, |index| match index {
            LocalIndex::Ordered(ordered) => Ok(ordered.range(Bound::Included(low), Bound::Included(high))),
            other => Err(self.corrupt(other)),
        })
    }

    /// Rows whose point falls inside `query` (boundaries inclusive).
    pub fn range_query(&self, query: &Mbr) -> StrataResult<Vec<Row>> {
        let ids = self.candidate_partitions(query)?;
        self.gather("range_query", ids, |index| match index {
            LocalIndex::RTree(local) => Ok(local.range_search(query)?.iter().map(|e| e.item).collect()),
            other => Err(self.corrupt(other)),
        })
    }

    /// Rows within `radius` of `center`, with their distance, nearest first.
    pub fn circle_range(&self, center: &Point, radius: f64) -> StrataResult<Vec<(Row, f64)>> {
        let tree = match &self.inner.global {
            GlobalIndex::RTree { tree, .. } => tree,
            _ => return Err(self.unsupported("circle_range")),
        };
        if radius.is_nan() || radius < 0.0 {
            log::error!("Circle radius must be a non-negative number, got {}", radius);
            return Err(StrataError::new(
                &format!("Circle radius must be a non-negative number, got {}", radius),
                ErrorKind::InvalidConfiguration,
            ));
        }
        let Some(tree) = tree else {
            return Ok(Vec::new());
        };

        let circle = Circle::new(center.clone(), radius);
        let ids: Vec<usize> = tree.circle_range(&circle)?.iter().map(|n| n.item.id).collect();
        let found = self.inner.partitions.executor().run("circle_range", ids, |_, id| {
            let partition = self.partition_or_err(id)?;
            match partition.index() {
                None => Ok(Vec::new()),
                Some(LocalIndex::RTree(local)) => local
                    .circle_range(&circle)?
                    .into_iter()
                    .map(|n| -> StrataResult<(Row, f64)> {
                        Ok((partition.row_at(*n.item)?.clone(), n.distance))
                    })
                    .collect::<StrataResult<Vec<_>>>(),
                Some(other) => Err(self.corrupt(other)),
            }
        })?;

        let mut rows: Vec<(Row, f64)> = found.into_iter().flatten().collect();
        rows.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(rows)
    }

    /// The `k` rows nearest to `point`, with their distance, nearest first.
    ///
    /// Partitions are visited in ascending distance to their bounding box;
    /// the search stops once `k` candidates are held and the next partition
    /// is no closer than the current k-th.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `k` is zero.
    pub fn knn(&self, point: &Point, k: usize) -> StrataResult<Vec<(Row, f64)>> {
        let tree = match &self.inner.global {
            GlobalIndex::RTree { tree, .. } => tree,
            _ => return Err(self.unsupported("knn")),
        };
        if k == 0 {
            log::error!("k must be positive for a nearest-neighbor query");
            return Err(StrataError::new(
                "k must be positive for a nearest-neighbor query",
                ErrorKind::InvalidConfiguration,
            ));
        }
        let Some(tree) = tree else {
            return Ok(Vec::new());
        };

        let mut top: TopK<&Row> = TopK::new(k);
        let mut visited = 0;
        for neighbor in tree.knn(point, tree.len())? {
            if !top.admits(neighbor.distance) {
                break;
            }
            visited += 1;
            let partition = self.partition_or_err(neighbor.item.id)?;
            match partition.index() {
                None => {}
                Some(LocalIndex::RTree(local)) => {
                    for n in local.knn(point, k)? {
                        top.push(partition.row_at(*n.item)?, n.distance);
                    }
                }
                Some(other) => return Err(self.corrupt(other)),
            }
        }

        log::debug!(
            "KNN on {} visited {} of {} partitions",
            self.inner.name,
            visited,
            tree.len()
        );
        Ok(top
            .into_sorted_vec()
            .into_iter()
            .map(|n| (n.item.clone(), n.distance))
            .collect())
    }

    /// Ids of the partitions whose bounding box intersects `query`, ascending.
    pub fn candidate_partitions(&self, query: &Mbr) -> StrataResult<Vec<usize>> {
        let tree = match &self.inner.global {
            GlobalIndex::RTree { tree, .. } => tree,
            _ => return Err(self.unsupported("candidate_partitions")),
        };
        let Some(tree) = tree else {
            return Ok(Vec::new());
        };
        let mut ids: Vec<usize> = tree.range_search(query)?.iter().map(|e| e.item.id).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// One record per non-empty partition of an R-tree index.
    pub fn partition_records(&self) -> StrataResult<&[PartitionRecord]> {
        match &self.inner.global {
            GlobalIndex::RTree { records, .. } => Ok(records),
            _ => Err(self.unsupported("partition_records")),
        }
    }

    /// Range boundaries of an ordered index.
    pub fn boundaries(&self) -> StrataResult<&[f64]> {
        match &self.inner.global {
            GlobalIndex::Ordered(partitioner) => Ok(partitioner.bounds()),
            _ => Err(self.unsupported("boundaries")),
        }
    }

    fn partition_or_err(&self, id: usize) -> StrataResult<&IndexedPartition> {
        self.partition(id).ok_or_else(|| {
            StrataError::new(
                &format!("Index {} has no partition {}", self.inner.name, id),
                ErrorKind::InternalError,
            )
        })
    }

    fn probe<F>(&self, id: usize, positions: F) -> StrataResult<Vec<Row>>
    where
        F: Fn(&LocalIndex) -> StrataResult<Vec<usize>>,
    {
        let partition = self.partition_or_err(id)?;
        match partition.index() {
            Some(index) => partition.rows_at(positions(index)?),
            None => Ok(Vec::new()),
        }
    }

    /// Probes the given partitions in parallel, concatenating in id order.
    fn gather<F>(&self, stage: &str, ids: Vec<usize>, positions: F) -> StrataResult<Vec<Row>>
    where
        F: Fn(&LocalIndex) -> StrataResult<Vec<usize>> + Sync,
    {
        let found = self
            .inner
            .partitions
            .executor()
            .run(stage, ids, |_, id| self.probe(id, &positions))?;
        Ok(found.into_iter().flatten().collect())
    }

    fn unsupported(&self, operation: &str) -> StrataError {
        log::error!(
            "{} is not supported by {} index {}",
            operation,
            self.inner.kind,
            self.inner.name
        );
        StrataError::new(
            &format!(
                "{} is not supported by {} index {}",
                operation, self.inner.kind, self.inner.name
            ),
            ErrorKind::IndexTypeMismatch,
        )
    }

    fn corrupt(&self, found: &LocalIndex) -> StrataError {
        StrataError::new(
            &format!(
                "Index {} of kind {} holds a {} partition index",
                self.inner.name,
                self.inner.kind,
                found.kind()
            ),
            ErrorKind::InternalError,
        )
    }
}

impl Debug for IndexedRelation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedRelation")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("schema", &self.inner.schema)
            .field("keys", &self.inner.keys)
            .field("partitions", &self.num_partitions())
            .finish()
    }
}

/// Ordered index keys are compared as `f64`, so integers beyond +/- 2^53
/// are refused rather than rounded onto their neighbors.
pub(crate) fn numeric_key(key: &Value) -> StrataResult<f64> {
    match key.as_exact_f64() {
        Some(v) if !v.is_nan() => Ok(v),
        _ => Err(StrataError::new(
            &format!("Ordered index key must be a number exactly representable as f64, got {}", key),
            ErrorKind::TypeError,
        )),
    }
}
