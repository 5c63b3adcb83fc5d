use crate::common::{KeyExpr, PointExtractor, Row};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::exec::{CacheCatalog, CachePolicy, Dataset};
use crate::geometry::{Mbr, Point};
use crate::index::{HashIndex, IndexKind, LeafEntry, LocalIndex, OrderedIndex, RTree};
use crate::partitioner::{
    HashPartitioner, PartitionRecord, Partitioner, RangePartitioner, StrPartitioner,
};
use super::indexed::numeric_key;
use crate::relation::{GlobalIndex, IndexedPartition, IndexedRelation, Relation};
use crate::strata_config::StrataConfig;

/// Partitions a relation, builds one local index per partition and, for
/// R-tree indexes, a global R-tree over the partition bounding boxes.
///
/// This is the only place where an index forces its input to materialize.
/// Every finished index is registered in the session cache under its name.
pub struct IndexBuilder<'a> {
    config: &'a StrataConfig,
    catalog: &'a CacheCatalog,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(config: &'a StrataConfig, catalog: &'a CacheCatalog) -> IndexBuilder<'a> {
        IndexBuilder { config, catalog }
    }

    /// # Errors
    ///
    /// Configuration errors (wrong key count, key column type unfit for the
    /// kind, unknown columns) are returned before any partition is touched.
    /// A key that evaluates to a non-numeric value where a number is needed
    /// fails the build with a `TypeError`.
    pub fn build(
        &self,
        relation: &Relation,
        kind: IndexKind,
        keys: &[KeyExpr],
        name: &str,
    ) -> StrataResult<IndexedRelation> {
        if relation.is_empty() {
            log::warn!("Building {} index {} over an empty relation", kind, name);
        }

        let indexed = match kind {
            IndexKind::Hash => self.build_hash(relation, keys, name)?,
            IndexKind::Ordered => self.build_ordered(relation, keys, name)?,
            IndexKind::RTree => self.build_rtree(relation, keys, name)?,
        };

        log::info!(
            "Built {} index {} over {} rows in {} partitions",
            kind,
            name,
            indexed.count(),
            indexed.num_partitions()
        );
        self.catalog.persist(name, indexed.clone(), CachePolicy::Evictable);
        Ok(indexed)
    }

    fn build_hash(&self, relation: &Relation, keys: &[KeyExpr], name: &str) -> StrataResult<IndexedRelation> {
        let key = single_key(IndexKind::Hash, keys)?.bind(relation.schema())?;
        let partitioner = HashPartitioner::new(self.config.shuffle_partitions());

        let keyed = relation.rows().map("hash_index_keys", |row| {
            let value = key.eval(row)?;
            Ok((partitioner.partition_of(&value)?, value, row.clone()))
        })?;
        let shuffled = keyed.partition_by("hash_index_shuffle", partitioner.num_partitions(), |(id, _, _)| *id)?;
        let partitions = shuffled.map_partitions("hash_index_build", |id, records| {
            let index = (!records.is_empty())
                .then(|| LocalIndex::Hash(HashIndex::build(records.iter().map(|(_, key, _)| key.clone()))));
            Ok(vec![IndexedPartition::new(id, rows_of(records), index)])
        })?;

        log::debug!("Hash index {} partition sizes {:?}", name, shuffled.partition_counts());
        Ok(IndexedRelation::new(
            name,
            IndexKind::Hash,
            relation.schema().clone(),
            keys.to_vec(),
            partitions,
            GlobalIndex::Hash(partitioner),
        ))
    }

    fn build_ordered(&self, relation: &Relation, keys: &[KeyExpr], name: &str) -> StrataResult<IndexedRelation> {
        let key = single_key(IndexKind::Ordered, keys)?.bind(relation.schema())?;
        if !key.data_type().is_numeric() {
            return Err(key_type_mismatch(&format!(
                "Ordered index key {} has type {}, expected a numeric type",
                key.name(),
                key.data_type()
            )));
        }

        let keyed = relation
            .rows()
            .map("ordered_index_keys", |row| Ok((numeric_key(&key.eval(row)?)?, row.clone())))?;
        let sample: Vec<f64> = self
            .fit_sample(&keyed, "ordered_index_sample")?
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        let partitioner = RangePartitioner::from_sample(sample, self.config.shuffle_partitions());

        let assigned = keyed.map("ordered_index_assign", |(k, row)| {
            Ok((partitioner.partition_of(k)?, *k, row.clone()))
        })?;
        let shuffled = assigned.partition_by("ordered_index_shuffle", partitioner.num_partitions(), |(id, _, _)| *id)?;
        let partitions = shuffled.map_partitions("ordered_index_build", |id, records| {
            let index = (!records.is_empty())
                .then(|| LocalIndex::Ordered(OrderedIndex::build(records.iter().map(|(_, k, _)| *k))));
            Ok(vec![IndexedPartition::new(id, rows_of(records), index)])
        })?;

        log::debug!(
            "Ordered index {} boundaries {:?}, partition sizes {:?}",
            name,
            partitioner.bounds(),
            shuffled.partition_counts()
        );
        Ok(IndexedRelation::new(
            name,
            IndexKind::Ordered,
            relation.schema().clone(),
            keys.to_vec(),
            partitions,
            GlobalIndex::Ordered(partitioner),
        ))
    }

    fn build_rtree(&self, relation: &Relation, keys: &[KeyExpr], name: &str) -> StrataResult<IndexedRelation> {
        let extractor = PointExtractor::bind(keys, relation.schema())?;
        let max_entries = self.config.max_entries_per_node();

        let located = relation
            .rows()
            .map("rtree_index_points", |row| Ok((extractor.extract(row)?, row.clone())))?;
        if located.is_empty() {
            let partitions = Dataset::from_partitions(
                located.executor().clone(),
                vec![vec![IndexedPartition::new(0, Vec::new(), None)]],
            );
            return Ok(IndexedRelation::new(
                name,
                IndexKind::RTree,
                relation.schema().clone(),
                keys.to_vec(),
                partitions,
                GlobalIndex::RTree {
                    tree: None,
                    records: Vec::new(),
                },
            ));
        }

        let sample: Vec<Point> = self
            .fit_sample(&located, "rtree_index_sample")?
            .into_iter()
            .map(|(point, _)| point)
            .collect();
        let partitioner = StrPartitioner::build(sample, self.config.shuffle_partitions())?;

        let assigned = located.map("rtree_index_assign", |(point, row)| {
            Ok((partitioner.partition_of(point)?, point.clone(), row.clone()))
        })?;
        let shuffled = assigned.partition_by("rtree_index_shuffle", partitioner.num_partitions(), |(id, _, _)| *id)?;
        let partitions = shuffled.map_partitions("rtree_index_build", |id, records| {
            let entries = records
                .iter()
                .enumerate()
                .map(|(position, (_, point, _))| LeafEntry::new(Mbr::from_point(point), position))
                .collect();
            let index = RTree::bulk_load(entries, max_entries)?.map(LocalIndex::RTree);
            Ok(vec![IndexedPartition::new(id, rows_of(records), index)])
        })?;

        // partition boxes come from the rows actually assigned, so their
        // union covers every input point
        let records: Vec<PartitionRecord> = partitions
            .partitions()
            .flatten()
            .filter_map(|p| {
                p.index()
                    .and_then(LocalIndex::as_rtree)
                    .map(|tree| PartitionRecord::new(p.id(), tree.root_mbr().clone(), p.len()))
            })
            .collect();
        let tree = RTree::bulk_load(
            records
                .iter()
                .map(|r| LeafEntry::new(r.mbr.clone(), r.clone()))
                .collect(),
            max_entries,
        )?;

        log::debug!(
            "R-tree index {}: {} partitions, sizes {:?}, global tree height {}",
            name,
            records.len(),
            shuffled.partition_counts(),
            tree.as_ref().map(RTree::height).unwrap_or(0)
        );
        Ok(IndexedRelation::new(
            name,
            IndexKind::RTree,
            relation.schema().clone(),
            keys.to_vec(),
            partitions,
            GlobalIndex::RTree { tree, records },
        ))
    }

    /// All elements for small inputs, a Bernoulli sample otherwise.
    ///
    /// A sample with fewer than `max_entries_per_node` elements per target
    /// partition cannot place `shuffle_partitions` balanced boundaries, so
    /// the full input is used instead.
    fn fit_sample<T>(&self, data: &Dataset<T>, stage: &str) -> StrataResult<Vec<T>>
    where
        T: Clone + Send + Sync,
    {
        let total = data.count();
        if total <= self.config.sample_threshold() {
            return Ok(data.collect());
        }
        let sample = data.sample(stage, self.config.sample_rate(), self.config.seed())?;
        let needed = self.config.shuffle_partitions() * self.config.max_entries_per_node();
        if sample.len() < needed {
            log::warn!(
                "Sampling {} of {} rows drew {}, fewer than the {} needed, fitting on the full input",
                self.config.sample_rate(),
                total,
                sample.len(),
                needed
            );
            return Ok(data.collect());
        }
        log::debug!("Sampled {} of {} rows", sample.len(), total);
        Ok(sample)
    }
}

fn single_key(kind: IndexKind, keys: &[KeyExpr]) -> StrataResult<&KeyExpr> {
    match keys {
        [key] => Ok(key),
        _ => Err(key_type_mismatch(&format!(
            "A {} index takes exactly one key column, got {}",
            kind,
            keys.len()
        ))),
    }
}

fn key_type_mismatch(message: &str) -> StrataError {
    log::error!("{}", message);
    StrataError::new(message, ErrorKind::KeyTypeMismatch)
}

fn rows_of<K, V>(records: &[(K, V, Row)]) -> Vec<Row> {
    records.iter().map(|(_, _, row)| row.clone()).collect()
}
