use itertools::Itertools;

use super::node::{LeafEntry, Node, NodeId};
use super::RTree;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::geometry::{GeometryError, Mbr};

impl<T> RTree<T> {
    /// Builds a packed tree with Sort-Tile-Recursive bulk loading.
    ///
    /// # Algorithm
    /// 1. Sort the entries by the center of their box along the first axis
    ///    and cut them into vertical slabs.
    /// 2. Recursively sort and cut each slab along the next axis; on the
    ///    last axis, cut runs of `max_entries` entries into leaves.
    /// 3. Tile the resulting nodes the same way, level by level, until a
    ///    single root remains.
    ///
    /// An empty input produces no tree.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `max_entries < 2` or an entry box has
    /// a NaN coordinate, and `DimensionMismatch` if the entries disagree on
    /// their dimension.
    pub fn bulk_load(entries: Vec<LeafEntry<T>>, max_entries: usize) -> StrataResult<Option<RTree<T>>> {
        if max_entries < 2 {
            log::error!("R-tree node capacity must be at least 2, got {}", max_entries);
            return Err(StrataError::new(
                &format!("R-tree node capacity must be at least 2, got {}", max_entries),
                ErrorKind::InvalidConfiguration,
            ));
        }

        let dim = match entries.first() {
            Some(first) => first.mbr.dim(),
            None => return Ok(None),
        };
        if let Some(bad) = entries.iter().find(|e| e.mbr.dim() != dim) {
            return Err(GeometryError::DimensionMismatch {
                expected: dim,
                actual: bad.mbr.dim(),
            }
            .into());
        }
        if let Some((bad, axis)) = entries.iter().find_map(|e| nan_axis(&e.mbr).map(|axis| (e, axis))) {
            log::error!("R-tree entry box {} has a NaN coordinate", bad.mbr);
            return Err(GeometryError::InvalidBounds {
                axis,
                low: bad.mbr.low().coord(axis),
                high: bad.mbr.high().coord(axis),
            }
            .into());
        }

        let len = entries.len();
        let mut nodes: Vec<Node<T>> = Vec::with_capacity(2 * len.div_ceil(max_entries));

        let leaves = tile(entries, max_entries, dim, &|e: &LeafEntry<T>, axis| center(&e.mbr, axis));
        let mut level: Vec<NodeId> = Vec::with_capacity(leaves.len());
        for group in leaves {
            let mbr = enclosing(group.iter().map(|e| &e.mbr))?;
            level.push(nodes.len());
            nodes.push(Node::Leaf {
                mbr,
                entries: group,
            });
        }

        let mut height = 1;
        while level.len() > 1 {
            let groups = tile(level, max_entries, dim, &|id: &NodeId, axis| {
                center(nodes[*id].mbr(), axis)
            });
            let mut next = Vec::with_capacity(groups.len());
            for children in groups {
                let mbr = enclosing(children.iter().map(|id| nodes[*id].mbr()))?;
                next.push(nodes.len());
                nodes.push(Node::Internal { mbr, children });
            }
            level = next;
            height += 1;
        }

        let root = level.first().copied().ok_or_else(|| {
            StrataError::new("Bulk load produced no root", ErrorKind::InternalError)
        })?;

        log::debug!(
            "Bulk loaded R-tree: {} entries, {} nodes, height {}",
            len,
            nodes.len(),
            height
        );

        Ok(Some(RTree {
            nodes,
            root,
            len,
            dim,
            height,
            max_entries,
        }))
    }
}

/// Number of slabs per axis so that `slabs^dims >= pages`.
fn nan_axis(mbr: &Mbr) -> Option<usize> {
    (0..mbr.dim()).find(|axis| mbr.low().coord(*axis).is_nan() || mbr.high().coord(*axis).is_nan())
}

pub(crate) fn slab_count(pages: usize, dims: usize) -> usize {
    let dims = dims.max(1) as u32;
    let mut slabs = ((pages as f64).powf(1.0 / dims as f64).floor() as usize).max(1);
    while slabs.checked_pow(dims).is_some_and(|cells| cells < pages) {
        slabs += 1;
    }
    slabs
}

/// Groups `items` into runs of at most `capacity`, tiled along every axis.
fn tile<E, F>(items: Vec<E>, capacity: usize, dim: usize, key: &F) -> Vec<Vec<E>>
where
    F: Fn(&E, usize) -> f64,
{
    let mut out = Vec::with_capacity(items.len().div_ceil(capacity));
    tile_axis(items, 0, capacity, dim, key, &mut out);
    out
}

fn tile_axis<E, F>(mut items: Vec<E>, axis: usize, capacity: usize, dim: usize, key: &F, out: &mut Vec<Vec<E>>)
where
    F: Fn(&E, usize) -> f64,
{
    if items.len() <= capacity {
        if !items.is_empty() {
            out.push(items);
        }
        return;
    }

    items.sort_by(|a, b| key(a, axis).total_cmp(&key(b, axis)));
    let last_axis = axis + 1 >= dim;
    let chunk = if last_axis {
        capacity
    } else {
        let pages = items.len().div_ceil(capacity);
        capacity * pages.div_ceil(slab_count(pages, dim - axis))
    };

    let chunks = items.into_iter().chunks(chunk);
    for group in &chunks {
        let group: Vec<E> = group.collect();
        if last_axis {
            out.push(group);
        } else {
            tile_axis(group, axis + 1, capacity, dim, key, out);
        }
    }
}

fn center(mbr: &Mbr, axis: usize) -> f64 {
    (mbr.low().coord(axis) + mbr.high().coord(axis)) / 2.0
}

fn enclosing<'a>(mut boxes: impl Iterator<Item = &'a Mbr>) -> StrataResult<Mbr> {
    let mut result = boxes
        .next()
        .cloned()
        .ok_or_else(|| StrataError::new("Cannot enclose an empty group", ErrorKind::InternalError))?;
    for mbr in boxes {
        result.expand_unchecked(mbr);
    }
    Ok(result)
}
