//! In-memory, bulk-loaded R-tree.
//!
//! Nodes live in a flat arena and reference their children by position. The
//! tree is built once by [`RTree::bulk_load`] and is read-only afterwards.

mod bulk_load;
mod knn;
mod node;

pub(crate) use bulk_load::slab_count;
pub use node::LeafEntry;

use node::{Node, NodeId};

use crate::common::Neighbor;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::geometry::{Circle, Mbr, Point};

/// A height-balanced R-tree over entries carrying a payload of type `T`.
///
/// Every internal node holds at most `max_entries` children and every leaf at
/// most `max_entries` entries. A node's box encloses everything below it.
#[derive(Clone, Debug)]
pub struct RTree<T> {
    nodes: Vec<Node<T>>,
    root: NodeId,
    len: usize,
    dim: usize,
    height: usize,
    max_entries: usize,
}

/// Structural statistics of a built tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RTreeStats {
    pub entries: usize,
    pub nodes: usize,
    pub height: usize,
    pub max_entries: usize,
}

impl<T> RTree<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; an empty input never produces a tree.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of levels, counting the leaves.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Box enclosing every entry.
    pub fn root_mbr(&self) -> &Mbr {
        self.nodes[self.root].mbr()
    }

    pub fn stats(&self) -> RTreeStats {
        RTreeStats {
            entries: self.len,
            nodes: self.nodes.len(),
            height: self.height,
            max_entries: self.max_entries,
        }
    }

    /// All leaf entries, in arena order.
    pub fn entries(&self) -> impl Iterator<Item = &LeafEntry<T>> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Leaf { entries, .. } => Some(entries),
                Node::Internal { .. } => None,
            })
            .flatten()
    }

    /// Entries whose box intersects `query` (boundaries inclusive).
    pub fn range_search(&self, query: &Mbr) -> StrataResult<Vec<&LeafEntry<T>>> {
        self.check_dim(query.dim())?;
        let mut result = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match &self.nodes[id] {
                Node::Leaf { entries, .. } => {
                    result.extend(entries.iter().filter(|e| e.mbr.intersects_unchecked(query)));
                }
                Node::Internal { children, .. } => {
                    stack.extend(
                        children
                            .iter()
                            .copied()
                            .filter(|child| self.nodes[*child].mbr().intersects_unchecked(query)),
                    );
                }
            }
        }
        Ok(result)
    }

    /// Entries whose box contains `point`.
    pub fn lookup(&self, point: &Point) -> StrataResult<Vec<&LeafEntry<T>>> {
        self.check_dim(point.dim())?;
        let mut result = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if !node.mbr().contains_point_unchecked(point) {
                continue;
            }
            match node {
                Node::Leaf { entries, .. } => {
                    result.extend(entries.iter().filter(|e| e.mbr.contains_point_unchecked(point)));
                }
                Node::Internal { children, .. } => stack.extend(children.iter().copied()),
            }
        }
        Ok(result)
    }

    /// Entries within `circle.radius` of its center, paired with their
    /// distance and sorted ascending.
    pub fn circle_range(&self, circle: &Circle) -> StrataResult<Vec<Neighbor<&T>>> {
        self.check_dim(circle.center.dim())?;
        let mut result = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.mbr().min_dist_unchecked(&circle.center) > circle.radius {
                continue;
            }
            match node {
                Node::Leaf { entries, .. } => {
                    for entry in entries {
                        let distance = entry.mbr.min_dist_unchecked(&circle.center);
                        if distance <= circle.radius {
                            result.push(Neighbor::new(&entry.item, distance));
                        }
                    }
                }
                Node::Internal { children, .. } => stack.extend(children.iter().copied()),
            }
        }
        result.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(result)
    }

    /// Verifies the structural invariants: every node within capacity and
    /// enclosing its children, and all leaves at the same depth.
    pub fn check_integrity(&self) -> StrataResult<()> {
        let mut leaf_depth: Option<usize> = None;
        let mut seen = 0;
        let mut stack = vec![(self.root, 1usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id];
            if node.fanout() == 0 || node.fanout() > self.max_entries {
                return Err(integrity_error(&format!(
                    "Node {} has {} children, capacity is {}",
                    id,
                    node.fanout(),
                    self.max_entries
                )));
            }
            match node {
                Node::Leaf { mbr, entries } => {
                    if *leaf_depth.get_or_insert(depth) != depth {
                        return Err(integrity_error(&format!("Leaf {} is at depth {}", id, depth)));
                    }
                    if entries.iter().any(|e| !contains(mbr, &e.mbr)) {
                        return Err(integrity_error(&format!("Leaf {} does not enclose its entries", id)));
                    }
                    seen += entries.len();
                }
                Node::Internal { mbr, children } => {
                    for child in children {
                        if !contains(mbr, self.nodes[*child].mbr()) {
                            return Err(integrity_error(&format!(
                                "Node {} does not enclose child {}",
                                id, child
                            )));
                        }
                        stack.push((*child, depth + 1));
                    }
                }
            }
        }

        if seen != self.len || leaf_depth != Some(self.height) {
            return Err(integrity_error(&format!(
                "Tree reports {} entries at height {}, found {} at depth {:?}",
                self.len, self.height, seen, leaf_depth
            )));
        }
        Ok(())
    }

    fn check_dim(&self, actual: usize) -> StrataResult<()> {
        if actual != self.dim {
            return Err(StrataError::new(
                &format!(
                    "Query has dimension {} but the R-tree indexes dimension {}",
                    actual, self.dim
                ),
                ErrorKind::DimensionMismatch,
            ));
        }
        Ok(())
    }
}

fn contains(outer: &Mbr, inner: &Mbr) -> bool {
    outer.contains(inner).unwrap_or(false)
}

fn integrity_error(message: &str) -> StrataError {
    log::error!("R-tree integrity check failed: {}", message);
    StrataError::new(message, ErrorKind::InternalError)
}
