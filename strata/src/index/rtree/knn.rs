use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::node::{Node, NodeId};
use super::RTree;
use crate::common::{Neighbor, TopK};
use crate::errors::StrataResult;
use crate::geometry::Point;

/// A node waiting to be expanded, ordered so the nearest pops first.
struct Pending {
    distance: f64,
    node: NodeId,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        other.distance.total_cmp(&self.distance)
    }
}

impl<T> RTree<T> {
    /// The `k` entries nearest to `query`, sorted ascending by distance.
    ///
    /// Nodes are expanded best-first by their minimum distance to `query`.
    /// The search stops as soon as the nearest unexpanded node cannot beat
    /// the current k-th candidate. Returns `min(k, len)` entries; every
    /// returned distance is at most the distance of any entry left out.
    pub fn knn(&self, query: &Point, k: usize) -> StrataResult<Vec<Neighbor<&T>>> {
        self.check_dim(query.dim())?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut top = TopK::new(k);

        let mut queue = BinaryHeap::new();
        queue.push(Pending {
            distance: self.nodes[self.root].mbr().min_dist_unchecked(query),
            node: self.root,
        });

        let mut expanded = 0usize;
        while let Some(Pending { distance, node }) = queue.pop() {
            if !top.admits(distance) {
                break;
            }
            expanded += 1;
            match &self.nodes[node] {
                Node::Leaf { entries, .. } => {
                    for entry in entries {
                        top.push(&entry.item, entry.mbr.min_dist_unchecked(query));
                    }
                }
                Node::Internal { children, .. } => {
                    for child in children {
                        let distance = self.nodes[*child].mbr().min_dist_unchecked(query);
                        if top.admits(distance) {
                            queue.push(Pending {
                                distance,
                                node: *child,
                            });
                        }
                    }
                }
            }
        }

        log::trace!("KNN query expanded {} of {} nodes", expanded, self.nodes.len());
        Ok(top.into_sorted_vec())
    }
}
