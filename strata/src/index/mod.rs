//! Local index structures built over the rows of a single partition.
//!
//! # Index Kinds
//!
//! - **Hash**: scalar key to row positions, point lookups only
//! - **Ordered**: numeric key sorted for range scans
//! - **R-tree**: multi-dimensional point key for range, circle and
//!   nearest-neighbor search
//!
//! Every index stores row positions into its partition's row array, never
//! the rows themselves.

mod hash_index;
mod ordered_index;
pub mod rtree;

pub use hash_index::*;
pub use ordered_index::*;
pub use rtree::{LeafEntry, RTree, RTreeStats};

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::errors::{ErrorKind, StrataError, StrataResult};

/// Which index structure to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndexKind {
    Hash,
    Ordered,
    RTree,
}

impl IndexKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::Hash => "hash",
            IndexKind::Ordered => "ordered",
            IndexKind::RTree => "rtree",
        }
    }
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for IndexKind {
    type Err = StrataError;

    /// Accepts `hash`/`hashmap`, `ordered`/`treemap` and `rtree`, ignoring case.
    fn from_str(s: &str) -> StrataResult<IndexKind> {
        let name = s.trim();
        if name.eq_ignore_ascii_case("hash") || name.eq_ignore_ascii_case("hashmap") {
            Ok(IndexKind::Hash)
        } else if name.eq_ignore_ascii_case("ordered") || name.eq_ignore_ascii_case("treemap") {
            Ok(IndexKind::Ordered)
        } else if name.eq_ignore_ascii_case("rtree") {
            Ok(IndexKind::RTree)
        } else {
            log::error!("Unsupported index kind {}", s);
            Err(StrataError::new(
                &format!("Unsupported index kind {}", s),
                ErrorKind::UnsupportedIndexKind,
            ))
        }
    }
}

/// The index built over one partition.
#[derive(Clone, Debug)]
pub enum LocalIndex {
    Hash(HashIndex),
    Ordered(OrderedIndex),
    RTree(RTree<usize>),
}

impl LocalIndex {
    pub fn kind(&self) -> IndexKind {
        match self {
            LocalIndex::Hash(_) => IndexKind::Hash,
            LocalIndex::Ordered(_) => IndexKind::Ordered,
            LocalIndex::RTree(_) => IndexKind::RTree,
        }
    }

    /// Number of indexed positions.
    pub fn len(&self) -> usize {
        match self {
            LocalIndex::Hash(index) => index.len(),
            LocalIndex::Ordered(index) => index.len(),
            LocalIndex::RTree(tree) => tree.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_hash(&self) -> Option<&HashIndex> {
        match self {
            LocalIndex::Hash(index) => Some(index),
            _ => None,
        }
    }

    pub fn as_ordered(&self) -> Option<&OrderedIndex> {
        match self {
            LocalIndex::Ordered(index) => Some(index),
            _ => None,
        }
    }

    pub fn as_rtree(&self) -> Option<&RTree<usize>> {
        match self {
            LocalIndex::RTree(tree) => Some(tree),
            _ => None,
        }
    }
}
