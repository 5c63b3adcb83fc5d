//! Exact distributed k-nearest-neighbor join.
//!
//! The join replicates both inputs over a grid of buckets, computes a local
//! top-k per bucket and merges the partial lists per outer row with
//! [`merge_top_k`].

mod knn_join;
mod merge;

pub use knn_join::*;
pub use merge::*;
