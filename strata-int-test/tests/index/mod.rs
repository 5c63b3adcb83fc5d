//! Index integration tests.
//!
//! These tests build partitioned indexes through a session and query them
//! end to end.

mod rtree_index_test;
mod scalar_index_test;
