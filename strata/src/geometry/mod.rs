//! Geometry primitives shared by the spatial partitioner, the R-tree and the KNN join.
//!
//! All operations are dimension-generic. Operations over two operands return a
//! [`GeometryError::DimensionMismatch`] when the operands disagree on their
//! dimension.

mod circle;
mod error;
mod mbr;
mod point;

pub use circle::Circle;
pub use error::{GeometryError, GeometryResult};
pub use mbr::Mbr;
pub use point::Point;
