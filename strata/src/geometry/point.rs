use smallvec::SmallVec;
use std::fmt::{Display, Formatter};

use super::{GeometryError, GeometryResult, Mbr};

/// Inline coordinate storage; points of up to four dimensions never allocate.
pub(crate) type Coords = SmallVec<[f64; 4]>;

/// An immutable point in D-dimensional space.
///
/// # Examples
///
/// ```rust
/// use strata::geometry::Point;
///
/// let a = Point::from([0.0, 0.0]);
/// let b = Point::from([3.0, 4.0]);
/// assert_eq!(a.min_dist(&b).unwrap(), 5.0);
/// ```
#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    coords: Coords,
}

impl Point {
    /// Creates a point from its coordinates.
    pub fn new(coords: impl IntoIterator<Item = f64>) -> Point {
        Point {
            coords: coords.into_iter().collect(),
        }
    }

    pub fn dim(&self) -> usize {
        self.coords.len()
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Returns the coordinate on `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= self.dim()`.
    pub fn coord(&self, axis: usize) -> f64 {
        self.coords[axis]
    }

    /// Euclidean distance between two points.
    pub fn min_dist(&self, other: &Point) -> GeometryResult<f64> {
        self.check_dim(other.dim())?;
        Ok(self.min_dist_unchecked(other))
    }

    /// Distance from this point to the nearest boundary of `mbr`, 0 if inside.
    pub fn min_dist_to(&self, mbr: &Mbr) -> GeometryResult<f64> {
        mbr.min_dist(self)
    }

    pub(crate) fn check_dim(&self, actual: usize) -> GeometryResult<()> {
        if self.dim() != actual {
            return Err(GeometryError::DimensionMismatch {
                expected: self.dim(),
                actual,
            });
        }
        Ok(())
    }

    pub(crate) fn min_dist_unchecked(&self, other: &Point) -> f64 {
        debug_assert_eq!(self.dim(), other.dim());
        self.coords
            .iter()
            .zip(other.coords.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl<const N: usize> From<[f64; N]> for Point {
    fn from(coords: [f64; N]) -> Self {
        Point::new(coords)
    }
}

impl From<Vec<f64>> for Point {
    fn from(coords: Vec<f64>) -> Self {
        Point::new(coords)
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}
