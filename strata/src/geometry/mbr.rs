use std::fmt::{Display, Formatter};

use super::point::Coords;
use super::{GeometryError, GeometryResult, Point};

/// A minimum bounding rectangle in D-dimensional space.
///
/// `Mbr` is the smallest axis-aligned box around a set of points or child
/// boxes, described by its `low` and `high` corners with `low[i] <= high[i]`
/// on every axis.
///
/// # Examples
///
/// ```rust
/// use strata::geometry::{Mbr, Point};
///
/// let mbr = Mbr::new(Point::from([0.0, 0.0]), Point::from([10.0, 10.0])).unwrap();
/// assert!(mbr.contains_point(&Point::from([5.0, 5.0])).unwrap());
/// assert_eq!(mbr.min_dist(&Point::from([13.0, 14.0])).unwrap(), 5.0);
/// ```
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mbr {
    low: Point,
    high: Point,
}

impl Mbr {
    /// Creates a rectangle from its corners.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::DimensionMismatch`] if the corners disagree on
    /// their dimension and [`GeometryError::InvalidBounds`] if `low` exceeds
    /// `high` on any axis or either corner has a NaN coordinate.
    pub fn new(low: Point, high: Point) -> GeometryResult<Mbr> {
        low.check_dim(high.dim())?;
        for axis in 0..low.dim() {
            let (l, h) = (low.coord(axis), high.coord(axis));
            if l.is_nan() || h.is_nan() || l > h {
                return Err(GeometryError::InvalidBounds {
                    axis,
                    low: l,
                    high: h,
                });
            }
        }
        Ok(Mbr { low, high })
    }

    /// The degenerate rectangle covering exactly one point.
    pub fn from_point(point: &Point) -> Mbr {
        Mbr {
            low: point.clone(),
            high: point.clone(),
        }
    }

    /// Smallest rectangle enclosing all `points`, or `None` when there are none.
    pub fn from_points<'a>(
        points: impl IntoIterator<Item = &'a Point>,
    ) -> GeometryResult<Option<Mbr>> {
        let mut result: Option<Mbr> = None;
        for point in points {
            match result.as_mut() {
                Some(mbr) => {
                    mbr.low.check_dim(point.dim())?;
                    mbr.expand_to_point(point);
                }
                None => result = Some(Mbr::from_point(point)),
            }
        }
        Ok(result)
    }

    pub fn dim(&self) -> usize {
        self.low.dim()
    }

    pub fn low(&self) -> &Point {
        &self.low
    }

    pub fn high(&self) -> &Point {
        &self.high
    }

    pub fn contains_point(&self, point: &Point) -> GeometryResult<bool> {
        self.low.check_dim(point.dim())?;
        Ok(self.contains_point_unchecked(point))
    }

    /// Checks if this rectangle fully contains `other`.
    pub fn contains(&self, other: &Mbr) -> GeometryResult<bool> {
        self.low.check_dim(other.dim())?;
        Ok((0..self.dim()).all(|axis| {
            self.low.coord(axis) <= other.low.coord(axis)
                && other.high.coord(axis) <= self.high.coord(axis)
        }))
    }

    /// Touching rectangles intersect.
    pub fn intersects(&self, other: &Mbr) -> GeometryResult<bool> {
        self.low.check_dim(other.dim())?;
        Ok(self.intersects_unchecked(other))
    }

    pub fn union(&self, other: &Mbr) -> GeometryResult<Mbr> {
        self.low.check_dim(other.dim())?;
        let mut merged = self.clone();
        merged.expand_unchecked(other);
        Ok(merged)
    }

    /// Product of the extents on every axis.
    pub fn area(&self) -> f64 {
        (0..self.dim())
            .map(|axis| self.extent(axis))
            .product()
    }

    /// Sum of the extents on every axis.
    pub fn margin(&self) -> f64 {
        (0..self.dim()).map(|axis| self.extent(axis)).sum()
    }

    pub fn extent(&self, axis: usize) -> f64 {
        self.high.coord(axis) - self.low.coord(axis)
    }

    pub fn center(&self) -> Point {
        Point::new((0..self.dim()).map(|axis| (self.low.coord(axis) + self.high.coord(axis)) / 2.0))
    }

    /// Distance from `point` to the nearest point of this rectangle, 0 if inside.
    pub fn min_dist(&self, point: &Point) -> GeometryResult<f64> {
        self.low.check_dim(point.dim())?;
        Ok(self.min_dist_unchecked(point))
    }

    pub(crate) fn contains_point_unchecked(&self, point: &Point) -> bool {
        (0..self.dim()).all(|axis| {
            let c = point.coord(axis);
            self.low.coord(axis) <= c && c <= self.high.coord(axis)
        })
    }

    pub(crate) fn intersects_unchecked(&self, other: &Mbr) -> bool {
        (0..self.dim()).all(|axis| {
            self.low.coord(axis) <= other.high.coord(axis)
                && other.low.coord(axis) <= self.high.coord(axis)
        })
    }

    pub(crate) fn min_dist_unchecked(&self, point: &Point) -> f64 {
        debug_assert_eq!(self.dim(), point.dim());
        (0..self.dim())
            .map(|axis| {
                let c = point.coord(axis);
                let closest = c.clamp(self.low.coord(axis), self.high.coord(axis));
                (c - closest) * (c - closest)
            })
            .sum::<f64>()
            .sqrt()
    }

    pub(crate) fn expand_unchecked(&mut self, other: &Mbr) {
        debug_assert_eq!(self.dim(), other.dim());
        self.low = pick(&self.low, &other.low, f64::min);
        self.high = pick(&self.high, &other.high, f64::max);
    }

    pub(crate) fn expand_to_point(&mut self, point: &Point) {
        debug_assert_eq!(self.dim(), point.dim());
        self.low = pick(&self.low, point, f64::min);
        self.high = pick(&self.high, point, f64::max);
    }
}

fn pick(a: &Point, b: &Point, f: fn(f64, f64) -> f64) -> Point {
    let coords: Coords = a
        .coords()
        .iter()
        .zip(b.coords().iter())
        .map(|(x, y)| f(*x, *y))
        .collect();
    Point::new(coords)
}

impl Display for Mbr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mbr({}, {})", self.low, self.high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mbr(low: [f64; 2], high: [f64; 2]) -> Mbr {
        Mbr::new(Point::from(low), Point::from(high)).unwrap()
    }

    #[test]
    fn test_new_rejects_inverted_bounds() {
        let err = Mbr::new(Point::from([10.0, 0.0]), Point::from([0.0, 10.0])).unwrap_err();
        assert_eq!(err, GeometryError::InvalidBounds { axis: 0, low: 10.0, high: 0.0 });
    }

    #[test]
    fn test_new_rejects_nan_corners() {
        let err = Mbr::new(Point::from([f64::NAN, 0.0]), Point::from([f64::NAN, 1.0])).unwrap_err();
        assert!(matches!(err, GeometryError::InvalidBounds { axis: 0, .. }));
        let err = Mbr::new(Point::from([0.0, 0.0]), Point::from([1.0, f64::NAN])).unwrap_err();
        assert!(matches!(err, GeometryError::InvalidBounds { axis: 1, .. }));
    }

    #[test]
    fn test_new_rejects_dimension_mismatch() {
        let err = Mbr::new(Point::from([0.0, 0.0]), Point::from([1.0, 1.0, 1.0])).unwrap_err();
        assert_eq!(err, GeometryError::DimensionMismatch { expected: 2, actual: 3 });
    }

    #[test]
    fn test_from_points() {
        let points = vec![
            Point::from([1.0, 5.0]),
            Point::from([-2.0, 3.0]),
            Point::from([4.0, -1.0]),
        ];
        let bounds = Mbr::from_points(&points).unwrap().unwrap();
        assert_eq!(bounds, mbr([-2.0, -1.0], [4.0, 5.0]));
        for p in &points {
            assert!(bounds.contains_point(p).unwrap());
        }
        assert!(Mbr::from_points(&Vec::<Point>::new()).unwrap().is_none());
    }

    #[test]
    fn test_from_points_dimension_mismatch() {
        let points = vec![Point::from([1.0, 5.0]), Point::from([1.0])];
        assert!(Mbr::from_points(&points).is_err());
    }

    #[test]
    fn test_contains_point_edges() {
        let b = mbr([0.0, 0.0], [10.0, 10.0]);
        assert!(b.contains_point(&Point::from([5.0, 5.0])).unwrap());
        assert!(b.contains_point(&Point::from([0.0, 10.0])).unwrap());
        assert!(!b.contains_point(&Point::from([-0.1, 5.0])).unwrap());
        assert!(b.contains_point(&Point::from([5.0])).is_err());
    }

    #[test]
    fn test_contains() {
        let outer = mbr([0.0, 0.0], [10.0, 10.0]);
        let inner = mbr([2.0, 2.0], [8.0, 8.0]);
        let partial = mbr([5.0, 5.0], [15.0, 15.0]);
        assert!(outer.contains(&inner).unwrap());
        assert!(!outer.contains(&partial).unwrap());
        assert!(!inner.contains(&outer).unwrap());
    }

    #[test]
    fn test_intersects() {
        let a = mbr([0.0, 0.0], [10.0, 10.0]);
        let b = mbr([5.0, 5.0], [15.0, 15.0]);
        let c = mbr([20.0, 20.0], [30.0, 30.0]);
        let touching = mbr([10.0, 10.0], [20.0, 20.0]);
        assert!(a.intersects(&b).unwrap());
        assert!(!a.intersects(&c).unwrap());
        assert!(a.intersects(&touching).unwrap());
    }

    #[test]
    fn test_union() {
        let a = mbr([0.0, 0.0], [5.0, 5.0]);
        let b = mbr([3.0, -3.0], [10.0, 4.0]);
        assert_eq!(a.union(&b).unwrap(), mbr([0.0, -3.0], [10.0, 5.0]));
    }

    #[test]
    fn test_area_margin_center() {
        let b = mbr([0.0, 0.0], [10.0, 5.0]);
        assert_eq!(b.area(), 50.0);
        assert_eq!(b.margin(), 15.0);
        assert_eq!(b.center(), Point::from([5.0, 2.5]));
        assert_eq!(Mbr::from_point(&Point::from([1.0, 1.0])).area(), 0.0);
    }

    #[test]
    fn test_min_dist() {
        let b = mbr([0.0, 0.0], [10.0, 10.0]);
        assert_eq!(b.min_dist(&Point::from([5.0, 5.0])).unwrap(), 0.0);
        assert_eq!(b.min_dist(&Point::from([13.0, 14.0])).unwrap(), 5.0);
        assert_eq!(b.min_dist(&Point::from([-2.0, 5.0])).unwrap(), 2.0);
        assert!(b.min_dist(&Point::from([1.0, 1.0, 1.0])).is_err());
    }

    #[test]
    fn test_three_dimensional() {
        let b = Mbr::new(Point::from([0.0, 0.0, 0.0]), Point::from([1.0, 2.0, 3.0])).unwrap();
        assert_eq!(b.area(), 6.0);
        assert_eq!(b.margin(), 6.0);
        assert_eq!(b.min_dist(&Point::from([1.0, 2.0, 5.0])).unwrap(), 2.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", mbr([0.0, 1.0], [2.0, 3.0])), "Mbr((0, 1), (2, 3))");
    }
}
