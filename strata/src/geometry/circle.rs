use super::{GeometryResult, Mbr, Point};

/// All points within `radius` of `center`, boundary included.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Point, radius: f64) -> Circle {
        Circle { center, radius }
    }

    pub fn contains_point(&self, point: &Point) -> GeometryResult<bool> {
        Ok(self.center.min_dist(point)? <= self.radius)
    }

    pub fn intersects(&self, mbr: &Mbr) -> GeometryResult<bool> {
        Ok(mbr.min_dist(&self.center)? <= self.radius)
    }

    /// The bounding box of the circle.
    pub fn mbr(&self) -> Mbr {
        let low = Point::new(self.center.coords().iter().map(|c| c - self.radius));
        let high = Point::new(self.center.coords().iter().map(|c| c + self.radius));
        Mbr::new(low, high).unwrap_or_else(|_| Mbr::from_point(&self.center))
    }
}
