//! Axis-aligned bounding boxes

use crate::error::{Error, Result};
use crate::point::{Axis, Point3d, Vector3d};
use crate::transform::Transform3D;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in world space.
///
/// A freshly created box is empty (min > max) so that the first point
/// included defines it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds3d {
    pub min: Point3d,
    pub max: Point3d,
}

impl Bounds3d {
    /// Create an empty bounding box
    pub fn empty() -> Self {
        Self {
            min: Point3d::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3d::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Create a bounding box from two corners, in any order
    pub fn new(a: Point3d, b: Point3d) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// Create the smallest box containing every point
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Point3d>,
    {
        points.into_iter().fold(Self::empty(), |mut bounds, p| {
            bounds.include_point(p);
            bounds
        })
    }

    /// Check if no point has been included yet
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow the box to contain `point`
    pub fn include_point(&mut self, point: &Point3d) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Grow the box to contain `other`
    pub fn union(&mut self, other: &Bounds3d) {
        if other.is_empty() {
            return;
        }
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Point3d; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3d::new(a.x, a.y, a.z),
            Point3d::new(b.x, a.y, a.z),
            Point3d::new(a.x, b.y, a.z),
            Point3d::new(b.x, b.y, a.z),
            Point3d::new(a.x, a.y, b.z),
            Point3d::new(b.x, a.y, b.z),
            Point3d::new(a.x, b.y, b.z),
            Point3d::new(b.x, b.y, b.z),
        ]
    }

    /// Axis-aligned box enclosing this box after `transform`
    pub fn transformed(&self, transform: &Transform3D) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Self::empty();
        for corner in self.corners() {
            out.include_point(&transform.transform_point(&corner));
        }
        out
    }

    /// Midpoint of the box
    pub fn center(&self) -> Point3d {
        nalgebra::center(&self.min, &self.max)
    }

    /// Size of the box along every axis
    pub fn size(&self) -> Vector3d {
        self.max - self.min
    }

    /// Size of the box along one axis
    pub fn extent(&self, axis: Axis) -> f64 {
        self.max[axis.index()] - self.min[axis.index()]
    }

    /// Ensure the box can be framed by a camera on every axis.
    ///
    /// Every card uses two of the three axes and together they use all
    /// three, so each axis must have a finite, strictly positive extent.
    pub fn validate_frameable(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::DegenerateBounds(
                "no geometry contributed to the bounds".to_string(),
            ));
        }
        for axis in Axis::ALL {
            let extent = self.extent(axis);
            if !extent.is_finite() || extent <= 0.0 {
                return Err(Error::DegenerateBounds(format!(
                    "extent along {} is {}",
                    axis, extent
                )));
            }
        }
        Ok(())
    }
}

impl Default for Bounds3d {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_bounds() {
        let bounds = Bounds3d::empty();
        assert!(bounds.is_empty());
        assert!(bounds.validate_frameable().is_err());
    }

    #[test]
    fn test_union_and_center() {
        let mut bounds = Bounds3d::new(Point3d::new(0.0, 0.0, 0.0), Point3d::new(1.0, 1.0, 1.0));
        bounds.union(&Bounds3d::new(
            Point3d::new(-1.0, 2.0, 0.5),
            Point3d::new(0.0, 3.0, 0.5),
        ));
        assert_eq!(bounds.min, Point3d::new(-1.0, 0.0, 0.0));
        assert_eq!(bounds.max, Point3d::new(1.0, 3.0, 1.0));
        assert_relative_eq!(bounds.center(), Point3d::new(0.0, 1.5, 0.5));
        assert_relative_eq!(bounds.extent(Axis::Y), 3.0);
    }

    #[test]
    fn test_union_with_empty_is_noop() {
        let mut bounds = Bounds3d::new(Point3d::new(0.0, 0.0, 0.0), Point3d::new(1.0, 1.0, 1.0));
        let before = bounds;
        bounds.union(&Bounds3d::empty());
        assert_eq!(bounds, before);
    }

    #[test]
    fn test_transformed_rotation_grows_box() {
        let bounds = Bounds3d::new(Point3d::new(-1.0, -1.0, -1.0), Point3d::new(1.0, 1.0, 1.0));
        let rotated = bounds.transformed(&Transform3D::rotation_about(Axis::Z, 45.0));
        assert_relative_eq!(rotated.extent(Axis::X), 2.0 * 2.0_f64.sqrt(), epsilon = 1e-9);
        assert_relative_eq!(rotated.extent(Axis::Z), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_box_is_not_frameable() {
        let bounds = Bounds3d::new(Point3d::new(0.0, 0.0, 0.0), Point3d::new(1.0, 1.0, 0.0));
        match bounds.validate_frameable() {
            Err(Error::DegenerateBounds(message)) => assert!(message.contains('Z')),
            other => panic!("expected degenerate bounds, got {:?}", other),
        }
    }
}
