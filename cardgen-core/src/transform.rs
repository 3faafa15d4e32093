//! 3D transformation utilities
//!
//! Matrices use the column-vector convention: a point is transformed as
//! `M * p`, and `A.compose(B)` applies `B` first. An xform-op stack
//! `[op0, op1, ..., opN]` therefore composes as `op0 * op1 * ... * opN`.

use crate::point::{Axis, Matrix4d, Point3d, Vector3d};
use nalgebra::{Quaternion, Rotation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// A 3D transformation that can be applied to points and bounding boxes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub matrix: Matrix4d,
}

impl Transform3D {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4d::identity(),
        }
    }

    /// Create a translation transformation
    pub fn translation(translation: Vector3d) -> Self {
        Self {
            matrix: Matrix4d::new_translation(&translation),
        }
    }

    /// Create a scaling transformation
    pub fn scaling(scale: Vector3d) -> Self {
        Self {
            matrix: Matrix4d::new_nonuniform_scaling(&scale),
        }
    }

    /// Create a rotation of `degrees` about a single axis
    pub fn rotation_about(axis: Axis, degrees: f64) -> Self {
        let rotation = Rotation3::from_axis_angle(
            &nalgebra::Unit::new_unchecked(axis.unit()),
            degrees.to_radians(),
        );
        Self {
            matrix: rotation.to_homogeneous(),
        }
    }

    /// Create a three-axis rotation.
    ///
    /// `order` names the axes in the order they are applied, so
    /// `[X, Y, Z]` matches USD's `rotateXYZ`: X first, then Y, then Z.
    pub fn rotation_euler(order: [Axis; 3], degrees: Vector3d) -> Self {
        order.iter().fold(Self::identity(), |acc, axis| {
            Self::rotation_about(*axis, degrees[axis.index()]).compose(acc)
        })
    }

    /// Create a rotation from quaternion components (real part first)
    pub fn rotation_quaternion(w: f64, i: f64, j: f64, k: f64) -> Self {
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(w, i, j, k));
        Self {
            matrix: rotation.to_homogeneous(),
        }
    }

    /// Apply the transformation to a point
    pub fn transform_point(&self, point: &Point3d) -> Point3d {
        let homogeneous = self.matrix * point.to_homogeneous();
        Point3d::from_homogeneous(homogeneous).unwrap_or(*point)
    }

    /// Apply the transformation to a vector
    pub fn transform_vector(&self, vector: &Vector3d) -> Vector3d {
        self.matrix.fixed_view::<3, 3>(0, 0) * vector
    }

    /// Compose this transformation with another; `other` is applied first
    pub fn compose(self, other: Self) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Get the inverse transformation
    pub fn inverse(self) -> Option<Self> {
        self.matrix
            .try_inverse()
            .map(|inv_matrix| Self { matrix: inv_matrix })
    }

    /// Check if this is approximately the identity transformation
    pub fn is_identity(&self, epsilon: f64) -> bool {
        (self.matrix - Matrix4d::identity()).norm() < epsilon
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(rhs)
    }
}

impl From<Matrix4d> for Transform3D {
    fn from(matrix: Matrix4d) -> Self {
        Self { matrix }
    }
}
