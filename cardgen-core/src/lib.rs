//! Core data structures for cardgen
//!
//! This crate provides the pieces of card generation that do not touch the
//! file system: the fixed card table, the optics helpers that place a camera
//! around a bounding box, xform-op math and the shared error type.

pub mod bounds;
pub mod camera;
pub mod card;
pub mod error;
pub mod optics;
pub mod point;
pub mod purpose;
pub mod transform;

pub use bounds::*;
pub use camera::*;
pub use card::*;
pub use error::*;
pub use optics::*;
pub use point::*;
pub use purpose::*;
pub use transform::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
