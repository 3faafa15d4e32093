//! Field-of-view math for placing card cameras
//!
//! Sizes and focal lengths must share a unit (millimetres throughout).

use crate::error::{Error, Result};

/// Focal length of every card camera, in millimetres
pub const FOCAL_LENGTH_MM: f64 = 50.0;

/// Sensor size used for both axes when solving for distance, in millimetres
pub const SENSOR_SIZE_MM: f64 = 24.0;

/// Focus distance authored on every card camera
pub const FOCUS_DISTANCE: f64 = 168.60936;

/// Millimetres per scene unit (scenes are authored in centimetres)
pub const MM_PER_SCENE_UNIT: f64 = 10.0;

/// Angular field of view, in radians, of a lens over a sensor
pub fn field_of_view(focal_length: f64, sensor_size: f64) -> f64 {
    2.0 * (sensor_size / (2.0 * focal_length)).atan()
}

/// Distance at which a subject of `subject_size` exactly fills `fov`
pub fn camera_distance(subject_size: f64, fov: f64) -> f64 {
    (subject_size / 2.0) / (fov / 2.0).tan()
}

/// Distance needed to frame `object_size` with the given lens and sensor
pub fn field_of_view_distance(sensor_size: f64, object_size: f64, focal_length: f64) -> f64 {
    camera_distance(object_size, field_of_view(focal_length, sensor_size))
}

/// Distance at which a `width` x `height` card fits the frame on both axes.
///
/// Both axes use the fixed 24mm sensor; the larger of the two distances
/// wins so the whole box is visible whatever its aspect ratio.
pub fn required_distance(width: f64, height: f64, focal_length: f64) -> Result<f64> {
    if !(focal_length.is_finite() && focal_length > 0.0) {
        return Err(Error::InvalidData(format!(
            "focal length must be positive, got {}",
            focal_length
        )));
    }
    if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
        return Err(Error::DegenerateBounds(format!(
            "card size must be positive, got {} x {}",
            width, height
        )));
    }

    let horizontal = field_of_view_distance(SENSOR_SIZE_MM, width, focal_length);
    let vertical = field_of_view_distance(SENSOR_SIZE_MM, height, focal_length);
    Ok(horizontal.max(vertical))
}
