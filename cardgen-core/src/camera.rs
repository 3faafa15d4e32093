//! Card camera placement
//!
//! Turns a card descriptor and the subject's world bounds into the
//! attribute values of one rig camera.

use crate::bounds::Bounds3d;
use crate::card::{Card, CardName, Rotation, CARDS};
use crate::error::Result;
use crate::optics::{required_distance, FOCAL_LENGTH_MM, FOCUS_DISTANCE, MM_PER_SCENE_UNIT};
use crate::point::Vector3d;
use serde::{Deserialize, Serialize};

/// Attribute values of a single card camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub name: CardName,
    pub focal_length: f64,
    pub focus_distance: f64,
    pub f_stop: f64,
    pub horizontal_aperture: f64,
    pub vertical_aperture: f64,
    /// World-space translation, in scene units
    pub translation: Vector3d,
    /// Rotate ops applied after the translation, in order
    pub rotations: Vec<Rotation>,
}

impl CameraRecord {
    /// Place the camera for `card` so the subject's bounds fill the frame
    pub fn for_card(card: &Card, bounds: &Bounds3d) -> Result<Self> {
        bounds.validate_frameable()?;

        let width = bounds.extent(card.horizontal) * MM_PER_SCENE_UNIT;
        let height = bounds.extent(card.vertical) * MM_PER_SCENE_UNIT;
        let focal_length = FOCAL_LENGTH_MM;

        let distance = required_distance(width, height, focal_length)?;

        let horizontal = focal_length * width / distance;
        let vertical = focal_length * height / distance;
        let (horizontal_aperture, vertical_aperture) = if card.flips_apertures() {
            (vertical, horizontal)
        } else {
            (horizontal, vertical)
        };

        let mut offset = Vector3d::zeros();
        offset[card.translation.index()] = card.sign * distance / MM_PER_SCENE_UNIT;

        Ok(Self {
            name: card.name,
            focal_length,
            focus_distance: FOCUS_DISTANCE,
            f_stop: 0.0,
            horizontal_aperture,
            vertical_aperture,
            translation: bounds.center().coords + offset,
            rotations: card.rotations.to_vec(),
        })
    }

    /// Distance from the camera to the center of `bounds`
    pub fn distance_to(&self, bounds: &Bounds3d) -> f64 {
        (self.translation - bounds.center().coords).norm()
    }
}

/// Build the six card cameras around `bounds`, in card order
pub fn build_camera_rig(bounds: &Bounds3d) -> Result<Vec<CameraRecord>> {
    CARDS
        .iter()
        .map(|card| CameraRecord::for_card(card, bounds))
        .collect()
}
