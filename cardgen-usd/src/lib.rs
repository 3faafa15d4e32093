//! Scene description access for cardgen
//!
//! A native reader and writer for USDA text layers, read-only usdz package
//! access, enough composition to compute world bounds, and the authoring
//! helpers the card pipeline needs: the camera rig layer, the usdz wrapper
//! layer and the `GeomModelAPI` card attributes.

pub mod bbox;
pub mod compose;
pub mod layer;
pub mod lexer;
pub mod model;
pub mod package;
pub mod parser;
pub mod resolve;
pub mod rig;
pub mod stage;
pub mod value;
pub mod writer;

pub use bbox::{local_bounds, local_transform, world_bounds};
pub use compose::{compose_scene, ComposedPrim, ComposedScene};
pub use layer::{Attribute, Layer, PrimSpec, Property, Relationship, Specifier, Variability, VariantSet};
pub use model::{apply_card_defaults, link_card_textures, relative_asset_path};
pub use package::Package;
pub use parser::parse_layer;
pub use resolve::{AssetLocation, LayerConverter, LayerFormat, LayerLoader, LoadedLayer, NoConverter};
pub use rig::{build_rig_layer, camera_path, RIG_ROOT};
pub use stage::{is_package_path, wrapper_path, Stage};
pub use value::{ListOp, Metadata, MetadataEntry, Value};
pub use writer::{layer_to_string, write_layer};
