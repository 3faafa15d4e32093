//! Card generation for USD assets
//!
//! [`Pipeline`] frames an asset with six cameras, renders a snapshot per
//! card, writes the snapshots back as `GeomModelAPI` card textures and
//! optionally packages the result as a usdz.

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput, ToolPrograms};
