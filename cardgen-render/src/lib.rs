//! External tool plumbing for cardgen
//!
//! Parallel snapshot rendering with `usdrecord`, usdz packaging with
//! `usdzip` and binary layer conversion with `usdcat`, all behind the
//! [`CommandRunner`] seam.

pub mod backend;
pub mod command;
pub mod convert;
pub mod packager;
pub mod rig_file;
pub mod snapshot;

pub use backend::RendererBackend;
pub use command::{CommandRunner, ProcessRunner, ToolCommand};
pub use convert::UsdcatConverter;
pub use packager::{package_path, ArchivePackager, PackageContents, PACKAGE_SUFFIX};
pub use rig_file::RigFile;
pub use snapshot::{snapshot_path, SnapshotConfig, SnapshotRenderer, RENDERS_DIR};
