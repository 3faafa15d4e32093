//! Scoped rig layer on disk
//!
//! The renderer reads the camera rig from a file. The file lives next to the
//! subject so the rig's relative sublayer path resolves, and it is removed
//! when the guard is dropped, whether rendering succeeded or not.

use cardgen_core::Result;
use cardgen_usd::{layer_to_string, Layer};
use log::debug;
use std::io::Write;
use std::path::Path;
use tempfile::{Builder, NamedTempFile};

/// A rig layer written to a temporary file
#[derive(Debug)]
pub struct RigFile {
    file: NamedTempFile,
}

impl RigFile {
    /// Write `layer` to a fresh `.usda` file in `directory`
    pub fn create(layer: &Layer, directory: &Path) -> Result<Self> {
        let mut file = Builder::new()
            .prefix("cardgen-rig-")
            .suffix(".usda")
            .tempfile_in(directory)?;
        file.write_all(layer_to_string(layer).as_bytes())?;
        file.flush()?;
        debug!("Wrote camera rig to {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now, reporting any failure
    pub fn close(self) -> Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        debug!("Removed camera rig {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardgen_usd::{parse_layer, PrimSpec, Specifier};

    fn layer() -> Layer {
        let mut layer = Layer::new("cameras.usda");
        layer.set_default_prim("CardGenerator");
        layer
            .prims
            .push(PrimSpec::new(Specifier::Def, None, "CardGenerator"));
        layer
    }

    #[test]
    fn test_rig_file_round_trip_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let rig = RigFile::create(&layer(), dir.path()).unwrap();
        let path = rig.path().to_path_buf();
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("usda"));

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed = parse_layer(&text, "cameras.usda").unwrap();
        assert_eq!(parsed.default_prim(), Some("CardGenerator"));

        rig.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_rig_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let rig = RigFile::create(&layer(), dir.path()).unwrap();
            rig.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
