//! The subject stage: the one layer cardgen edits
//!
//! A stage owns its root layer in memory and remembers how it was encoded
//! on disk so that saving writes the same encoding back.

use crate::bbox::world_bounds;
use crate::compose::{compose_scene, ComposedScene};
use crate::layer::{Layer, PrimSpec};
use crate::resolve::{AssetLocation, LayerConverter, LayerFormat, LayerLoader, LoadedLayer};
use crate::writer::write_layer;
use cardgen_core::{Bounds3d, Error, RenderPurpose, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Suffix of the wrapper layer created next to a usdz input
pub const WRAPPER_SUFFIX: &str = "_Cards.usda";

/// Check whether `path` names a usdz package, by extension or content
pub fn is_package_path(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("usdz"));
    by_extension || matches!(LayerFormat::of_file(path), Ok(LayerFormat::Package))
}

/// Path of the wrapper layer for a usdz input: `<dir>/<stem>_Cards.usda`
pub fn wrapper_path(usdz: &Path) -> PathBuf {
    let stem = usdz
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    usdz.with_file_name(format!("{}{}", stem, WRAPPER_SUFFIX))
}

/// An editable stage rooted at a single layer file
pub struct Stage {
    path: PathBuf,
    format: LayerFormat,
    layer: Layer,
    dirty: bool,
    converter: Arc<dyn LayerConverter>,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Stage {
    /// Open a text or binary layer for editing.
    ///
    /// Packages cannot be edited in place; wrap them with
    /// [`Stage::create_usdz_wrapper`] instead.
    pub fn open<P: AsRef<Path>>(path: P, converter: Arc<dyn LayerConverter>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format = LayerFormat::of_file(&path)?;
        if format == LayerFormat::Package {
            return Err(Error::UnsupportedFormat(format!(
                "{} is a usdz package and cannot be edited in place",
                path.display()
            )));
        }
        let loaded = LayerLoader::new(converter.as_ref()).load(&AssetLocation::File(path.clone()))?;
        info!("Opened {}", path.display());
        Ok(Self {
            path,
            format,
            layer: loaded.layer,
            dirty: false,
            converter,
        })
    }

    /// Create a text layer next to `usdz` that sublayers it.
    ///
    /// The wrapper copies the package root layer's metadata (except its
    /// sublayers) so the default prim and stage units carry over. It is
    /// written to disk immediately and again on every save.
    pub fn create_usdz_wrapper<P: AsRef<Path>>(
        usdz: P,
        converter: Arc<dyn LayerConverter>,
    ) -> Result<Self> {
        let usdz = usdz.as_ref();
        let package = LayerLoader::new(converter.as_ref()).load(&AssetLocation::File(usdz.to_path_buf()))?;
        let path = wrapper_path(usdz);

        let mut layer = Layer::new(&path.to_string_lossy());
        layer.metadata = package.layer.metadata.clone();
        layer.metadata.remove("subLayers");
        let file_name = usdz
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidData(format!("{} has no file name", usdz.display())))?;
        layer.set_sub_layers([format!("./{}", file_name)]);

        let mut stage = Self {
            path,
            format: LayerFormat::Text,
            layer,
            dirty: true,
            converter,
        };
        stage.save()?;
        info!(
            "Created wrapper {} for {}",
            stage.path.display(),
            usdz.display()
        );
        Ok(stage)
    }

    /// File the root layer is saved to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the root layer
    pub fn directory(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    pub fn format(&self) -> LayerFormat {
        self.format
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    /// Mutable access to the root layer; marks the stage dirty
    pub fn layer_mut(&mut self) -> &mut Layer {
        self.dirty = true;
        &mut self.layer
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Name of the stage's default prim
    pub fn default_prim(&self) -> Result<&str> {
        self.layer
            .default_prim()
            .ok_or_else(|| Error::MissingDefaultPrim(self.path.display().to_string()))
    }

    /// The root layer's spec for the default prim, created as an `over`
    /// when the prim is defined in a weaker layer. Marks the stage dirty.
    pub fn default_prim_spec_mut(&mut self) -> Result<&mut PrimSpec> {
        self.dirty = true;
        self.layer.default_prim_spec_mut()
    }

    /// Compose the stage with everything it reaches
    pub fn compose(&self) -> Result<ComposedScene> {
        let loader = LayerLoader::new(self.converter.as_ref());
        let root = LoadedLayer {
            location: AssetLocation::File(self.path.clone()),
            layer: self.layer.clone(),
        };
        compose_scene(&loader, &root)
    }

    /// World bounds of all prims whose purpose is in `purposes`
    pub fn world_bounds(&self, purposes: &[RenderPurpose]) -> Result<Bounds3d> {
        let scene = self.compose()?;
        let bounds = world_bounds(&scene, purposes);
        debug!(
            "World bounds of {}: {:?} .. {:?}",
            self.path.display(),
            bounds.min,
            bounds.max
        );
        Ok(bounds)
    }

    /// Write the root layer back in its original encoding
    pub fn save(&mut self) -> Result<()> {
        match self.format {
            LayerFormat::Binary => {
                let directory = self.directory();
                let text = tempfile::Builder::new()
                    .prefix(".cardgen-")
                    .suffix(".usda")
                    .tempfile_in(if directory.as_os_str().is_empty() {
                        Path::new(".")
                    } else {
                        directory.as_path()
                    })?;
                write_layer(&self.layer, text.path())?;
                self.converter.convert(text.path(), &self.path)?;
            }
            _ => write_layer(&self.layer, &self.path)?,
        }
        self.dirty = false;
        debug!("Saved {}", self.path.display());
        Ok(())
    }

    /// Save only when there are unsaved edits
    pub fn save_if_dirty(&mut self) -> Result<()> {
        if self.dirty {
            self.save()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::test_support::write_package;
    use crate::resolve::NoConverter;

    fn converter() -> Arc<dyn LayerConverter> {
        Arc::new(NoConverter)
    }

    #[test]
    fn test_wrapper_path() {
        assert_eq!(
            wrapper_path(Path::new("/assets/robot.usdz")),
            PathBuf::from("/assets/robot_Cards.usda")
        );
    }

    #[test]
    fn test_open_and_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ball.usda");
        std::fs::write(
            &path,
            "#usda 1.0\n(\n    defaultPrim = \"Ball\"\n)\n\ndef Sphere \"Ball\"\n{\n    double radius = 2\n}\n",
        )
        .unwrap();

        let stage = Stage::open(&path, converter()).unwrap();
        assert_eq!(stage.default_prim().unwrap(), "Ball");
        assert!(!stage.is_dirty());
        let bounds = stage.world_bounds(&[RenderPurpose::Default]).unwrap();
        assert_eq!(bounds.min.x, -2.0);
        assert_eq!(bounds.max.z, 2.0);
    }

    #[test]
    fn test_open_package_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thing.usdz");
        write_package(&path, &[("thing.usda", "#usda 1.0\n")]);
        assert!(is_package_path(&path));
        assert!(matches!(
            Stage::open(&path, converter()),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_usdz_wrapper_sublayers_package() {
        let dir = tempfile::tempdir().unwrap();
        let usdz = dir.path().join("thing.usdz");
        write_package(
            &usdz,
            &[(
                "thing.usda",
                "#usda 1.0\n(\n    defaultPrim = \"Thing\"\n    metersPerUnit = 0.01\n    subLayers = [@./inner.usda@]\n)\n\ndef Cube \"Thing\"\n{\n}\n",
            )],
        );

        let mut stage = Stage::create_usdz_wrapper(&usdz, converter()).unwrap();
        assert_eq!(stage.path(), dir.path().join("thing_Cards.usda"));
        assert!(stage.path().exists());
        assert_eq!(stage.layer().sub_layers(), vec!["./thing.usdz"]);
        assert_eq!(stage.default_prim().unwrap(), "Thing");
        assert!(!stage.is_dirty());

        let bounds = stage.world_bounds(&[RenderPurpose::Default]).unwrap();
        assert_eq!(bounds.max.x, 1.0);

        // edits land in an over on the wrapper
        stage.default_prim_spec_mut().unwrap();
        stage.save().unwrap();
        let text = std::fs::read_to_string(stage.path()).unwrap();
        assert!(text.contains("over \"Thing\""));
        assert!(text.contains("metersPerUnit = 0.01"));
    }
}
