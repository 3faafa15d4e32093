//! Asset locations and layer loading
//!
//! Layers live either on disk or inside a usdz package. Text layers are
//! parsed directly; crate (binary) layers go through a [`LayerConverter`]
//! that turns them into USDA first.

use crate::layer::Layer;
use crate::package::Package;
use crate::parser::parse_layer;
use cardgen_core::{Error, Result};
use log::debug;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

const USDA_MAGIC: &[u8] = b"#usda";
const USDC_MAGIC: &[u8] = b"PXR-USDC";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// On-disk encoding of a layer, detected from its leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerFormat {
    Text,
    Binary,
    Package,
}

impl LayerFormat {
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(USDA_MAGIC) {
            Some(LayerFormat::Text)
        } else if bytes.starts_with(USDC_MAGIC) {
            Some(LayerFormat::Binary)
        } else if bytes.starts_with(ZIP_MAGIC) {
            Some(LayerFormat::Package)
        } else {
            None
        }
    }

    /// Detect the format of a file from its first bytes
    pub fn of_file(path: &Path) -> Result<Self> {
        let mut head = Vec::with_capacity(USDC_MAGIC.len());
        std::fs::File::open(path)?
            .take(USDC_MAGIC.len() as u64)
            .read_to_end(&mut head)?;
        Self::detect(&head).ok_or_else(|| {
            Error::UnsupportedFormat(format!("{} is not a USD layer", path.display()))
        })
    }
}

/// Converts a layer between USD encodings, choosing formats by extension
pub trait LayerConverter: Send + Sync {
    fn convert(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Converter for pipelines that only ever see text layers
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConverter;

impl LayerConverter for NoConverter {
    fn convert(&self, input: &Path, _output: &Path) -> Result<()> {
        Err(Error::UnsupportedFormat(format!(
            "{} is a binary layer and no converter is configured",
            input.display()
        )))
    }
}

/// Where a layer lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetLocation {
    File(PathBuf),
    PackageEntry { package: PathBuf, entry: String },
}

impl AssetLocation {
    /// Resolve an authored asset path relative to this location.
    ///
    /// `pkg.usdz[inner/layer.usda]` addresses an entry of a package.
    pub fn resolve(&self, asset: &str) -> AssetLocation {
        if let Some((outer, inner)) = split_package_path(asset) {
            let package = match self.resolve(outer) {
                AssetLocation::File(path) => path,
                AssetLocation::PackageEntry { package, .. } => package,
            };
            return AssetLocation::PackageEntry {
                package,
                entry: normalize_entry("", inner),
            };
        }
        match self {
            AssetLocation::File(path) => {
                let asset_path = Path::new(asset);
                if asset_path.is_absolute() {
                    AssetLocation::File(normalize_path(asset_path))
                } else {
                    let base = path.parent().unwrap_or_else(|| Path::new(""));
                    AssetLocation::File(normalize_path(&base.join(asset_path)))
                }
            }
            AssetLocation::PackageEntry { package, entry } => {
                let base = entry.rsplit_once('/').map_or("", |(dir, _)| dir);
                AssetLocation::PackageEntry {
                    package: package.clone(),
                    entry: normalize_entry(base, asset),
                }
            }
        }
    }

    /// The directory assets next to this location resolve against
    pub fn directory(&self) -> PathBuf {
        let path = match self {
            AssetLocation::File(path) => path,
            AssetLocation::PackageEntry { package, .. } => package,
        };
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

impl fmt::Display for AssetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetLocation::File(path) => write!(f, "{}", path.display()),
            AssetLocation::PackageEntry { package, entry } => {
                write!(f, "{}[{}]", package.display(), entry)
            }
        }
    }
}

fn split_package_path(asset: &str) -> Option<(&str, &str)> {
    let inner = asset.strip_suffix(']')?;
    let open = inner.find('[')?;
    Some((&inner[..open], &inner[open + 1..]))
}

/// Lexically normalize `.` and `..` components
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn normalize_entry(base: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = if relative.starts_with('/') {
        Vec::new()
    } else {
        base.split('/').filter(|p| !p.is_empty()).collect()
    };
    for part in relative.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// A layer together with the location it was read from
#[derive(Debug, Clone)]
pub struct LoadedLayer {
    pub location: AssetLocation,
    pub layer: Layer,
}

/// Reads layers from disk or packages, converting binary layers on the way
pub struct LayerLoader<'a> {
    converter: &'a dyn LayerConverter,
}

impl<'a> LayerLoader<'a> {
    pub fn new(converter: &'a dyn LayerConverter) -> Self {
        Self { converter }
    }

    pub fn converter(&self) -> &'a dyn LayerConverter {
        self.converter
    }

    /// Load the layer at `location`.
    ///
    /// A package file loads as its root layer, so the returned location can
    /// differ from the requested one.
    pub fn load(&self, location: &AssetLocation) -> Result<LoadedLayer> {
        match location {
            AssetLocation::File(path) => {
                let bytes = std::fs::read(path)?;
                match LayerFormat::detect(&bytes) {
                    Some(LayerFormat::Text) => self.parse_bytes(location, &bytes),
                    Some(LayerFormat::Binary) => self.parse_binary_file(location, path),
                    Some(LayerFormat::Package) => {
                        let package = Package::open(path)?;
                        let entry = AssetLocation::PackageEntry {
                            package: path.clone(),
                            entry: package.root_layer()?.to_string(),
                        };
                        self.load(&entry)
                    }
                    None => Err(Error::UnsupportedFormat(format!(
                        "{} is not a USD layer",
                        path.display()
                    ))),
                }
            }
            AssetLocation::PackageEntry { package, entry } => {
                let bytes = Package::open(package)?.read(entry)?;
                match LayerFormat::detect(&bytes) {
                    Some(LayerFormat::Text) => self.parse_bytes(location, &bytes),
                    Some(LayerFormat::Binary) => {
                        let mut scratch = tempfile::Builder::new()
                            .prefix("cardgen-")
                            .suffix(".usdc")
                            .tempfile()?;
                        scratch.write_all(&bytes)?;
                        scratch.flush()?;
                        self.parse_binary_file(location, scratch.path())
                    }
                    _ => Err(Error::UnsupportedFormat(format!(
                        "{} is not a USD layer",
                        location
                    ))),
                }
            }
        }
    }

    fn parse_bytes(&self, location: &AssetLocation, bytes: &[u8]) -> Result<LoadedLayer> {
        let source = std::str::from_utf8(bytes)
            .map_err(|e| Error::InvalidData(format!("{}: {}", location, e)))?;
        Ok(LoadedLayer {
            location: location.clone(),
            layer: parse_layer(source, &location.to_string())?,
        })
    }

    fn parse_binary_file(&self, location: &AssetLocation, path: &Path) -> Result<LoadedLayer> {
        let text = tempfile::Builder::new()
            .prefix("cardgen-")
            .suffix(".usda")
            .tempfile()?;
        debug!("Converting binary layer {} to text", location);
        self.converter.convert(path, text.path())?;
        let bytes = std::fs::read(text.path())?;
        self.parse_bytes(location, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::test_support::write_package;

    #[test]
    fn test_resolve_relative_file() {
        let base = AssetLocation::File(PathBuf::from("/assets/robot/robot.usda"));
        assert_eq!(
            base.resolve("./parts/../arm.usda"),
            AssetLocation::File(PathBuf::from("/assets/robot/arm.usda"))
        );
        assert_eq!(
            base.resolve("../shared/bolt.usda"),
            AssetLocation::File(PathBuf::from("/assets/shared/bolt.usda"))
        );
        assert_eq!(
            base.resolve("/abs/x.usda"),
            AssetLocation::File(PathBuf::from("/abs/x.usda"))
        );
    }

    #[test]
    fn test_resolve_inside_package() {
        let base = AssetLocation::PackageEntry {
            package: PathBuf::from("/a/robot.usdz"),
            entry: "robot/root.usda".to_string(),
        };
        assert_eq!(
            base.resolve("./parts/arm.usda"),
            AssetLocation::PackageEntry {
                package: PathBuf::from("/a/robot.usdz"),
                entry: "robot/parts/arm.usda".to_string(),
            }
        );
    }

    #[test]
    fn test_resolve_package_path_syntax() {
        let base = AssetLocation::File(PathBuf::from("/a/wrapper.usda"));
        assert_eq!(
            base.resolve("./robot.usdz[root.usda]"),
            AssetLocation::PackageEntry {
                package: PathBuf::from("/a/robot.usdz"),
                entry: "root.usda".to_string(),
            }
        );
        assert_eq!(
            base.resolve("./robot.usdz[root.usda]").to_string(),
            "/a/robot.usdz[root.usda]"
        );
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(LayerFormat::detect(b"#usda 1.0\n"), Some(LayerFormat::Text));
        assert_eq!(LayerFormat::detect(b"PXR-USDC\0\0"), Some(LayerFormat::Binary));
        assert_eq!(LayerFormat::detect(b"PK\x03\x04rest"), Some(LayerFormat::Package));
        assert_eq!(LayerFormat::detect(b"hello"), None);
    }

    #[test]
    fn test_load_package_root_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thing.usdz");
        write_package(
            &path,
            &[("thing.usda", "#usda 1.0\n(\n    defaultPrim = \"Thing\"\n)\n")],
        );
        let loader = LayerLoader::new(&NoConverter);
        let loaded = loader.load(&AssetLocation::File(path.clone())).unwrap();
        assert_eq!(
            loaded.location,
            AssetLocation::PackageEntry {
                package: path,
                entry: "thing.usda".to_string(),
            }
        );
        assert_eq!(loaded.layer.default_prim(), Some("Thing"));
    }

    #[test]
    fn test_binary_layer_without_converter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.usdc");
        std::fs::write(&path, b"PXR-USDC\0\0\0\0").unwrap();
        let loader = LayerLoader::new(&NoConverter);
        assert!(matches!(
            loader.load(&AssetLocation::File(path)),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    struct CopyConverter(&'static str);

    impl LayerConverter for CopyConverter {
        fn convert(&self, _input: &Path, output: &Path) -> Result<()> {
            std::fs::write(output, self.0)?;
            Ok(())
        }
    }

    #[test]
    fn test_binary_layer_goes_through_converter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.usd");
        std::fs::write(&path, b"PXR-USDC\0\0\0\0").unwrap();
        let converter = CopyConverter("#usda 1.0\n(\n    upAxis = \"Z\"\n)\n");
        let loader = LayerLoader::new(&converter);
        let loaded = loader.load(&AssetLocation::File(path)).unwrap();
        assert_eq!(
            loaded.layer.metadata.get("upAxis").and_then(|v| v.as_str()),
            Some("Z")
        );
    }
}
