//! Read access to usdz packages
//!
//! A usdz package is an uncompressed zip archive whose first USD layer is
//! the package's root layer.

use cardgen_core::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

const LAYER_EXTENSIONS: [&str; 3] = ["usda", "usdc", "usd"];

/// Upper bound on the buffer reserved up front for an entry
const MAX_RESERVE: u64 = 64 << 20;

/// Buffer to reserve for an entry whose header declares `declared` bytes.
/// The header is not trusted beyond `MAX_RESERVE`; reading grows past it.
fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_RESERVE)).unwrap_or(0)
}

fn archive_error(path: &Path, error: zip::result::ZipError) -> Error {
    Error::Archive(format!("{}: {}", path.display(), error))
}

/// An opened usdz package
#[derive(Debug)]
pub struct Package {
    path: PathBuf,
    entries: Vec<String>,
}

impl Package {
    /// Open a package and list its entries
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut archive =
            ZipArchive::new(File::open(&path)?).map_err(|e| archive_error(&path, e))?;
        // the root layer is defined by archive order, so list by index
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive
                .by_index(index)
                .map_err(|e| archive_error(&path, e))?;
            entries.push(file.name().to_string());
        }
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry names in archive order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.iter().any(|e| e == entry)
    }

    /// The package's root layer: its first USD layer entry
    pub fn root_layer(&self) -> Result<&str> {
        self.entries
            .iter()
            .find(|entry| {
                Path::new(entry.as_str())
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map_or(false, |ext| LAYER_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .map(String::as_str)
            .ok_or_else(|| {
                Error::Archive(format!("{} contains no USD layer", self.path.display()))
            })
    }

    /// Read the bytes of one entry
    pub fn read(&self, entry: &str) -> Result<Vec<u8>> {
        let mut archive =
            ZipArchive::new(File::open(&self.path)?).map_err(|e| archive_error(&self.path, e))?;
        let mut file = archive
            .by_name(entry)
            .map_err(|e| archive_error(&self.path, e))?;
        let mut bytes = Vec::with_capacity(initial_capacity(file.size()));
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
