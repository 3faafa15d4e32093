//! usdz packaging with `usdzip`

use crate::command::{CommandRunner, ToolCommand};
use cardgen_core::{CardImage, Error, Result};
use cardgen_usd::relative_asset_path;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Suffix of the packaged result, appended to the input's file stem
pub const PACKAGE_SUFFIX: &str = "_Cards.usdz";

/// What goes into the package
#[derive(Debug, Clone)]
pub struct PackageContents {
    /// Layer that becomes the package root: the subject, or the wrapper
    /// layer for usdz input
    pub root_layer: PathBuf,
    /// The original usdz when the subject was wrapped
    pub original_package: Option<PathBuf>,
    pub images: Vec<CardImage>,
}

impl PackageContents {
    /// Package members relative to `directory`, root layer first
    pub fn members(&self, directory: &Path) -> Vec<String> {
        std::iter::once(self.root_layer.as_path())
            .chain(self.original_package.as_deref())
            .chain(self.images.iter().map(|image| image.path.as_path()))
            .map(|path| relative_asset_path(path, directory))
            .collect()
    }
}

/// Path of the package produced for `input`: `<stem>_Cards.usdz` beside it
pub fn package_path(input: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .ok_or_else(|| Error::InvalidData(format!("{} has no file name", input.display())))?;
    let mut name = stem.to_os_string();
    name.push(PACKAGE_SUFFIX);
    Ok(input.with_file_name(name))
}

/// Runs `usdzip` over the subject and its card images
pub struct ArchivePackager {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl ArchivePackager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "usdzip".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// The `usdzip` invocation packaging `contents` for `input`
    pub fn command(&self, input: &Path, contents: &PackageContents) -> Result<ToolCommand> {
        let output = package_path(input)?;
        let directory = output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut command = ToolCommand::new(self.program.as_str())
            .arg("-r")
            .arg(relative_asset_path(&output, &directory))
            .args(contents.members(&directory));
        if !directory.as_os_str().is_empty() {
            command = command.current_dir(directory);
        }
        Ok(command)
    }

    /// Package `contents` next to `input` and return the package path
    pub fn package(&self, input: &Path, contents: &PackageContents) -> Result<PathBuf> {
        let command = self.command(input, contents)?;
        self.runner.run(&command)?;
        let output = package_path(input)?;
        info!("Packaged {}", output.display());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardgen_core::CardName;

    fn images(dir: &Path) -> Vec<CardImage> {
        CardName::ALL
            .iter()
            .map(|&card| CardImage {
                card,
                path: dir.join("renders").join(format!("{}.0.png", card)),
            })
            .collect()
    }

    #[test]
    fn test_package_path() {
        assert_eq!(
            package_path(Path::new("/assets/chair.usda")).unwrap(),
            PathBuf::from("/assets/chair_Cards.usdz")
        );
        assert_eq!(
            package_path(Path::new("/assets/robot.usdz")).unwrap(),
            PathBuf::from("/assets/robot_Cards.usdz")
        );
    }

    #[test]
    fn test_members_for_plain_subject() {
        let dir = Path::new("/assets");
        let contents = PackageContents {
            root_layer: dir.join("chair.usda"),
            original_package: None,
            images: images(dir),
        };
        let members = contents.members(dir);
        assert_eq!(members.len(), 7);
        assert_eq!(members[0], "chair.usda");
        assert_eq!(members[1], "renders/XPos.0.png");
        assert_eq!(members[6], "renders/ZNeg.0.png");
    }

    #[test]
    fn test_members_for_wrapped_package() {
        let dir = Path::new("/assets");
        let contents = PackageContents {
            root_layer: dir.join("robot_Cards.usda"),
            original_package: Some(dir.join("robot.usdz")),
            images: images(dir),
        };
        let members = contents.members(dir);
        assert_eq!(members.len(), 8);
        assert_eq!(&members[..2], ["robot_Cards.usda", "robot.usdz"]);
    }
}
