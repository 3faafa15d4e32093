//! Parallel card snapshots with `usdrecord`
//!
//! One `usdrecord` process runs per card on a bounded rayon pool. The call
//! blocks until every process has exited, and any failure fails the whole
//! run: there are never five of six cards.

use crate::backend::RendererBackend;
use crate::command::{CommandRunner, ToolCommand};
use crate::rig_file::RigFile;
use cardgen_core::{CardImage, CardName, Error, RenderPurpose, Result};
use cardgen_usd::Layer;
use log::{debug, info};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory, next to the subject, that receives the snapshots
pub const RENDERS_DIR: &str = "renders";

/// Snapshot rendering settings
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// `usdrecord` executable
    pub program: String,
    /// Render delegate
    pub renderer: RendererBackend,
    /// Output image width in pixels
    pub image_width: u32,
    /// Output image extension, without the dot
    pub extension: String,
    /// Purposes included in the snapshots
    pub purposes: Vec<RenderPurpose>,
    /// Maximum number of concurrent render processes
    pub jobs: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            program: "usdrecord".to_string(),
            renderer: RendererBackend::default(),
            image_width: 2048,
            extension: "png".to_string(),
            purposes: vec![RenderPurpose::Default],
            jobs: num_cpus::get(),
        }
    }
}

impl SnapshotConfig {
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_renderer(mut self, renderer: RendererBackend) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_image_width(mut self, image_width: u32) -> Self {
        self.image_width = image_width;
        self
    }

    /// Set the image extension; a leading dot is ignored
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn with_purposes(mut self, purposes: Vec<RenderPurpose>) -> Self {
        self.purposes = purposes;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.image_width == 0 {
            return Err(Error::InvalidData("image width must be positive".to_string()));
        }
        if self.extension.is_empty() || self.extension.contains(['/', '\\']) {
            return Err(Error::InvalidData(format!(
                "invalid image extension '{}'",
                self.extension
            )));
        }
        Ok(())
    }

    fn purpose_list(&self) -> String {
        if self.purposes.is_empty() {
            return RenderPurpose::Default.as_str().to_string();
        }
        self.purposes
            .iter()
            .map(|purpose| purpose.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Path of the image `usdrecord` produces for `card` in `renders`
pub fn snapshot_path(renders: &Path, card: CardName, extension: &str) -> PathBuf {
    renders.join(format!("{}.0.{}", card, extension))
}

/// Renders the six card snapshots
pub struct SnapshotRenderer {
    runner: Arc<dyn CommandRunner>,
    config: SnapshotConfig,
}

impl SnapshotRenderer {
    pub fn new(runner: Arc<dyn CommandRunner>, config: SnapshotConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// The `usdrecord` invocation for one card
    pub fn command(&self, card: CardName, rig: &Path, renders: &Path) -> ToolCommand {
        let pattern = renders.join(format!("{}.#.{}", card, self.config.extension));
        ToolCommand::new(self.config.program.as_str())
            .args(["--frames", "0:0", "--camera", card.as_str()])
            .arg("--imageWidth")
            .arg(self.config.image_width.to_string())
            .arg("--renderer")
            .arg(self.config.renderer.as_str())
            .arg("--purposes")
            .arg(self.config.purpose_list())
            .arg(rig)
            .arg(pattern)
    }

    /// Write `rig` next to the subject in `directory`, render every card
    /// through it and return the images in card order.
    ///
    /// The rig file is removed afterwards on success and failure alike.
    /// Images already produced by other cards stay on disk after a failure.
    pub fn render(&self, rig: &Layer, directory: &Path) -> Result<Vec<CardImage>> {
        self.config.validate()?;
        let renders = directory.join(RENDERS_DIR);
        std::fs::create_dir_all(&renders)?;

        let rig_file = RigFile::create(rig, directory)?;
        let jobs = self.config.jobs.clamp(1, CardName::ALL.len());
        info!(
            "Rendering {} cards with {} ({} at {}px, {} jobs)",
            CardName::ALL.len(),
            self.config.program,
            self.config.renderer,
            self.config.image_width,
            jobs
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|index| format!("cardgen-render-{}", index))
            .build()
            .map_err(|e| Error::InvalidData(format!("Failed to create thread pool: {}", e)))?;

        let images = pool.install(|| {
            CardName::ALL
                .par_iter()
                .map(|&card| self.render_card(card, rig_file.path(), &renders))
                .collect::<Result<Vec<_>>>()
        })?;

        rig_file.close()?;
        Ok(images)
    }

    fn render_card(&self, card: CardName, rig: &Path, renders: &Path) -> Result<CardImage> {
        let command = self.command(card, rig, renders);
        self.runner.run(&command)?;

        let path = snapshot_path(renders, card, &self.config.extension);
        if !path.is_file() {
            return Err(Error::MissingImage(path));
        }
        debug!("Rendered {} to {}", card, path.display());
        Ok(CardImage { card, path })
    }
}
