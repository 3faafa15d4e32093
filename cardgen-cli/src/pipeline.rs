//! The card generation pipeline
//!
//! open or wrap the subject -> apply card defaults -> frame its bounds ->
//! render six snapshots -> link them -> save -> package.

use cardgen_core::{build_camera_rig, CardImage, Error, RenderPurpose, Result};
use cardgen_render::{
    ArchivePackager, CommandRunner, PackageContents, ProcessRunner, RendererBackend,
    SnapshotConfig, SnapshotRenderer, UsdcatConverter,
};
use cardgen_usd::{
    apply_card_defaults, build_rig_layer, is_package_path, link_card_textures,
    relative_asset_path, LayerConverter, Stage,
};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// External program names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPrograms {
    pub usdrecord: String,
    pub usdzip: String,
    pub usdcat: String,
}

impl Default for ToolPrograms {
    fn default() -> Self {
        Self {
            usdrecord: "usdrecord".to_string(),
            usdzip: "usdzip".to_string(),
            usdcat: "usdcat".to_string(),
        }
    }
}

/// Configuration for one card generation run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Asset to generate cards for
    pub input: PathBuf,
    /// Optional latlong texture for a dome light in the rig
    pub dome_light: Option<PathBuf>,
    /// Image extension, without the dot
    pub extension: String,
    /// Author the card defaults and textures onto the asset
    pub apply_cards: bool,
    /// Purposes framed and rendered
    pub purposes: Vec<RenderPurpose>,
    /// Snapshot width in pixels
    pub image_width: u32,
    /// Package the result as `<stem>_Cards.usdz`
    pub create_usdz: bool,
    /// Render delegate; the platform default when unset
    pub renderer: Option<String>,
    /// Maximum concurrent render processes
    pub jobs: usize,
    pub tools: ToolPrograms,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            dome_light: None,
            extension: "png".to_string(),
            apply_cards: false,
            purposes: vec![RenderPurpose::Default],
            image_width: 2048,
            create_usdz: false,
            renderer: None,
            jobs: num_cpus::get(),
            tools: ToolPrograms::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn with_dome_light(mut self, dome_light: impl Into<PathBuf>) -> Self {
        self.dome_light = Some(dome_light.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_apply_cards(mut self, apply_cards: bool) -> Self {
        self.apply_cards = apply_cards;
        self
    }

    pub fn with_purposes(mut self, purposes: Vec<RenderPurpose>) -> Self {
        self.purposes = purposes;
        self
    }

    pub fn with_image_width(mut self, image_width: u32) -> Self {
        self.image_width = image_width;
        self
    }

    pub fn with_create_usdz(mut self, create_usdz: bool) -> Self {
        self.create_usdz = create_usdz;
        self
    }

    pub fn with_renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = Some(renderer.into());
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_tools(mut self, tools: ToolPrograms) -> Self {
        self.tools = tools;
        self
    }
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The layer that was edited: the input, or its wrapper for usdz input
    pub subject: PathBuf,
    /// Snapshots in card order
    pub images: Vec<CardImage>,
    /// The packaged result, when requested
    pub package: Option<PathBuf>,
}

/// Runs card generation for one asset
pub struct Pipeline {
    config: PipelineConfig,
    runner: Arc<dyn CommandRunner>,
}

impl Pipeline {
    /// A pipeline that runs the real external tools
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner))
    }

    pub fn with_runner(config: PipelineConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<PipelineOutput> {
        let config = &self.config;
        let input = absolute(&config.input)?;
        let converter: Arc<dyn LayerConverter> = Arc::new(
            UsdcatConverter::new(self.runner.clone()).with_program(config.tools.usdcat.as_str()),
        );

        let wrapped = is_package_path(&input);
        let mut stage = if wrapped {
            info!("Wrapping usdz package {}", input.display());
            Stage::create_usdz_wrapper(&input, converter)?
        } else {
            Stage::open(&input, converter)?
        };
        let directory = stage.directory();

        if config.apply_cards {
            apply_card_defaults(&mut stage)?;
        }
        stage.save_if_dirty()?;

        let bounds = stage.world_bounds(&config.purposes)?;
        let cameras = build_camera_rig(&bounds)?;
        let subject_asset = stage
            .path()
            .file_name()
            .map(|name| format!("./{}", name.to_string_lossy()))
            .ok_or_else(|| {
                Error::InvalidData(format!("{} has no file name", stage.path().display()))
            })?;
        let dome_light = match &config.dome_light {
            Some(texture) => Some(self.dome_light_asset(texture, &directory)?),
            None => None,
        };
        let rig = build_rig_layer(&subject_asset, &cameras, dome_light.as_deref());

        let snapshots = SnapshotConfig::default()
            .with_program(config.tools.usdrecord.as_str())
            .with_renderer(RendererBackend::select(config.renderer.as_deref()))
            .with_image_width(config.image_width)
            .with_extension(config.extension.as_str())
            .with_purposes(config.purposes.clone())
            .with_jobs(config.jobs);
        let images = SnapshotRenderer::new(self.runner.clone(), snapshots).render(&rig, &directory)?;

        if config.apply_cards {
            link_card_textures(&mut stage, &images)?;
        }
        stage.save_if_dirty()?;

        let package = if config.create_usdz {
            let contents = PackageContents {
                root_layer: stage.path().to_path_buf(),
                original_package: wrapped.then(|| input.clone()),
                images: images.clone(),
            };
            let packager = ArchivePackager::new(self.runner.clone())
                .with_program(config.tools.usdzip.as_str());
            Some(packager.package(&input, &contents)?)
        } else {
            None
        };

        info!("Generated cards for {}", input.display());
        Ok(PipelineOutput {
            subject: stage.path().to_path_buf(),
            images,
            package,
        })
    }

    fn dome_light_asset(&self, texture: &Path, directory: &Path) -> Result<String> {
        let texture = absolute(texture)?;
        if !texture.is_file() {
            warn!("Dome light texture {} does not exist", texture.display());
        }
        Ok(relative_asset_path(&texture, directory))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
