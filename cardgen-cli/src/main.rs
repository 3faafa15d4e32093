use anyhow::{Context, Result};
use cardgen_cli::{Pipeline, PipelineConfig, ToolPrograms};
use cardgen_core::RenderPurpose;
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;
use std::path::PathBuf;

/// Generate billboard cards for a USD asset and associate them with it.
#[derive(Parser, Debug)]
#[command(name = "generate-cards", version, about)]
struct Cli {
    /// The USD file to add cards to. A usdz input is wrapped by a new layer
    /// called <input>_Cards.usda
    usd_file: PathBuf,

    /// Path of a dome light HDR image to light the snapshots with
    #[arg(long)]
    dome_light: Option<PathBuf>,

    /// Package the results as a new usdz called <input>_Cards.usdz
    #[arg(long)]
    create_usdz_result: bool,

    /// Image file extension (exr, png, ...). exr needs a USD build with OpenEXR
    #[arg(long, default_value = "png")]
    output_extension: String,

    /// Print the steps as they happen
    #[arg(short, long)]
    verbose: bool,

    /// Save the images as the cards of the given USD file
    #[arg(long)]
    apply_cards: bool,

    /// Comma separated render purposes to include: default, render, proxy, guide
    #[arg(long, default_value = "default")]
    render_purposes: String,

    /// Width of the generated images in pixels
    #[arg(long, default_value_t = 2048)]
    image_width: u32,

    /// Render delegate passed to usdrecord; Metal on macOS and GL elsewhere by default
    #[arg(long)]
    renderer: Option<String>,

    /// Maximum number of concurrent renders [default: number of CPUs]
    #[arg(short, long)]
    jobs: Option<usize>,

    /// usdrecord executable
    #[arg(long, env = "CARDGEN_USDRECORD", default_value = "usdrecord")]
    usdrecord: String,

    /// usdzip executable
    #[arg(long, env = "CARDGEN_USDZIP", default_value = "usdzip")]
    usdzip: String,

    /// usdcat executable, used for binary layers
    #[arg(long, env = "CARDGEN_USDCAT", default_value = "usdcat")]
    usdcat: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let purposes = RenderPurpose::parse_list(&cli.render_purposes)
        .context("Invalid --render-purposes")?;

    let mut config = PipelineConfig::new(&cli.usd_file)
        .with_extension(cli.output_extension)
        .with_apply_cards(cli.apply_cards)
        .with_purposes(purposes)
        .with_image_width(cli.image_width)
        .with_create_usdz(cli.create_usdz_result)
        .with_tools(ToolPrograms {
            usdrecord: cli.usdrecord,
            usdzip: cli.usdzip,
            usdcat: cli.usdcat,
        });
    if let Some(dome_light) = cli.dome_light {
        config = config.with_dome_light(dome_light);
    }
    if let Some(renderer) = cli.renderer {
        config = config.with_renderer(renderer);
    }
    if let Some(jobs) = cli.jobs {
        config = config.with_jobs(jobs);
    }

    let output = Pipeline::new(config)
        .run()
        .with_context(|| format!("Failed to generate cards for {}", cli.usd_file.display()))?;

    for image in &output.images {
        info!("{}: {}", image.card, image.path.display());
    }
    if let Some(package) = &output.package {
        println!("{}", package.display());
    }
    Ok(())
}
