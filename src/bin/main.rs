use clap::Parser;
use ramses_plot::config::ConfigFile;
use ramses_plot::{driver, Axis, Preset, RamsesVisualizer};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Slice and projection plots of every RAMSES output
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding the output_* directories
    #[arg(long)]
    root: Option<PathBuf>,

    /// Directory receiving the images
    #[arg(long)]
    out: Option<PathBuf>,

    /// Field table and subsampling: full or hydro
    #[arg(long)]
    preset: Option<Preset>,

    /// Path to config TOML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Plot every N-th output
    #[arg(long)]
    stride: Option<usize>,

    /// Line of sight
    #[arg(long)]
    axis: Option<Axis>,

    /// Buffer resolution in pixels per side
    #[arg(long)]
    resolution: Option<usize>,

    /// Write the raw buffer of every plot next to its image
    #[arg(long, default_value_t = false)]
    dump_buffers: bool,

    /// Write a CSV listing of the saved plots
    #[arg(long)]
    manifest: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let file = match &args.config {
        Some(path) => ConfigFile::from_file(path)?,
        None => ConfigFile::default(),
    };
    let mut config = file.resolve(args.preset)?;
    if let Some(root) = args.root {
        config.root = root;
    }
    if let Some(out) = args.out {
        config.out_dir = out;
    }
    if let Some(stride) = args.stride {
        config.stride = stride;
    }
    if let Some(axis) = args.axis {
        config.axis = axis;
    }
    if let Some(resolution) = args.resolution {
        config.resolution = resolution;
    }
    if args.dump_buffers {
        config.dump_buffers = true;
    }
    if args.manifest.is_some() {
        config.manifest = args.manifest;
    }
    config.validate()?;

    let now = Instant::now();
    let mut visualizer = RamsesVisualizer::new(&config);
    let saved = driver::run(&mut visualizer, &config)?;
    println!("{} plots in {}s", saved.len(), now.elapsed().as_secs());

    Ok(())
}
