use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use serde::Serialize;

use h5_volume::launcher::{self, HostCommand};
use h5_volume::pipeline::{self, ConvertOptions, ViewPlan};
use h5_volume::selector;
use h5_volume::writer::TempVolumes;
use h5_volume::{
    Classification, ContainerEntry, Hdf5Container, PickerConfig, VolumeLoader, VolumeLoaderError,
};

const EXIT_USAGE: u8 = 2;
const EXIT_NO_CANDIDATES: u8 = 3;

#[derive(Parser)]
#[command(name = "h5-volume")]
#[command(about = "Pick 3D volumes out of HDF5 containers and convert or view them")]
#[command(version)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every entry and how it is classified
    List {
        #[command(flatten)]
        select: SelectArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Convert one randomly picked volume to NIfTI
    Convert {
        #[command(flatten)]
        select: SelectArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Convert every matching volume to NIfTI
    ConvertAll {
        #[command(flatten)]
        select: SelectArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show one randomly picked volume in the viewer
    View {
        #[command(flatten)]
        select: SelectArgs,

        /// Viewer executable
        #[arg(long)]
        viewer: Option<PathBuf>,

        /// Viewer script for masks
        #[arg(long, default_value = "view_seg.py")]
        view_seg: PathBuf,

        /// Viewer script for images
        #[arg(long, default_value = "view_img.py")]
        view_img: PathBuf,

        /// Load the companion image of a picked mask as background
        #[arg(long)]
        bg: bool,
    },

    /// Open exported meshes in the mesh editor
    Mesh {
        /// Mesh editor executable
        #[arg(long, default_value = "blender")]
        editor: PathBuf,

        /// Import script run by the editor
        #[arg(long)]
        script: PathBuf,

        /// Mesh files to import
        #[arg(required = true)]
        meshes: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct SelectArgs {
    /// Path to the .h5/.hdf5 container
    container: PathBuf,

    /// JSON configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Which kind of dataset to select: any, image, mask
    #[arg(long)]
    kind: Option<String>,

    /// Seed for reproducible selection
    #[arg(long)]
    seed: Option<u64>,

    /// Mask conversion: auto, threshold, round
    #[arg(long)]
    mask_mode: Option<String>,

    /// Threshold for binarizing float masks
    #[arg(long)]
    threshold: Option<f64>,

    /// Classification: dtype-heuristic, strict-name-pattern
    #[arg(long)]
    strategy: Option<String>,
}

#[derive(Args)]
struct OutputArgs {
    /// Output directory
    #[arg(long)]
    out: PathBuf,

    /// Select only, do not write files
    #[arg(long)]
    dry_run: bool,

    /// Also write a PNG of the centre axial slice
    #[arg(long)]
    preview: bool,
}

impl SelectArgs {
    /// Resolves the configuration before the container is touched.
    fn config(&self) -> Result<PickerConfig, VolumeLoaderError> {
        let mut config = match &self.config {
            Some(path) => PickerConfig::from_json_file(path)?,
            None => PickerConfig::default(),
        };
        if let Some(kind) = &self.kind {
            config.kind_filter = kind.parse()?;
        }
        if let Some(mode) = &self.mask_mode {
            config.mask_policy = mode.parse()?;
        }
        if let Some(strategy) = &self.strategy {
            config.strategy = strategy.parse()?;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }

    fn open(&self) -> Result<Hdf5Container> {
        if !self.container.exists() {
            return Err(VolumeLoaderError::ContainerOpen {
                path: self.container.clone(),
                reason: "file not found".into(),
            }
            .into());
        }
        Ok(Hdf5Container::open(&self.container)?)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(failure_code(&e))
        }
    }
}

/// Bad configuration and a container path that does not exist are usage
/// errors; everything else is a plain failure.
fn failure_code(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<VolumeLoaderError>() {
        Some(VolumeLoaderError::Config(_)) => EXIT_USAGE,
        Some(VolumeLoaderError::ContainerOpen { path, .. }) if !path.exists() => EXIT_USAGE,
        _ => 1,
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::List { select, json } => list(&select, json),
        Commands::Convert { select, output } => convert(&select, &output),
        Commands::ConvertAll { select, output } => convert_all(&select, &output),
        Commands::View {
            select,
            viewer,
            view_seg,
            view_img,
            bg,
        } => {
            let viewer = viewer.unwrap_or_else(launcher::default_viewer);
            view(&select, &viewer, &view_seg, &view_img, bg)
        }
        Commands::Mesh {
            editor,
            script,
            meshes,
        } => {
            let cmd = HostCommand::mesh_editor(&editor, &script, &meshes);
            cmd.spawn()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn no_candidates() -> ExitCode {
    error!("{}. Check naming rules and --kind.", VolumeLoaderError::NoCandidates);
    ExitCode::from(EXIT_NO_CANDIDATES)
}

#[derive(Serialize)]
struct Listing<'a> {
    #[serde(flatten)]
    entry: &'a ContainerEntry,
    classification: Classification,
    candidate: bool,
}

fn list(select: &SelectArgs, json: bool) -> Result<ExitCode> {
    let config = select.config()?;
    let container = select.open()?;
    let loader = VolumeLoader::new(&container, config)?;
    let entries = loader.entries()?;
    let candidates = selector::select_candidates(
        &entries,
        loader.classifier(),
        loader.config().kind_filter,
    );
    let listings: Vec<Listing> = entries
        .iter()
        .map(|entry| Listing {
            entry,
            classification: loader.classifier().classify(&entry.path, entry.element_type),
            candidate: candidates.iter().any(|c| c.entry.path == entry.path),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
    } else {
        for l in &listings {
            let mark = if l.candidate { "*" } else { " " };
            println!(
                "{mark} {:<40} {:<6} {:<18} {:?}",
                l.entry.path,
                l.entry.element_type.to_string(),
                format!("{:?}", l.entry.shape),
                l.classification
            );
        }
        println!("{} candidate(s) of {} entries", candidates.len(), entries.len());
    }
    Ok(ExitCode::SUCCESS)
}

fn convert(select: &SelectArgs, output: &OutputArgs) -> Result<ExitCode> {
    let config = select.config()?;
    let container = select.open()?;
    let loader = VolumeLoader::new(&container, config)?;
    let options = ConvertOptions {
        dry_run: output.dry_run,
        preview: output.preview,
    };
    match pipeline::convert_one(&loader, &output.out, options)
        .with_context(|| format!("converting from {}", select.container.display()))?
    {
        Some(_) => Ok(ExitCode::SUCCESS),
        None => Ok(no_candidates()),
    }
}

fn convert_all(select: &SelectArgs, output: &OutputArgs) -> Result<ExitCode> {
    let config = select.config()?;
    let container = select.open()?;
    let loader = VolumeLoader::new(&container, config)?;
    let options = ConvertOptions {
        dry_run: output.dry_run,
        preview: output.preview,
    };
    let report = pipeline::convert_all(&loader, &output.out, options)?;
    if report.matched == 0 {
        return Ok(no_candidates());
    }
    info!(
        "Converted {} dataset(s), {} failed",
        report.written.len(),
        report.failed.len()
    );
    for (path, e) in &report.failed {
        warn!("{path}: {e}");
    }
    if report.failed.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn view(
    select: &SelectArgs,
    viewer: &Path,
    view_seg: &Path,
    view_img: &Path,
    bg: bool,
) -> Result<ExitCode> {
    let config = select.config()?.for_viewer(bg);
    for script in [view_seg, view_img] {
        if !script.exists() {
            return Err(VolumeLoaderError::Config(format!(
                "Viewer script not found: {}",
                script.display()
            ))
            .into());
        }
    }
    let container = select.open()?;
    let loader = VolumeLoader::new(&container, config)?;

    // Dropping `temps` removes the files on every path out of this function.
    let mut temps = TempVolumes::new();
    let Some((_, plan)) = pipeline::prepare_view(&loader, &mut temps)? else {
        return Ok(no_candidates());
    };
    let cmd = match &plan {
        ViewPlan::Image { image } => HostCommand::view_image(viewer, view_img, image),
        ViewPlan::Mask { mask, background } => {
            HostCommand::view_mask(viewer, view_seg, mask, background.as_deref())
        }
    };
    let code = cmd.run()?;
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
