use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use overlay_geotag::{
    batch::run_geotag,
    config::{FaultPolicy, RunConfig},
    prune::{prune_empty_tiles, write_prune_log, DEFAULT_SIZE_THRESHOLD},
    publish::{run_publish, Product, PublishConfig},
    report::count_entries,
    Result,
};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "overlay-geotag",
    about = "Geotag UAV frames from their coordinate overlay and publish map previews"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read the coordinate overlay of PNG frames and write geotagged JPEGs plus a KML preview.
    Geotag(GeotagArgs),
    /// Write thumbnails, a KML and a URL list for a folder of geotagged JPEGs.
    Publish(PublishArgs),
    /// Delete TIF tiles without raster data, with their world files.
    Prune(PruneArgs),
}

#[derive(Args, Debug)]
struct GeotagArgs {
    /// TOML run configuration, `overlay-geotag.toml` is used when present.
    #[arg(long, env = "OVERLAY_GEOTAG_CONFIG")]
    config: Option<PathBuf>,
    /// Directory containing the PNG frames.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Directory receiving JPEGs, geotags and the KML preview.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Report of frames that could not be georeferenced, truncated each run.
    #[arg(long)]
    report: Option<PathBuf>,
    /// RGBA overlay blended onto every output JPEG.
    #[arg(long)]
    mask: Option<PathBuf>,
    #[arg(long, value_enum)]
    on_fault: Option<FaultPolicy>,
    #[arg(long)]
    det_model: Option<PathBuf>,
    #[arg(long)]
    rec_model: Option<PathBuf>,
    #[arg(long)]
    rec_keys: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PublishArgs {
    /// Directory containing the geotagged JPEGs.
    #[arg(long)]
    input: PathBuf,
    /// Directory receiving the KML and TXT files.
    #[arg(long)]
    export: PathBuf,
    #[arg(long, value_enum)]
    product: Product,
    /// Item name in the format YYYY-###-CAPITALLETTERS, e.g. 2024-001-WALLIS.
    #[arg(long)]
    item_name: String,
}

#[derive(Args, Debug)]
struct PruneArgs {
    /// Folder holding the TIF tiles.
    folder: PathBuf,
    /// Tiles smaller than this many bytes are deleted.
    #[arg(long, default_value_t = DEFAULT_SIZE_THRESHOLD)]
    threshold: u64,
    /// Write the deleted names to log.txt in the folder.
    #[arg(long)]
    log: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Geotag(args) => geotag(args),
        Command::Publish(args) => publish(args),
        Command::Prune(args) => prune(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn geotag(args: GeotagArgs) -> Result<()> {
    let mut config = RunConfig::load(args.config.as_deref())?;
    if let Some(input) = args.input {
        config.input_root = input;
    }
    if let Some(output) = args.output {
        config.output_root = output;
    }
    if let Some(report) = args.report {
        config.report_path = report;
    }
    if args.mask.is_some() {
        config.mask_path = args.mask;
    }
    if let Some(policy) = args.on_fault {
        config.fault_policy = policy;
    }
    if let Some(path) = args.det_model {
        config.engine.det_model = path;
    }
    if let Some(path) = args.rec_model {
        config.engine.rec_model = path;
    }
    if let Some(path) = args.rec_keys {
        config.engine.rec_keys = path;
    }

    config.validate()?;
    let ocr = config.engine.build()?;
    let summary = run_geotag(&config, &ocr)?;
    tracing::info!(
        frames = summary.frames,
        georeferenced = summary.georeferenced,
        incomplete = summary.incomplete,
        dimension_mismatches = summary.dimension_mismatches,
        oracle_faults = summary.oracle_faults,
        "Geotag run finished"
    );
    match count_entries(&config.report_path)? {
        0 => tracing::info!("Every frame was georeferenced"),
        entries => tracing::warn!(
            "{entries} frames listed in {}",
            config.report_path.display()
        ),
    }
    Ok(())
}

fn publish(args: PublishArgs) -> Result<()> {
    let config = PublishConfig {
        input_root: args.input,
        export_root: args.export,
        product: args.product,
        item_name: args.item_name,
    };
    let summary = run_publish(&config)?;
    tracing::info!(
        thumbnails = summary.thumbnails,
        placemarks = summary.placemarks,
        untagged = summary.untagged.len(),
        "Publish run finished"
    );
    Ok(())
}

fn prune(args: PruneArgs) -> Result<()> {
    let pruned = prune_empty_tiles(&args.folder, args.threshold)?;
    if pruned.is_empty() {
        tracing::info!("No TIF deleted, every tile holds raster data");
        return Ok(());
    }
    tracing::info!("Deleted {} empty TIFs", pruned.len());
    if args.log {
        let log = write_prune_log(&args.folder, &pruned)?;
        tracing::info!("Deleted tiles listed in {}", log.display());
    }
    Ok(())
}
