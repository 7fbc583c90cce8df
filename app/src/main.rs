mod input;
mod output;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use env_logger::Builder;
use itertools::Itertools as _;
use log::LevelFilter;
use thiserror::Error;

use pcd_core::crs::ReferenceSystem;
use pcd_crs::{CrsCodec, CrsError};
use pcd_roi::{Catalog, ExtractOptions, RoiEngine, RoiError, RoiSet};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Input(String),
    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("extraction aborted after a worker crash: {0}")]
    Aborted(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Roi(#[from] RoiError),
    #[error(transparent)]
    Crs(#[from] CrsError),
}

#[derive(Parser, Debug)]
#[command(
    name = "pclip",
    about = "Extracts circular and rectangular plots from a tiled LAS/LAZ catalog",
    author = "MIERUNE Inc.",
    version = "0.0.1"
)]
struct Cli {
    /// Log debug details
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract ROIs from the catalog
    Extract(ExtractArgs),
    /// Read or write the reference system stored in tile headers
    #[command(subcommand)]
    Crs(CrsCommand),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[arg(short, long, required = true, num_args = 1.., value_name = "FILE")]
    input: Vec<String>,

    #[arg(short, long, required = true, value_name = "DIR")]
    output: PathBuf,

    /// CSV with x,y,r[,r2][,name] columns
    #[arg(long, value_name = "CSV", conflicts_with = "x", required_unless_present = "x")]
    rois: Option<PathBuf>,

    #[arg(long, value_delimiter = ',', requires_all = ["y", "r"], allow_negative_numbers = true)]
    x: Option<Vec<f64>>,

    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    y: Option<Vec<f64>>,

    #[arg(long, value_delimiter = ',')]
    r: Option<Vec<f64>>,

    #[arg(long, value_delimiter = ',')]
    r2: Option<Vec<f64>>,

    #[arg(long, value_delimiter = ',')]
    names: Option<Vec<String>>,

    /// JSON file with extraction options
    #[arg(long, value_name = "JSON")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    workers: Option<usize>,

    /// One worker per logical core
    #[arg(long, conflicts_with = "workers")]
    all_cores: bool,

    #[arg(long)]
    progress: bool,

    /// Keep only these classification codes
    #[arg(long, value_delimiter = ',')]
    classes: Option<Vec<u8>>,

    /// Fail on reference systems missing from the registry
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand, Debug)]
enum CrsCommand {
    /// Print the reference system of each tile
    Get {
        #[arg(required = true, num_args = 1.., value_name = "FILE")]
        files: Vec<String>,

        #[arg(long)]
        strict: bool,
    },
    /// Store a reference system in each tile, in the tile's storage mode
    Set {
        #[arg(long, required_unless_present = "clear", conflicts_with = "clear")]
        epsg: Option<u32>,

        /// Remove all georeferencing records
        #[arg(long)]
        clear: bool,

        #[arg(required = true, num_args = 1.., value_name = "FILE")]
        files: Vec<String>,

        #[arg(long)]
        strict: bool,
    },
}

fn codec(strict: bool) -> CrsCodec {
    if strict {
        CrsCodec::strict()
    } else {
        CrsCodec::permissive()
    }
}

fn extract_options(args: &ExtractArgs) -> Result<ExtractOptions, AppError> {
    let mut options = match &args.config {
        Some(path) => input::load_options(path)?,
        None => ExtractOptions::default(),
    };
    if let Some(workers) = args.workers {
        options.workers = workers;
    }
    if args.all_cores {
        options.workers = num_cpus::get();
    }
    if args.progress {
        options.progress = true;
    }
    if let Some(classes) = &args.classes {
        options.reader.keep_classes = Some(classes.clone());
    }
    Ok(options)
}

fn roi_set(args: &ExtractArgs) -> Result<RoiSet, AppError> {
    if let Some(path) = &args.rois {
        return input::read_rois_from_path(path);
    }
    let empty = Vec::new();
    let rois = RoiSet::from_arrays(
        args.x.as_ref().unwrap_or(&empty),
        args.y.as_ref().unwrap_or(&empty),
        args.r.as_ref().unwrap_or(&empty),
        args.r2.as_deref(),
        args.names.as_deref(),
    )?;
    Ok(rois)
}

fn run_extract(args: ExtractArgs) -> Result<(), AppError> {
    let start = std::time::Instant::now();

    // validated before any tile header is opened
    let rois = roi_set(&args)?;
    let options = extract_options(&args)?;
    log::info!("ROIs: {}", rois.len());
    log::info!("workers: {}", options.workers.max(1));

    let input_files = input::expand_globs(&args.input)?;
    log::info!("input tiles: {}", input_files.len());

    let catalog = Catalog::open(&input_files, &codec(args.strict))?;
    let crs = catalog.crs().to_string();
    let extent = catalog.extent();
    log::info!("catalog reference system: {crs}");
    log::info!(
        "catalog extent: {:.1} x {:.1} from ({:.1}, {:.1})",
        extent.width(),
        extent.height(),
        extent.min_x,
        extent.min_y
    );

    let engine = RoiEngine::new(catalog);
    let (result, crashed) = match engine.extract(&rois, &options) {
        Ok(result) => (result, None),
        Err(RoiError::WorkerCrashed { message, partial }) => (*partial, Some(message)),
        Err(err) => return Err(err.into()),
    };

    let summary = output::write_result(&args.output, crs, &result)?;
    let missing = result.missing().collect_vec();
    if !missing.is_empty() {
        log::warn!("no result for {}", missing.iter().join(", "));
    }
    log::info!(
        "wrote {} ROI files in {:?}",
        summary.rois.iter().filter(|r| r.file.is_some()).count(),
        start.elapsed()
    );

    match crashed {
        Some(message) => Err(AppError::Aborted(message)),
        None => Ok(()),
    }
}

fn run_crs(command: CrsCommand) -> Result<(), AppError> {
    match command {
        CrsCommand::Get { files, strict } => {
            let codec = codec(strict);
            for path in input::expand_globs(&files)? {
                let crs = codec.get(&path)?;
                match &crs {
                    ReferenceSystem::Epsg(_) | ReferenceSystem::Undefined => {
                        println!("{}\t{crs}", path.display())
                    }
                    ReferenceSystem::Wkt(text) => {
                        let epsg = codec
                            .epsg(&crs)
                            .ok()
                            .flatten()
                            .map(|code| format!("EPSG:{code}"))
                            .unwrap_or_else(|| "-".to_string());
                        println!("{}\t{epsg}\t{text}", path.display())
                    }
                }
            }
            Ok(())
        }
        CrsCommand::Set {
            epsg,
            clear,
            files,
            strict,
        } => {
            let codec = codec(strict);
            let crs = match (epsg, clear) {
                (Some(code), false) => ReferenceSystem::Epsg(code),
                _ => ReferenceSystem::Undefined,
            };
            let mut skipped = 0;
            for path in input::expand_globs(&files)? {
                if codec.set(&path, &crs)? {
                    log::info!("{}: {crs}", path.display());
                } else {
                    skipped += 1;
                }
            }
            if skipped > 0 {
                return Err(AppError::Input(format!(
                    "{skipped} tiles left unchanged: {crs} is not in the registry"
                )));
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let args = Cli::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .init();

    let result = match args.command {
        Command::Extract(extract) => run_extract(extract),
        Command::Crs(command) => run_crs(command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
