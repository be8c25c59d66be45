//! CLI entry point for the ridership atlas.
//!
//! Provides subcommands for the spatial joins (catchments, connectivity),
//! the commute-flow analysis, chart rendering, and the full report.

use anyhow::Result;
use clap::{Parser, Subcommand};
use ridership_atlas::analyzers::report::{
    AnalysisContext, run_catchments, run_charts, run_commutes, run_connectivity, run_report,
};
use ridership_atlas::config::DataPaths;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const METERS_PER_MILE: f64 = 1609.344;

#[derive(Parser)]
#[command(name = "ridership_atlas")]
#[command(about = "Joins transit schedules, ridership, and demographics into report artifacts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SpatialArgs {
    /// Directory with the processed data files
    #[arg(short, long, default_value = "data/processed")]
    data_dir: PathBuf,

    /// Directory with the extracted GTFS text tables
    #[arg(short, long, default_value = "data/raw/gtfs")]
    gtfs_dir: PathBuf,

    /// Station list CSV (station,lat,lon)
    #[arg(short, long, default_value = "data/stations.csv")]
    stations: PathBuf,

    /// Catchment buffer radius in miles
    #[arg(short, long, default_value_t = 0.5)]
    buffer_miles: f64,

    /// Directory for generated artifacts
    #[arg(short, long, default_value = "outputs")]
    out_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Build station catchments and aggregate block-group demographics
    Catchments(SpatialArgs),

    /// Compute bus route counts and peak frequencies per station
    Connectivity(SpatialArgs),

    /// Summarize LODES commute flows into the study area
    Commutes {
        /// Directory with the processed data files
        #[arg(short, long, default_value = "data/processed")]
        data_dir: PathBuf,

        /// Directory for generated artifacts
        #[arg(short, long, default_value = "outputs")]
        out_dir: PathBuf,

        /// Pre-pandemic LODES year
        #[arg(long, default_value_t = 2019)]
        pre_year: i32,

        /// Pandemic-era LODES year
        #[arg(long, default_value_t = 2021)]
        post_year: i32,
    },

    /// Render all interactive HTML charts
    Charts(SpatialArgs),

    /// Run the whole pipeline: catchments, connectivity, commutes, charts
    Report {
        #[command(flatten)]
        spatial: SpatialArgs,

        /// Pre-pandemic LODES year
        #[arg(long, default_value_t = 2019)]
        pre_year: i32,

        /// Pandemic-era LODES year
        #[arg(long, default_value_t = 2021)]
        post_year: i32,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/ridership_atlas.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ridership_atlas.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Catchments(args) => {
            let ctx = load_context(&args)?;
            run_catchments(&ctx, &args.out_dir)?;
        }
        Commands::Connectivity(args) => {
            let ctx = load_context(&args)?;
            run_connectivity(&ctx, &args.out_dir)?;
        }
        Commands::Commutes {
            data_dir,
            out_dir,
            pre_year,
            post_year,
        } => {
            let data = DataPaths::new(data_dir);
            run_commutes(&data, &out_dir, pre_year, post_year)?;
        }
        Commands::Charts(args) => {
            let ctx = load_context(&args)?;
            let data = DataPaths::new(&args.data_dir);
            run_charts(&ctx, &data, &args.out_dir)?;
        }
        Commands::Report {
            spatial,
            pre_year,
            post_year,
        } => {
            let ctx = load_context(&spatial)?;
            let data = DataPaths::new(&spatial.data_dir);
            run_report(&ctx, &data, &spatial.out_dir, pre_year, post_year)?;
        }
    }

    Ok(())
}

fn load_context(args: &SpatialArgs) -> Result<AnalysisContext> {
    let data = DataPaths::new(&args.data_dir);
    AnalysisContext::load(
        &args.gtfs_dir,
        &args.stations,
        &data,
        args.buffer_miles * METERS_PER_MILE,
    )
}
