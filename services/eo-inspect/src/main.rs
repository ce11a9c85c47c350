//! EO product inspector.
//!
//! Resolves product formats, prints descriptors and load plans, and
//! locates cached band artifacts. Every command prints JSON on stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use band_loader::CleaningPolicy;
use eo_common::{BandId, BoundingBox};
use eo_inspect::commands::{self, CachePathQuery};
use eo_inspect::config::load_config;
use product_resolver::{FormatId, ProductFactory, Strategy};

#[derive(Parser, Debug)]
#[command(name = "eo-inspect")]
#[command(about = "Inspect Earth-observation products")]
struct Args {
    /// YAML load configuration (environment variables otherwise)
    #[arg(short, long, env = "EO_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the format of a product
    Resolve {
        path: PathBuf,

        /// name, metadata or both
        #[arg(long, default_value = "both")]
        strategy: Strategy,

        /// Only consider these format codes (e.g. S2,L8)
        #[arg(long, value_delimiter = ',')]
        formats: Vec<FormatId>,
    },

    /// Print the product descriptor
    Describe {
        path: PathBuf,

        #[arg(long, default_value = "both")]
        strategy: Strategy,
    },

    /// Print the load plan of a band list
    Plan {
        path: PathBuf,

        /// Comma-separated band identifiers (e.g. NDVI,DEM)
        #[arg(long)]
        bands: String,

        #[arg(long, default_value = "both")]
        strategy: Strategy,
    },

    /// Print where a band's artifact is cached
    CachePath {
        path: PathBuf,

        #[arg(long)]
        band: BandId,

        /// Output pixel size; the product's native one otherwise
        #[arg(long)]
        pixel_size: Option<f64>,

        /// raw, nodata or clean
        #[arg(long)]
        cleaning: Option<CleaningPolicy>,

        /// Read window "minx,miny,maxx,maxy" in the product CRS
        #[arg(long, allow_hyphen_values = true)]
        window: Option<BoundingBox>,

        /// Directory artifacts are written to
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        #[arg(long, default_value = "both")]
        strategy: Strategy,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let factory = ProductFactory::with_builtin_formats();

    match args.command {
        Command::Resolve {
            path,
            strategy,
            formats,
        } => {
            let candidates = (!formats.is_empty()).then_some(formats.as_slice());
            let report = commands::resolve(&factory, &path, strategy, candidates)?;
            if report.format.is_none() {
                info!(path = %path.display(), "No format matched");
            }
            print_json(&report)
        }
        Command::Describe { path, strategy } => {
            let descriptor = commands::describe(&factory, &path, strategy)?;
            print_json(&descriptor)
        }
        Command::Plan {
            path,
            bands,
            strategy,
        } => {
            let bands = BandId::parse_list(&bands).context("Invalid band list")?;
            let plan = commands::plan_bands(&factory, &path, strategy, &bands)?;
            print_json(&plan)
        }
        Command::CachePath {
            path,
            band,
            pixel_size,
            cleaning,
            window,
            output_dir,
            strategy,
        } => {
            let config = load_config(args.config.as_deref())?;
            let query = CachePathQuery {
                band,
                pixel_size,
                cleaning,
                window,
                output_dir,
            };
            let report = commands::cache_path(&factory, &path, strategy, &config, &query)?;
            print_json(&report)
        }
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries the JSON report
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
