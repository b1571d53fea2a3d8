//! Command-line entry point for single-star characterization.
//!
//! Queries the archive for the named target, downloads the canonical
//! combined spectrum and the closest-matching light curve, and writes the
//! composite figure PNG.

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use starweave::archive::{ArchiveSession, MastClient};
use starweave::config::WorkflowConfig;
use starweave::workflow::VariableStarWorkflow;

#[derive(Parser, Debug)]
#[command(
    name = "characterize",
    about = "Correlate APOGEE spectroscopy and TESS photometry for one star into a composite figure",
    long_about = None
)]
struct Args {
    /// Target identifier (e.g. "V1154_Cyg")
    identifier: String,

    /// Root directory for cache, figures and config (default: ~/.starweave)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Directory to write the figure into (overrides the root layout)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Cone-search radius for the time-series match, in degrees
    #[arg(long)]
    radius_deg: Option<f64>,

    /// Population catalog FITS file for the background panel
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Archive bearer token for exclusive-access data
    #[arg(long)]
    token: Option<String>,

    /// Archive portal base URL
    #[arg(long, default_value = starweave::archive::DEFAULT_BASE_URL)]
    archive_url: String,

    /// Enable debug output
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let mut config = match &args.root {
        Some(root) => WorkflowConfig::with_root(root),
        None => WorkflowConfig::new()?,
    };
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(radius) = args.radius_deg {
        config.search_radius_deg = radius;
    }
    if let Some(catalog) = args.catalog {
        config.catalog_path = Some(catalog);
    }

    let session = match &args.token {
        Some(token) => ArchiveSession::with_token(token),
        None => ArchiveSession::anonymous(),
    };
    println!("Archive: {} ({})", args.archive_url, session.info());

    let client = MastClient::with_session(&args.archive_url, session)?;
    let workflow = VariableStarWorkflow::new(&client, config);

    let artifact = workflow.characterize_star(&args.identifier)?;

    println!("Figure written to: {}", artifact.figure_path.display());
    for warning in &artifact.warnings {
        println!("Warning: {warning}");
    }

    Ok(())
}
