//! faceswap - put one face onto another
//!
//! Reads two images together with detector output describing the faces in
//! them, and writes the recipient image with the donor's face composited in.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use faceswap::config::Config;
use faceswap::detection::{select_face, JsonDetections, LandmarkDetector};
use faceswap::output::load_image;
use faceswap::FaceSwapper;

/// faceswap - landmark-driven face swapping
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "faceswap.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Put the donor's face over the recipient's face
    Swap {
        /// Image whose face gets replaced
        #[arg(long)]
        recipient: PathBuf,

        /// Image providing the new face
        #[arg(long)]
        donor: PathBuf,

        /// Detector output for the recipient (default: <recipient>.json)
        #[arg(long)]
        recipient_features: Option<PathBuf>,

        /// Detector output for the donor (default: <donor>.json)
        #[arg(long)]
        donor_features: Option<PathBuf>,

        /// Output image path; the extension selects the format
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write the default configuration file
    InitConfig,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("faceswap v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::InitConfig => Config::default().save(&args.config),
        Command::Swap {
            recipient,
            donor,
            recipient_features,
            donor_features,
            output,
        } => {
            let config = Config::load_or_default(&args.config)?;

            let mut detector = JsonDetections::new();
            if let Some(path) = recipient_features {
                detector = detector.with_override(recipient.clone(), path);
            }
            if let Some(path) = donor_features {
                detector = detector.with_override(donor.clone(), path);
            }

            let written = run_swap(&config, &detector, &recipient, &donor, &output)?;
            println!("{}", written.display());
            Ok(())
        }
    }
}

/// Detect, swap and write. The detector is supplied by the caller.
fn run_swap(
    config: &Config,
    detector: &dyn LandmarkDetector,
    recipient_path: &Path,
    donor_path: &Path,
    output: &Path,
) -> Result<PathBuf> {
    let swapper = FaceSwapper::from_config(config)?;

    let recipient = load_image(recipient_path)
        .with_context(|| format!("Failed to load recipient image {:?}", recipient_path))?;
    let donor = load_image(donor_path)
        .with_context(|| format!("Failed to load donor image {:?}", donor_path))?;
    info!(
        "Recipient {}x{}, donor {}x{}",
        recipient.width(),
        recipient.height(),
        donor.width(),
        donor.height()
    );

    let recipient_face = select_face(detector.detect(recipient_path)?, "recipient")
        .with_context(|| format!("No usable face detected in {:?}", recipient_path))?;
    let donor_face = select_face(detector.detect(donor_path)?, "donor")
        .with_context(|| format!("No usable face detected in {:?}", donor_path))?;

    let written = swapper.swap_faces_to(
        &recipient,
        &donor,
        &recipient_face.landmarks,
        &donor_face.landmarks,
        output,
    )?;
    Ok(written)
}
