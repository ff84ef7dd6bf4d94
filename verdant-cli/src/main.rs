//! verdant — identify plants from photos and browse past identifications
//!
//! # Subcommands
//! - `identify <image> [--no-save] [--json]` — identify a photo, save it to history
//! - `history [-n <limit>] [--json]`         — list past identifications, newest first
//! - `clear`                                 — delete all history

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use verdant_core::{identify_and_save, HistoryEntry, IdentificationResult, VerdantConfig};

mod display;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "verdant",
    version,
    about = "Identify plants from photos and keep a local history"
)]
struct Cli {
    /// Path to the TOML config file (missing file falls back to defaults)
    #[arg(short, long, env = "VERDANT_CONFIG", default_value = "verdant.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Identify the plant in a photo
    Identify {
        /// Image file to send for identification
        image: PathBuf,

        /// Do not record the result in history
        #[arg(long)]
        no_save: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List past identifications, newest first
    History {
        /// Maximum number of entries to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print entries as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Delete all saved identifications
    Clear,
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_identify(
    config: &VerdantConfig,
    image: PathBuf,
    no_save: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let bytes = tokio::fs::read(&image).await?;
    let image_reference = std::fs::canonicalize(&image)
        .unwrap_or(image)
        .to_string_lossy()
        .into_owned();

    let client = config.identification_client()?;

    // History is opened only after a successful identification, so a broken
    // data directory can cost the save but never the result.
    let capture =
        match identify_and_save(config, &client, &bytes, &image_reference, !no_save).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Identification failed");
                match e.status_code() {
                    Some(code) => eprintln!(
                        "Failed to identify plant (API status {}). Please check your API key and try again.",
                        code
                    ),
                    None => eprintln!("Failed to identify plant. Please try again."),
                }
                return Ok(ExitCode::FAILURE);
            }
        };

    print_result(&capture.result, json)?;

    if let Some(e) = capture.persist_error {
        eprintln!("Warning: result was not saved to history: {}", e);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_result(result: &IdentificationResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print!("{}", display::format_result(result));
    }
    Ok(())
}

async fn cmd_history(
    config: &VerdantConfig,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let history = config.open_history().await?;
    let mut entries: Vec<HistoryEntry> = match history.list().await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load history");
            eprintln!("Failed to load history: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("No identifications yet. Run `verdant identify <image>` to add one.");
    } else {
        for entry in &entries {
            println!("{}", display::format_entry(entry));
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn cmd_clear(config: &VerdantConfig) -> anyhow::Result<ExitCode> {
    let history = config.open_history().await?;
    history.clear().await?;
    println!("History cleared.");
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Entry point
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present (PLANT_ID_API_KEY during development)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match VerdantConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", cli.config, e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match cli.command {
        Commands::Identify {
            image,
            no_save,
            json,
        } => cmd_identify(&config, image, no_save, json).await,
        Commands::History { limit, json } => cmd_history(&config, limit, json).await,
        Commands::Clear => cmd_clear(&config).await,
    }
}
