//! Rowdex CLI
//!
//! Command-line tools for Rowdex index directories.
//!
//! # Commands
//!
//! - `inspect` - List catalogued indexes and their snapshots
//! - `verify` - Check catalog and snapshot integrity

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Rowdex index directory tools.
#[derive(Parser)]
#[command(name = "rowdex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the index directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalogued indexes and their snapshots
    Inspect {
        /// Load each snapshot and report structure details
        #[arg(short, long)]
        detailed: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check catalog and snapshot integrity
    Verify {
        /// Only verify the named index
        #[arg(short, long)]
        index: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { detailed, format } => {
            let path = cli.path.ok_or("Index directory path required for inspect")?;
            commands::inspect::run(&path, detailed, &format)?;
        }
        Commands::Verify { index, format } => {
            let path = cli.path.ok_or("Index directory path required for verify")?;
            commands::verify::run(&path, index.as_deref(), &format)?;
        }
        Commands::Version => {
            println!("Rowdex CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Catalog format v{}, snapshot format v{}",
                rowdex_core::CATALOG_VERSION,
                rowdex_core::SNAPSHOT_VERSION
            );
        }
    }

    Ok(())
}
