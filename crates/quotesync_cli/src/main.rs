//! QuoteSync CLI
//!
//! Command-line tools for inspecting and reconciling quote copies.
//!
//! # Commands
//!
//! - `compare` - Show the causal relationship of two copies
//! - `merge` - Reconcile a local copy with a remote copy
//! - `resolve` - Apply choices to a pending conflict
//! - `inspect` - Display a quote with its clock and field classes
//! - `classification` - Print the standard classification table

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// QuoteSync command-line tools.
#[derive(Parser)]
#[command(name = "quotesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the causal relationship of two copies
    Compare {
        /// Local quote file (JSON)
        local: PathBuf,

        /// Remote quote file (JSON)
        remote: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Reconcile a local copy with a remote copy
    Merge {
        /// Local quote file (JSON)
        local: PathBuf,

        /// Remote quote file (JSON)
        remote: PathBuf,

        /// Device performing the merge
        #[arg(short, long)]
        device: String,

        /// Classification table (JSON); the standard table if omitted
        #[arg(short, long)]
        classification: Option<PathBuf>,

        /// Fail on unclassified fields instead of treating them as critical
        #[arg(long)]
        strict: bool,

        /// Write the full outcome to this file
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Apply choices to a pending conflict
    Resolve {
        /// Outcome file written by `merge --out`
        outcome: PathBuf,

        /// Choices file (JSON object keyed by path)
        choices: PathBuf,

        /// Device performing the resolution
        #[arg(short, long)]
        device: String,

        /// Write the resolved quote to this file
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display a quote with its clock and field classes
    Inspect {
        /// Quote file (JSON)
        quote: PathBuf,

        /// Classification table (JSON); the standard table if omitted
        #[arg(short, long)]
        classification: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the standard classification table as JSON
    Classification,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compare {
            local,
            remote,
            format,
        } => {
            commands::compare::run(&local, &remote, &format)?;
        }
        Commands::Merge {
            local,
            remote,
            device,
            classification,
            strict,
            out,
            format,
        } => {
            let options = commands::merge::MergeOptions {
                device: &device,
                classification: classification.as_deref(),
                strict,
                out: out.as_deref(),
            };
            commands::merge::run(&local, &remote, &options, &format)?;
        }
        Commands::Resolve {
            outcome,
            choices,
            device,
            out,
            format,
        } => {
            commands::resolve::run(&outcome, &choices, &device, out.as_deref(), &format)?;
        }
        Commands::Inspect {
            quote,
            classification,
            format,
        } => {
            commands::inspect::run(&quote, classification.as_deref(), &format)?;
        }
        Commands::Classification => {
            let table = quotesync_core::ClassificationTable::standard();
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        Commands::Version => {
            println!("QuoteSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("QuoteSync Core v{}", quotesync_core::VERSION);
        }
    }

    Ok(())
}
