//! Command line argument parsing for the Pilum CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Pilum - score documents with per-query payload scoring functions
#[derive(Parser, Debug, Clone)]
#[command(name = "pilum")]
#[command(about = "Score documents with per-query payload scoring functions")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct PilumArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl PilumArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Score a corpus with a query and print the best hits
    Score(ScoreArgs),

    /// Explain the score of one document
    Explain(ExplainArgs),

    /// Compile the sources of a query without scoring anything
    Check(CheckArgs),
}

/// Arguments for scoring
#[derive(Parser, Debug, Clone)]
pub struct ScoreArgs {
    /// Corpus file (JSON)
    #[arg(short, long, value_name = "CORPUS_FILE")]
    pub corpus: PathBuf,

    /// Query file (JSON)
    #[arg(short = 'Q', long, value_name = "QUERY_FILE")]
    pub query: PathBuf,

    /// Maximum number of hits to return
    #[arg(short, long)]
    pub top: Option<usize>,

    /// Score segments one after another
    #[arg(long)]
    pub sequential: bool,

    /// Number of threads for parallel scoring (default: CPU cores)
    #[arg(long)]
    pub threads: Option<usize>,
}

/// Arguments for explaining
#[derive(Parser, Debug, Clone)]
pub struct ExplainArgs {
    /// Corpus file (JSON)
    #[arg(short, long, value_name = "CORPUS_FILE")]
    pub corpus: PathBuf,

    /// Query file (JSON)
    #[arg(short = 'Q', long, value_name = "QUERY_FILE")]
    pub query: PathBuf,

    /// Global document id
    #[arg(short, long)]
    pub doc: u64,
}

/// Arguments for checking a query
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    /// Query file (JSON)
    #[arg(value_name = "QUERY_FILE")]
    pub query: PathBuf,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
