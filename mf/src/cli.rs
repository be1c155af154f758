//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Mapforge - ACBS/CAP field mapping generator
#[derive(Parser)]
#[command(
    name = "mapforge",
    about = "Assemble source-to-target field mappings and synthesize SQL logic for each row",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Assemble candidates, synthesize SQL logic and write the mapping table
    Run {
        /// Metadata table (overrides inputs.metadata)
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Mapping rule table (overrides inputs.rules)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Output table (overrides output.path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Synthesis calls in flight at once (overrides concurrency.max-in-flight)
        #[arg(short = 'j', long)]
        max_in_flight: Option<usize>,
    },

    /// Assemble candidates only and write them with empty sql_logic
    Assemble {
        /// Mapping rule table (overrides inputs.rules)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Output table (overrides output.path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the rendered synthesis prompt without calling the service
    Prompt {
        /// Candidate position (0-based); all candidates when omitted
        #[arg(short, long)]
        index: Option<usize>,
    },
}

/// Get the path to the mapforge log file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mapforge")
        .join("logs")
        .join("mapforge.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// after_help text pointing at the log file
pub fn generate_after_help() -> String {
    format!("Logs:\n  {}\n", get_log_path().display())
}
