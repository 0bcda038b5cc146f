//! # graphsink CLI Module
//!
//! This module implements the CLI interface for graphsink.
//!
//! ## Available Commands
//!
//! - `write` - Write record files in one output format
//! - `inspect` - List the files of an output directory
//! - `plan` - Print the Neo4j load order and write the tenant cleanup script

mod commands;

use clap::{Parser, Subcommand};
use graphsink_core::{GraphSinkError, WriterKind};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// graphsink - graph element serializer
///
/// Turns vertex and edge records into MeTTa, Neo4j bulk-import bundles or a
/// NetworkX snapshot.
#[derive(Parser, Debug)]
#[command(name = "graphsink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write record files in one output format
    Write {
        /// Output format (metta, neo4j, networkx)
        #[arg(short, long)]
        format: WriterKind,

        /// Record file (JSON array or JSON lines); repeatable
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Output directory (overrides the config file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Job id, used as the tenant tag (overrides the config file)
        #[arg(short, long)]
        job_id: Option<String>,

        /// TOML writer configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Truncate every rendered value to N characters
        #[arg(long)]
        truncate: Option<usize>,

        /// Records per submitted batch
        #[arg(short, long, default_value = "1000")]
        batch_size: usize,

        /// Threads submitting batches concurrently
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Keep the intermediate NetworkX JSON document
        #[arg(long)]
        keep_json: bool,
    },

    /// List the files of an output directory
    Inspect {
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the Neo4j load order and write the tenant cleanup script
    Plan {
        /// Output directory of a neo4j job
        #[arg(short, long)]
        output: PathBuf,

        /// Job id the bundle was written with
        #[arg(short, long)]
        job_id: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), GraphSinkError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Write {
            format,
            input,
            output,
            job_id,
            config,
            truncate,
            batch_size,
            workers,
            keep_json,
        } => cmd_write(
            &WriteOptions {
                format,
                inputs: input,
                output,
                job_id,
                config,
                truncate,
                batch_size,
                workers,
                keep_json,
            },
            json_mode,
        ),
        Commands::Inspect { output } => cmd_inspect(&output, json_mode),
        Commands::Plan { output, job_id } => cmd_plan(&output, &job_id, json_mode),
    }
}
