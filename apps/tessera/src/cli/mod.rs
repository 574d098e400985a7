//! # Tessera CLI Module
//!
//! This module implements the CLI interface for Tessera.
//!
//! ## Available Commands
//!
//! - `init` - Create the database and install the configured types
//! - `types` - List installed types
//! - `integrate` - Integrate update models from a JSON file
//! - `show` - Print a node with its children
//! - `label` - Recalculate the label of a node or edge
//! - `delete` - Delete a node and the children it owns
//! - `status` - Show graph status

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tessera_core::TesseraError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Tessera - composite value integration over a typed graph
///
/// Partial, reference-laden update models go in; one canonical,
/// deduplicated graph comes out.
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the redb database (overrides the configuration file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to the TOML configuration file (default: ./tessera.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new database with the configured types
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// List installed types
    Types,

    /// Integrate one update model, or an array of them, from a JSON file
    Integrate {
        /// Path to the JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Node the model updates (identity types)
        #[arg(short, long)]
        reference: Option<u64>,
    },

    /// Print a node with its children
    Show {
        /// Node ID
        id: u64,

        /// How many levels of children to load
        #[arg(short, long, default_value = "1")]
        depth: usize,
    },

    /// Recalculate and print the label of a node or edge
    Label {
        /// Node or edge ID
        id: u64,

        /// The ID names an edge
        #[arg(short, long)]
        edge: bool,
    },

    /// Delete a node and the children it owns through composition
    Delete {
        /// Node ID
        id: u64,
    },

    /// Show graph status
    Status,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), TesseraError> {
    let config = Config::resolve(cli.config.as_deref())?;
    let db_path = config.database_path(cli.database.as_deref());
    let out = Output {
        json: cli.json_mode,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };
    tracing::debug!(database = %db_path.display(), "resolved database");

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&db_path, &config, force, out),
        Some(Commands::Types) => cmd_types(&db_path, out),
        Some(Commands::Integrate { file, reference }) => {
            cmd_integrate(&db_path, &file, reference, out)
        }
        Some(Commands::Show { id, depth }) => cmd_show(&db_path, id, depth, out),
        Some(Commands::Label { id, edge }) => cmd_label(&db_path, id, edge, out),
        Some(Commands::Delete { id }) => cmd_delete(&db_path, id, out),
        Some(Commands::Status) | None => cmd_status(&db_path, out),
    }
}
