//! # Rowbridge CLI Module
//!
//! This module implements the CLI interface for Rowbridge.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show stored record counts per type
//! - `import` - Import a document file (element tree as JSON)
//! - `export` - Export an entity graph as a flat row document
//! - `init` - Initialize a new database and starter schema

mod commands;

use clap::{Parser, Subcommand};
use rowbridge_core::BridgeError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Rowbridge - Entity Graph Data Bridge
///
/// Imports flat row documents into typed, key-addressed records and exports
/// stored object graphs back out as ordered flat rows.
#[derive(Parser, Debug)]
#[command(name = "rowbridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the record database
    #[arg(short = 'D', long, global = true, default_value = "rowbridge.db")]
    pub database: PathBuf,

    /// Storage backend: "memory" (volatile) or "redb" (ACID database)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Path to the TOML schema describing the type registry
    #[arg(short = 'S', long, global = true, default_value = "schema.toml")]
    pub schema: PathBuf,

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
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show stored record counts
    Status,

    /// Import a document file
    Import {
        /// Path to the input file (element tree as JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Export an entity graph as a flat row document
    Export {
        /// Target entity type
        #[arg(short, long)]
        target: String,

        /// Key of the root entity (unique column value or primary key)
        #[arg(short, long)]
        key: String,

        /// Relation traversal depth
        #[arg(short, long, default_value = "8")]
        depth: usize,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Initialize a new database and starter schema
    Init {
        /// Force initialization even if files exist
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), BridgeError> {
    let backend = cli.backend.as_str();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            cmd_server(&cli.database, backend, &cli.schema, &host, port).await
        }
        Some(Commands::Status) => cmd_status(&cli.database, backend, &cli.schema, json_mode),
        Some(Commands::Import { file }) => {
            cmd_import(&cli.database, backend, &cli.schema, json_mode, &file)
        }
        Some(Commands::Export {
            target,
            key,
            depth,
            output,
        }) => cmd_export(
            &cli.database,
            backend,
            &cli.schema,
            &target,
            &key,
            depth,
            output.as_deref(),
        ),
        Some(Commands::Init { force }) => cmd_init(&cli.database, backend, &cli.schema, force),
        None => {
            // No subcommand - show status by default
            cmd_status(&cli.database, backend, &cli.schema, json_mode)
        }
    }
}
