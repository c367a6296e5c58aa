//! Command definitions and structures for the CLI
//!
//! This module contains all the clap-based command line argument definitions,
//! including the main CLI structure and all subcommands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure
#[derive(Parser)]
#[command(name = "notify-relay")]
#[command(about = "Relay short text notifications to a listening host")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding server.toml and client.toml
    #[arg(long, global = true, env = "NOTIFY_RELAY_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the notification server until Ctrl+C
    Serve {
        /// Listen address (overrides server.toml)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides server.toml)
        #[arg(short, long)]
        port: Option<u32>,

        /// Listen backlog (overrides server.toml)
        #[arg(long)]
        backlog: Option<u32>,

        /// Cap on concurrently running connection handlers
        #[arg(long)]
        max_handlers: Option<usize>,

        /// Persist the overrides to server.toml
        #[arg(long)]
        save: bool,
    },

    /// Send one notification message
    Send {
        /// Message to send
        message: String,

        /// Server address (overrides client.toml)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides client.toml)
        #[arg(short, long)]
        port: Option<u32>,

        /// Connect and acknowledgment timeout in seconds
        #[arg(short, long, default_value = "5")]
        timeout: f64,
    },

    /// Show or change the server address used by `send` and `run`
    Config {
        /// Server IP address
        #[arg(long)]
        ip: Option<String>,

        /// Server port
        #[arg(long)]
        port: Option<u32>,
    },

    /// Run a shell command and send a notification when it finishes
    Run {
        /// Command to execute; arguments are joined with spaces
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}
