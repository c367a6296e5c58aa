//! CLI module providing command-line interface functionality
//!
//! This module handles argument parsing, command validation, and routing
//! to appropriate handlers while maintaining separation of concerns.

pub mod args;
pub mod commands;
pub mod context;
pub mod handlers;

use anyhow::Result;
use clap::Parser;

use crate::config::{ConfigProvider, ServerSettings};

pub use args::ArgProcessor;
pub use commands::{Cli, Commands};
pub use context::CliContext;
pub use handlers::CommandHandler;

/// Main CLI application
pub struct CliApp;

impl CliApp {
    /// Parse command line arguments and execute the requested command
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();

        let context = CliContext::new(cli.config_dir.clone(), cli.verbose)?;

        // Only the server writes a log file; everything else logs to stderr.
        let log_dir = match cli.command {
            Commands::Serve { .. } => {
                let settings: ServerSettings = context.config_manager.load()?;
                settings.log_dir
            }
            _ => None,
        };
        let _log_guard = match log_dir {
            Some(dir) => Some(context.init_logging_with_file(&dir)?),
            None => {
                context.init_logging()?;
                None
            }
        };

        ArgProcessor::new().validate_command(&cli.command)?;

        let handler = CommandHandler::new(context);
        handler.handle_command(cli.command).await
    }
}
