//! Command handlers for all CLI operations
//!
//! Each subcommand has its own handler; `CommandHandler` routes to them.

pub mod config;
pub mod run;
pub mod send;
pub mod serve;

use anyhow::Result;

use super::{CliContext, Commands};
use config::ConfigHandler;
use run::RunHandler;
use send::SendHandler;
use serve::ServeHandler;

/// Owns the CLI context and lends it to one handler per command
pub struct CommandHandler {
    context: CliContext,
}

impl CommandHandler {
    pub fn new(context: CliContext) -> Self {
        Self { context }
    }

    /// Route commands to their appropriate handlers
    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        let context = &self.context;

        match command {
            Commands::Serve {
                host,
                port,
                backlog,
                max_handlers,
                save,
            } => {
                ServeHandler::new(context)
                    .handle_serve(host, port, backlog, max_handlers, save)
                    .await
            }
            Commands::Send {
                message,
                host,
                port,
                timeout,
            } => {
                SendHandler::new(context)
                    .handle_send(message, host, port, timeout)
                    .await
            }
            Commands::Config { ip, port } => ConfigHandler::new(context).handle_config(ip, port),
            Commands::Run { command } => RunHandler::new(context).handle_run(command).await,
        }
    }
}
