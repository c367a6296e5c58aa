//! Server handler
//!
//! Runs the notification server in the foreground until Ctrl+C, printing
//! every received message to stdout.

use anyhow::{Context, Result};
use chrono::Local;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::super::CliContext;
use crate::config::{ConfigProvider, ServerSettings};
use crate::server::{HandlerLimit, NotificationSink, ServerController, ServerOptions};

/// Sink that prints notifications to the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn render(text: &str) -> String {
        format!(
            "==== New Notification! ====\nReceived: {}\n{}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            text
        )
    }
}

impl NotificationSink for ConsoleSink {
    fn on_message_received(&self, text: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(Self::render(text).as_bytes())?;
        stdout.flush()?;
        info!("Showing notification: {}", text);
        Ok(())
    }

    fn on_status(&self, text: &str) {
        info!("{}", text);
    }
}

/// Handler for the serve command
pub struct ServeHandler<'a> {
    context: &'a CliContext,
}

impl<'a> ServeHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    /// Load settings and apply command-line overrides
    pub fn settings(
        &self,
        host: Option<String>,
        port: Option<u32>,
        backlog: Option<u32>,
        max_handlers: Option<usize>,
    ) -> Result<ServerSettings> {
        let mut settings: ServerSettings = self.context.config_manager.load()?;
        if let Some(host) = host {
            settings.host = host;
        }
        if let Some(port) = port {
            settings.port = port;
        }
        if let Some(backlog) = backlog {
            settings.backlog = backlog;
        }
        if max_handlers.is_some() {
            settings.max_handlers = max_handlers;
        }
        Ok(settings)
    }

    pub async fn handle_serve(
        &self,
        host: Option<String>,
        port: Option<u32>,
        backlog: Option<u32>,
        max_handlers: Option<usize>,
        save: bool,
    ) -> Result<()> {
        let settings = self.settings(host, port, backlog, max_handlers)?;
        if save {
            self.context
                .config_manager
                .save(&settings)
                .context("Failed to save settings")?;
            println!("Settings saved");
        }

        let options = ServerOptions {
            handler_limit: HandlerLimit::from_option(settings.max_handlers),
            ..ServerOptions::default()
        };
        let controller =
            ServerController::with_options(settings.transport()?, Arc::new(ConsoleSink), options);

        let status = controller.start().await?;
        println!("{status}");

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut health = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    result.context("Failed to listen for Ctrl+C")?;
                    info!("Received Ctrl+C signal, stopping server");
                    break;
                }
                _ = health.tick() => {
                    if let Some(failure) = controller.last_failure() {
                        error!("Accept loop stopped: {}", failure);
                        controller.stop().await?;
                        return Err(anyhow::anyhow!(failure));
                    }
                }
            }
        }

        let status = controller.stop().await?;
        println!("{status}");
        Ok(())
    }
}
