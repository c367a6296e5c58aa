//! CLI Context for dependency injection and shared state
//!
//! This module provides the CliContext abstraction that centralizes
//! configuration management and logging setup for the CLI handlers.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigManager;

/// CLI execution context containing shared dependencies and configuration
#[derive(Clone)]
pub struct CliContext {
    pub verbose: bool,
    pub config_manager: Arc<ConfigManager>,
}

impl CliContext {
    /// Create a new CLI context with the specified config directory and verbosity
    pub fn new(config_dir: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let config_manager = Arc::new(ConfigManager::new(config_dir)?);

        Ok(Self {
            verbose,
            config_manager,
        })
    }

    fn env_filter(&self) -> EnvFilter {
        if self.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    }

    /// Initialize logging to stderr
    pub fn init_logging(&self) -> Result<()> {
        fmt()
            .with_env_filter(self.env_filter())
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

        tracing::debug!("Verbose logging enabled");
        tracing::debug!("Config directory: {}", self.config_manager.config_dir().display());
        Ok(())
    }

    /// Initialize logging to stderr plus a daily rolling file in `log_dir`
    ///
    /// The returned guard flushes the file writer on drop and must be held
    /// for as long as logging is needed.
    pub fn init_logging_with_file(&self, log_dir: &Path) -> Result<WorkerGuard> {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "notify-relay.log");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(self.env_filter())
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(fmt::layer().with_writer(file_writer).with_ansi(false))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

        tracing::debug!("Writing logs to {}", log_dir.display());
        Ok(guard)
    }
}
