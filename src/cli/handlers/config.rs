//! Client configuration handler
//!
//! Shows or updates the server address used by `send` and `run`.

use anyhow::{Context, Result};

use super::super::CliContext;
use crate::config::{ClientSettings, ConfigProvider};

/// Handler for configuration operations
pub struct ConfigHandler<'a> {
    context: &'a CliContext,
}

impl<'a> ConfigHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    /// Without arguments print the current settings; otherwise merge the
    /// given values into them and save.
    pub fn handle_config(&self, ip: Option<String>, port: Option<u32>) -> Result<()> {
        let config_manager = &self.context.config_manager;
        let mut settings: ClientSettings = config_manager.load()?;

        if ip.is_none() && port.is_none() {
            println!("Current configuration:");
            println!("  Server IP: {}", settings.server_ip);
            println!("  Server port: {}", settings.server_port);
            println!(
                "  Config file: {}",
                config_manager.client_config_path().display()
            );
            return Ok(());
        }

        if let Some(ip) = ip {
            settings.server_ip = ip;
        }
        if let Some(port) = port {
            settings.server_port = port;
        }

        config_manager
            .save(&settings)
            .context("Unable to save configuration")?;
        println!(
            "Configuration saved: server {}:{}",
            settings.server_ip, settings.server_port
        );
        Ok(())
    }
}
