//! Send notification handler
//!
//! Sends one message to the configured server and turns the classified
//! sender result into the process exit status.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::debug;

use super::super::args::send_timeout;
use super::super::CliContext;
use crate::config::{ClientSettings, ConfigProvider};
use crate::errors::{RelayError, RelayResult};
use crate::shared::sender::MessageSender;
use crate::shared::transport::validate_port;

/// Destination of an outgoing message after overrides are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn resolve(
        settings: ClientSettings,
        host: Option<String>,
        port: Option<u32>,
    ) -> RelayResult<Self> {
        let port = validate_port(port.unwrap_or(settings.server_port))?;
        Ok(Self {
            host: host.unwrap_or(settings.server_ip),
            port,
        })
    }
}

/// Handler for send operations
pub struct SendHandler<'a> {
    context: &'a CliContext,
}

impl<'a> SendHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    /// Load client settings and resolve the destination
    pub fn destination(&self, host: Option<String>, port: Option<u32>) -> RelayResult<Destination> {
        let settings: ClientSettings = self.context.config_manager.load()?;
        Destination::resolve(settings, host, port)
    }

    /// Send `message` and report the outcome on stdout
    pub async fn deliver(
        &self,
        message: &str,
        destination: &Destination,
        timeout: Duration,
    ) -> RelayResult<String> {
        if message.is_empty() {
            return Err(RelayError::EmptyMessage);
        }

        println!(
            "Sending message to {}:{}...",
            destination.host, destination.port
        );
        let ack = MessageSender::with_timeout(timeout)
            .send(message, &destination.host, destination.port)
            .await?;
        debug!("Server acknowledged: {}", ack);
        println!("Message sent successfully");
        Ok(ack)
    }

    /// Handle the send command
    pub async fn handle_send(
        &self,
        message: String,
        host: Option<String>,
        port: Option<u32>,
        timeout: f64,
    ) -> Result<()> {
        let bound = send_timeout(timeout)?;
        let destination = self.destination(host, port)?;
        self.deliver(&message, &destination, bound)
            .await
            .map(|_| ())
            .context("Send failed")
    }
}
