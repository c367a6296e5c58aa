//! Run-and-notify handler
//!
//! Executes a shell command, passes its output through, and sends a
//! completion notification with the elapsed time. The exit status follows
//! the command, not the notification.

use anyhow::{Context, Result};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::super::CliContext;
use super::send::SendHandler;
use crate::shared::protocol::DEFAULT_SEND_TIMEOUT;

/// Handler for run operations
pub struct RunHandler<'a> {
    context: &'a CliContext,
}

impl<'a> RunHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    pub async fn handle_run(&self, command: Vec<String>) -> Result<()> {
        let command_line = command.join(" ");
        println!("Running: {command_line}");

        let started = Instant::now();
        let mut child = shell_command(&command_line)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute command: {command_line}"))?;

        // Echo stderr live while keeping a copy for the failure message.
        let collector = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut captured = String::new();
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    eprintln!("{line}");
                    captured.push_str(&line);
                    captured.push('\n');
                }
                captured
            })
        });

        let status = child
            .wait()
            .await
            .with_context(|| format!("Failed to wait for command: {command_line}"))?;
        let captured = match collector {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        let elapsed = started.elapsed();
        let success = status.success();
        println!(
            "Command {} after {:.2}s",
            if success { "succeeded" } else { "failed" },
            elapsed.as_secs_f64()
        );

        let message = completion_message(&command_line, success, elapsed, &captured);
        self.notify(&message).await;

        if success {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Command exited with {status}"))
        }
    }

    /// Best-effort notification; failures are reported, never propagated
    async fn notify(&self, message: &str) {
        let sender = SendHandler::new(self.context);
        let result = match sender.destination(None, None) {
            Ok(destination) => sender.deliver(message, &destination, DEFAULT_SEND_TIMEOUT).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!("Notification not delivered ({}): {}", e.kind(), e);
            println!("Send failed: {e}");
        } else {
            debug!("Completion notification delivered");
        }
    }
}

#[cfg(unix)]
fn shell_command(command_line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(command_line);
    command
}

#[cfg(windows)]
fn shell_command(command_line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(command_line);
    command
}

/// Notification text for a finished command
pub fn completion_message(
    command_line: &str,
    success: bool,
    elapsed: Duration,
    stderr: &str,
) -> String {
    let took = format!("{:.2}s", elapsed.as_secs_f64());
    if success {
        format!("Command finished: {command_line} (took {took})")
    } else {
        format!(
            "Command failed: {command_line} (took {took})\nError: {}",
            stderr.trim_end()
        )
    }
}
