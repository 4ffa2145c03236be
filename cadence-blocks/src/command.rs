use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use cadence_core::{Block, BlockContext, Hook, Hooks, Schedule, State};
use tracing::{debug, warn};

use crate::threshold::threshold;

/// Runs a shell command on an interval and shows the first line it prints.
///
/// Commands are routed through `sh -c` so pipes, redirects and builtins
/// work. A non-zero exit marks the block urgent. Clicks and signals both
/// run the command immediately.
#[derive(Debug, Clone)]
pub struct CommandBlock {
    command: String,
    period: Duration,
    colors: Vec<(f64, Option<&'static str>)>,
}

impl CommandBlock {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            period: Duration::from_secs(5),
            colors: Vec::new(),
        }
    }

    pub fn every(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Color the output by its first number, see [`threshold`].
    pub fn colored(mut self, colors: impl IntoIterator<Item = (f64, Option<&'static str>)>) -> Self {
        self.colors = colors.into_iter().collect();
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn color_for(&self, line: &str) -> Option<&'static str> {
        let value: f64 = line.split_whitespace().next()?.parse().ok()?;
        threshold(&self.colors, value).copied().flatten()
    }
}

#[async_trait]
impl Block for CommandBlock {
    fn name(&self) -> &str {
        "CommandBlock"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Every(self.period)
    }

    fn hooks(&self) -> Hooks {
        Hooks::default().click(Hook::Refresh).signal(Hook::Refresh)
    }

    async fn run(&self, ctx: &BlockContext) -> Result<()> {
        let trimmed = self.command.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("Empty command"));
        }

        debug!(command = trimmed, "running command");

        // Dropping the future (shutdown) kills the child.
        let output = tokio::process::Command::new("sh")
            .args(["-c", trimmed])
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().next().unwrap_or_default().trim();

        let mut state = State::text(line).with_optional_color(self.color_for(line));
        if !output.status.success() {
            warn!(
                command = trimmed,
                code = output.status.code().unwrap_or(-1),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "command failed"
            );
            state = state.with_urgent(true);
        }

        ctx.update(state);
        Ok(())
    }
}
