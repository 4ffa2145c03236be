//! Local time, refreshed every second.

use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use cadence_core::{Block, BlockContext, ClickEvent, Hook, Hooks, Schedule, State};
use chrono::Local;

pub const DEFAULT_FORMAT: &str = "%H:%M:%S";
pub const DEFAULT_ALT_FORMAT: &str = "%Y-%m-%d";

/// Shows the time. Any click flips between `format` and `alt_format`.
#[derive(Debug)]
pub struct ClockBlock {
    format: String,
    alt_format: String,
    period: Duration,
    showing_alt: AtomicBool,
}

impl Default for ClockBlock {
    fn default() -> Self {
        Self::new(DEFAULT_FORMAT, DEFAULT_ALT_FORMAT)
    }
}

impl ClockBlock {
    /// Both formats are `strftime` patterns as understood by chrono.
    pub fn new(format: impl Into<String>, alt_format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            alt_format: alt_format.into(),
            period: Duration::from_secs(1),
            showing_alt: AtomicBool::new(false),
        }
    }

    pub fn every(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn showing_alt(&self) -> bool {
        self.showing_alt.load(Ordering::Relaxed)
    }

    fn current_format(&self) -> &str {
        if self.showing_alt() {
            &self.alt_format
        } else {
            &self.format
        }
    }
}

#[async_trait]
impl Block for ClockBlock {
    fn name(&self) -> &str {
        "ClockBlock"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Every(self.period)
    }

    fn hooks(&self) -> Hooks {
        Hooks::default().click(Hook::Custom)
    }

    async fn run(&self, ctx: &BlockContext) -> anyhow::Result<()> {
        let format = self.current_format();
        let mut text = String::new();
        // chrono reports bad specifiers as a fmt::Error at display time.
        write!(text, "{}", Local::now().format(format))
            .map_err(|_| anyhow!("invalid time format {format:?}"))?;
        ctx.update(State::text(text));
        Ok(())
    }

    async fn click_handler(&self, ctx: &BlockContext, _click: &ClickEvent) -> anyhow::Result<()> {
        self.showing_alt.fetch_xor(true, Ordering::Relaxed);
        self.run(ctx).await
    }
}
