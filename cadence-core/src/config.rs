use std::time::Duration;

use crate::error::ConfigError;
use crate::signals::Signal;

pub const ENV_COALESCE_MS: &str = "CADENCE_COALESCE_MS";
pub const ENV_SHUTDOWN_GRACE_MS: &str = "CADENCE_SHUTDOWN_GRACE_MS";
pub const ENV_MAILBOX_CAPACITY: &str = "CADENCE_MAILBOX_CAPACITY";

/// Runner tunables.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// How long the render loop waits after the first request of a burst
    /// before emitting, so simultaneous updates share one line.
    pub coalesce_window: Duration,
    /// Deadline for block tasks to wind down once shutdown starts.
    pub shutdown_grace: Duration,
    /// Pending click/signal events each block may queue.
    pub mailbox_capacity: usize,
    /// Advertise and read click events.
    pub click_events: bool,
    /// Stop on SIGINT/SIGTERM.
    pub termination_signals: bool,
    /// Treat a closed input stream as a shutdown request.
    pub exit_on_input_eof: bool,
    /// Advertised in the header so the bar pauses us with this signal.
    pub stop_signal: Option<Signal>,
    pub cont_signal: Option<Signal>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            coalesce_window: Duration::from_millis(10),
            shutdown_grace: Duration::from_secs(2),
            mailbox_capacity: 32,
            click_events: true,
            termination_signals: true,
            exit_on_input_eof: false,
            stop_signal: None,
            cont_signal: None,
        }
    }
}

impl RunnerConfig {
    /// Defaults, overridden by `CADENCE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RunnerConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_COALESCE_MS) {
            config.coalesce_window = Duration::from_millis(parse_number(ENV_COALESCE_MS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_SHUTDOWN_GRACE_MS) {
            config.shutdown_grace =
                Duration::from_millis(parse_number(ENV_SHUTDOWN_GRACE_MS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_MAILBOX_CAPACITY) {
            config.mailbox_capacity = parse_number(ENV_MAILBOX_CAPACITY, &raw)? as usize;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the runner cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_MAILBOX_CAPACITY,
                value: self.mailbox_capacity.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_number(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
