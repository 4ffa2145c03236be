//! Error taxonomy for the runtime.
//!
//! Only setup-time errors ([`RegistryError`], [`ConfigError`], signal
//! installation) are meant to stop the process. Everything a block or the
//! input stream does wrong is recovered locally and only logged.

use std::time::Duration;

use thiserror::Error;

use crate::signals::Signal;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("block '{name}' is already registered as instance {instance}")]
    DuplicateRegistration { name: String, instance: String },

    #[error("block '{name}' cannot subscribe to {signal}: it is reserved for shutdown")]
    ReservedSignal { name: String, signal: Signal },

    #[error("blocks can only be registered before the runner starts")]
    AlreadyStarted,

    #[error("no block registered with instance '{0}'")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed click event {line:?}: {source}")]
    MalformedInputEvent {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode status line: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("protocol stream I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an event could not be delivered to a block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("click event carries no instance")]
    MissingInstance,

    #[error("no block with instance '{0}'")]
    UnresolvedInstance(String),

    #[error("block '{0}' is no longer running")]
    Errored(String),

    #[error("block '{0}' mailbox is full")]
    Busy(String),
}

/// A block hook that failed. Caught at the block task boundary and turned
/// into an error snapshot.
#[derive(Debug, Error)]
pub enum BlockFailure {
    #[error("{0}")]
    Failed(#[source] anyhow::Error),

    #[error("panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to install handler for {signal}: {source}")]
    Signal {
        signal: Signal,
        #[source]
        source: std::io::Error,
    },

    #[error("status output failed: {0}")]
    Output(#[source] ProtocolError),

    #[error("blocks did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("shutdown interrupted by a second termination request")]
    Interrupted,

    #[error("runner cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: crate::runner::RunnerState,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
