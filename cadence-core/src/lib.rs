pub mod block;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod runner;
pub mod signals;
pub mod state;

// Re-export the main struct so users can just use `cadence_core::Runner`
pub use runner::{RenderTrigger, Runner, RunnerState, ShutdownHandle};

pub use block::{Block, BlockContext, Hook, Hooks, Schedule};
pub use config::RunnerConfig;
pub use error::{
    BlockFailure, ConfigError, ProtocolError, RegistryError, RouteError, RunnerError,
};
pub use protocol::{ClickEvent, MouseButton};
pub use registry::{BlockStatus, Entry, Registry};
pub use signals::Signal;
pub use state::{Align, Color, Markup, MinWidth, Snapshot, State};

// Blocks implement the trait with this attribute.
pub use async_trait::async_trait;
