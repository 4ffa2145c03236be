//! The block capability contract.
//!
//! A block is anything that can produce a [`State`]. The runner owns the
//! scheduling; the block only says how often it wants to run
//! ([`Schedule`]) and what clicks and signals should do ([`Hooks`]).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::protocol::ClickEvent;
use crate::registry::Entry;
use crate::runner::RenderTrigger;
use crate::signals::Signal;
use crate::state::{Snapshot, State};

/// How a block decides its own cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Run at start, then again `period` after each run finishes.
    Every(Duration),
    /// Run once at start, then only on `Refresh` hooks.
    Once,
    /// Never run on its own.
    OnDemand,
}

/// What to do when an event reaches a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// Drop the event.
    Ignore,
    /// Run the block again.
    Refresh,
    /// Call the block's own handler.
    Custom,
}

/// Per-block dispatch table, read once at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hooks {
    pub click: Hook,
    pub signal: Hook,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            click: Hook::Ignore,
            signal: Hook::Refresh,
        }
    }
}

impl Hooks {
    pub fn click(mut self, hook: Hook) -> Self {
        self.click = hook;
        self
    }

    pub fn signal(mut self, hook: Hook) -> Self {
        self.signal = hook;
        self
    }
}

/// One independent source of status content.
#[async_trait]
pub trait Block: Send + Sync + 'static {
    /// Type tag emitted as the `name` field.
    fn name(&self) -> &str;

    /// Fields applied underneath every update.
    fn default_state(&self) -> State {
        State::default()
    }

    fn schedule(&self) -> Schedule {
        Schedule::Once
    }

    fn hooks(&self) -> Hooks {
        Hooks::default()
    }

    /// Produce fresh content through [`BlockContext::update`].
    async fn run(&self, ctx: &BlockContext) -> anyhow::Result<()>;

    /// Called for clicks when `hooks().click` is [`Hook::Custom`].
    async fn click_handler(&self, ctx: &BlockContext, click: &ClickEvent) -> anyhow::Result<()> {
        let _ = (ctx, click);
        Ok(())
    }

    /// Called for signals when `hooks().signal` is [`Hook::Custom`].
    async fn signal_handler(&self, ctx: &BlockContext, signal: Signal) -> anyhow::Result<()> {
        let _ = signal;
        self.run(ctx).await
    }
}

/// Handle a block uses to publish state. Cheap to clone.
#[derive(Clone)]
pub struct BlockContext {
    entry: Arc<Entry>,
    trigger: RenderTrigger,
    cancel: CancellationToken,
    aborted: Arc<AtomicBool>,
}

impl fmt::Debug for BlockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockContext")
            .field("name", &self.entry.name())
            .field("instance", &self.entry.instance())
            .finish()
    }
}

impl BlockContext {
    pub fn new(entry: Arc<Entry>, trigger: RenderTrigger, cancel: CancellationToken) -> Self {
        Self {
            entry,
            trigger,
            cancel,
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A context not attached to any runner. Updates land in the entry but
    /// never cause a render.
    pub fn detached(entry: Arc<Entry>) -> Self {
        Self::new(entry, RenderTrigger::disconnected(), CancellationToken::new())
    }

    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn instance(&self) -> &str {
        self.entry.instance()
    }

    /// Merge `partial` over the block defaults, publish it, and ask for a
    /// render.
    pub fn update(&self, partial: State) {
        self.entry.publish(self.entry.compose(partial));
        self.trigger.request();
    }

    pub(crate) fn request_render(&self) {
        self.trigger.request();
    }

    /// Publish a final state and stop scheduling this block.
    pub fn abort(&self, partial: State) {
        self.update(partial);
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// The snapshot currently on the bar.
    pub fn current(&self) -> Arc<Snapshot> {
        self.entry.snapshot()
    }

    /// Resolves when the runner starts shutting down.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
