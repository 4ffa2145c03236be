//! The scheduler.
//!
//! A [`Runner`] owns the registry and, once started:
//! - spawns one task per block ([`worker`]),
//! - renders through a single coalescing trigger ([`render`]),
//! - reads click events and turns them into mailbox deliveries ([`router`]),
//! - routes OS signals through the [`SignalDispatcher`].
//!
//! Lifecycle: `Idle -> Starting -> Running -> Stopping -> Stopped`.

mod render;
mod router;
mod worker;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::block::{Block, BlockContext};
use crate::config::RunnerConfig;
use crate::error::{ProtocolError, RegistryError, RunnerError};
use crate::protocol::{Decoder, Encoder, Header};
use crate::registry::Registry;
use crate::signals::{Delivery, Signal, SignalDispatcher};
use crate::state::Snapshot;

pub use render::{RenderRequests, RenderTrigger};
pub use worker::BlockEvent;

use router::Router;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Asks a running [`Runner`] to stop, exactly like SIGTERM would. A
/// second request while stopping aborts the drain.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl ShutdownHandle {
    pub fn request(&self) -> bool {
        self.tx.send(Delivery::Shutdown).is_ok()
    }
}

enum Drain {
    Clean,
    TimedOut,
    Interrupted,
}

pub struct Runner {
    config: RunnerConfig,
    registry: Arc<Registry>,
    state: watch::Sender<RunnerState>,
    control_tx: mpsc::UnboundedSender<Delivery>,
    control_rx: Option<mpsc::UnboundedReceiver<Delivery>>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("state", &self.state())
            .field("blocks", &self.registry.len())
            .finish()
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        let (state, _) = watch::channel(RunnerState::Idle);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        Self {
            config,
            registry: Arc::new(Registry::new()),
            state,
            control_tx,
            control_rx: Some(control_rx),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn state(&self) -> RunnerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.control_tx.clone(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn snapshots(&self) -> Vec<Arc<Snapshot>> {
        self.registry.snapshots()
    }

    /// Register a block, returning its instance id.
    pub fn register<B: Block>(
        &mut self,
        block: B,
        signals: impl IntoIterator<Item = Signal>,
    ) -> Result<String, RegistryError> {
        self.register_shared(Arc::new(block), signals)
    }

    /// Register a block the caller keeps a handle to. Registering the same
    /// `Arc` twice is a [`RegistryError::DuplicateRegistration`].
    pub fn register_shared(
        &mut self,
        block: Arc<dyn Block>,
        signals: impl IntoIterator<Item = Signal>,
    ) -> Result<String, RegistryError> {
        if self.state() != RunnerState::Idle {
            return Err(RegistryError::AlreadyStarted);
        }
        let registry = Arc::get_mut(&mut self.registry).ok_or(RegistryError::AlreadyStarted)?;
        let instance = registry.register(block, signals)?;

        if let Ok(entry) = registry.resolve(&instance) {
            info!(
                block = entry.name(),
                instance = %instance,
                signals = ?entry.signals(),
                "registered block"
            );
        }
        Ok(instance)
    }

    fn transition(&self, next: RunnerState) {
        let prev = self.state.send_replace(next);
        info!(from = ?prev, to = ?next, "runner state");
    }

    /// Run against the process's stdin/stdout.
    pub async fn run_stdio(&mut self) -> Result<(), RunnerError> {
        self.run(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Run until shutdown is requested and every block has stopped.
    pub async fn run<R, W>(&mut self, input: R, output: W) -> Result<(), RunnerError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let state = self.state();
        if state != RunnerState::Idle {
            return Err(RunnerError::InvalidState {
                action: "start",
                state,
            });
        }
        self.config.validate()?;
        let Some(mut control_rx) = self.control_rx.take() else {
            return Err(RunnerError::InvalidState {
                action: "start",
                state,
            });
        };
        self.transition(RunnerState::Starting);

        let registry = self.registry.clone();
        let blocks_cancel = CancellationToken::new();
        let render_cancel = CancellationToken::new();
        let io_cancel = CancellationToken::new();
        // Outlives Stopping so a second termination signal still gets through.
        let signals_cancel = CancellationToken::new();

        // 1. Signals
        let mut dispatcher = SignalDispatcher::new(registry.clone());
        if let Err(e) = dispatcher.install(
            self.config.termination_signals,
            self.control_tx.clone(),
            signals_cancel.clone(),
        ) {
            dispatcher.shutdown().await;
            self.transition(RunnerState::Stopped);
            return Err(e);
        }

        // 2. Header + the initial (default) line. A reader that never drains
        // stdout must not keep shutdown requests from being heard.
        let header = Header {
            click_events: self.config.click_events,
            stop_signal: self.config.stop_signal.map(Signal::as_raw),
            cont_signal: self.config.cont_signal.map(Signal::as_raw),
            ..Header::default()
        };
        let opening = open_stream(Encoder::new(output), header, registry.snapshots());
        tokio::pin!(opening);

        let encoder = tokio::select! {
            biased;
            opened = &mut opening => match opened {
                Ok(encoder) => encoder,
                Err(e) => {
                    signals_cancel.cancel();
                    dispatcher.shutdown().await;
                    self.transition(RunnerState::Stopped);
                    return Err(RunnerError::Output(e));
                }
            },
            _ = stop_requested(&mut control_rx) => {
                info!("shutdown requested before the status stream opened");
                self.transition(RunnerState::Stopping);
                let grace = self.config.shutdown_grace;
                let result = abandon_opening(opening, &mut control_rx, grace).await;
                signals_cancel.cancel();
                dispatcher.shutdown().await;
                self.transition(RunnerState::Stopped);
                return result;
            }
        };

        // 3. One task per block
        let (trigger, requests) = RenderTrigger::channel();
        let mut blocks = JoinSet::new();
        let mut mailboxes = Vec::with_capacity(registry.len());
        for entry in registry.entries() {
            let (tx, rx) = mpsc::channel(self.config.mailbox_capacity);
            mailboxes.push(tx);
            let ctx = BlockContext::new(entry.clone(), trigger.clone(), blocks_cancel.clone());
            blocks.spawn(worker::drive(entry.clone(), ctx, rx, blocks_cancel.clone()));
        }
        let router = Arc::new(Router::new(registry.clone(), mailboxes));

        // 4. Render loop and click reader
        let mut render = tokio::spawn(render::render_loop(
            registry.clone(),
            encoder,
            requests,
            self.config.coalesce_window,
            render_cancel.clone(),
        ));

        let input_task = self.config.click_events.then(|| {
            tokio::spawn(input_loop(
                Decoder::new(BufReader::new(input)),
                router.clone(),
                self.control_tx.clone(),
                self.config.exit_on_input_eof,
                io_cancel.clone(),
            ))
        });

        self.transition(RunnerState::Running);

        let mut render_result: Option<Result<(), RunnerError>> = None;
        loop {
            tokio::select! {
                delivery = control_rx.recv() => match delivery {
                    Some(Delivery::Block(sig)) => {
                        for entry in dispatcher.dispatch(sig) {
                            if let Err(e) = router.deliver(&entry, BlockEvent::Signal(sig)) {
                                warn!(signal = %sig, error = %e, "dropping signal");
                            }
                        }
                    }
                    Some(Delivery::Terminate(sig)) => {
                        info!(signal = %sig, "termination signal received");
                        break;
                    }
                    Some(Delivery::Shutdown) | None => {
                        info!("shutdown requested");
                        break;
                    }
                },
                joined = &mut render => {
                    let result = flatten_render(joined);
                    if let Err(e) = &result {
                        error!(error = %e, "render loop stopped");
                    }
                    render_result = Some(result);
                    break;
                }
            }
        }

        // Stopping: no new renders, flush what is pending, then cancel blocks.
        self.transition(RunnerState::Stopping);
        trigger.close();
        render_cancel.cancel();
        io_cancel.cancel();

        let grace = self.config.shutdown_grace;
        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);

        let mut drain = Drain::Clean;
        if render_result.is_none() {
            tokio::select! {
                biased;
                _ = stop_requested(&mut control_rx) => drain = Drain::Interrupted,
                _ = &mut deadline => drain = Drain::TimedOut,
                joined = &mut render => render_result = Some(flatten_render(joined)),
            }
        }

        blocks_cancel.cancel();
        if matches!(drain, Drain::Clean) {
            drain = loop {
                tokio::select! {
                    biased;
                    _ = stop_requested(&mut control_rx) => break Drain::Interrupted,
                    _ = &mut deadline => break Drain::TimedOut,
                    joined = blocks.join_next() => match joined {
                        None => break Drain::Clean,
                        Some(Err(e)) if e.is_panic() => warn!("block task panicked during shutdown"),
                        Some(_) => {}
                    },
                }
            };
        }

        if !matches!(drain, Drain::Clean) {
            blocks.abort_all();
            render.abort();
        }
        while blocks.join_next().await.is_some() {}
        if let Some(task) = input_task {
            task.abort();
        }
        signals_cancel.cancel();
        dispatcher.shutdown().await;
        self.transition(RunnerState::Stopped);

        match drain {
            Drain::Interrupted => {
                warn!("second termination request, abandoning shutdown");
                Err(RunnerError::Interrupted)
            }
            Drain::TimedOut => {
                warn!(?grace, "blocks did not stop in time");
                Err(RunnerError::ShutdownTimeout(grace))
            }
            Drain::Clean => render_result.unwrap_or(Ok(())),
        }
    }
}

fn flatten_render(joined: Result<Result<(), ProtocolError>, JoinError>) -> Result<(), RunnerError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RunnerError::Output(e)),
        Err(e) => Err(RunnerError::Output(ProtocolError::Io(std::io::Error::other(
            e.to_string(),
        )))),
    }
}

async fn open_stream<W>(
    mut encoder: Encoder<W>,
    header: Header,
    initial: Vec<Arc<Snapshot>>,
) -> Result<Encoder<W>, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    encoder.write_header(&header).await?;
    encoder.render(&initial).await?;
    Ok(encoder)
}

/// Stop requested while the header or first line was still being written.
/// No block task exists yet, so only the pending write has to settle.
async fn abandon_opening<F, W>(
    opening: Pin<&mut F>,
    control_rx: &mut mpsc::UnboundedReceiver<Delivery>,
    grace: Duration,
) -> Result<(), RunnerError>
where
    F: Future<Output = Result<Encoder<W>, ProtocolError>>,
    W: AsyncWrite + Unpin,
{
    let closing = async move {
        let mut encoder = opening.await?;
        encoder.finish().await
    };
    tokio::select! {
        biased;
        _ = stop_requested(control_rx) => {
            warn!("second termination request, abandoning shutdown");
            Err(RunnerError::Interrupted)
        }
        _ = tokio::time::sleep(grace) => {
            warn!(?grace, "status output did not drain in time");
            Err(RunnerError::ShutdownTimeout(grace))
        }
        closed = closing => closed.map_err(RunnerError::Output),
    }
}

/// Resolves on the next termination or shutdown request; block signals
/// arriving meanwhile are dropped.
async fn stop_requested(rx: &mut mpsc::UnboundedReceiver<Delivery>) {
    while let Some(delivery) = rx.recv().await {
        if !matches!(delivery, Delivery::Block(_)) {
            return;
        }
    }
    std::future::pending::<()>().await
}

async fn input_loop<R>(
    mut decoder: Decoder<R>,
    router: Arc<Router>,
    control: mpsc::UnboundedSender<Delivery>,
    exit_on_eof: bool,
    cancel: CancellationToken,
) where
    R: tokio::io::AsyncBufRead + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            next = decoder.next_event() => next,
        };

        match next {
            None => {
                info!("click input closed");
                if exit_on_eof {
                    let _ = control.send(Delivery::Shutdown);
                }
                return;
            }
            Some(Ok(click)) => {
                debug!(instance = ?click.instance, button = click.button, "click event");
                if let Err(e) = router.route_click(click) {
                    warn!(error = %e, "dropping click event");
                }
            }
            Some(Err(ProtocolError::Io(e))) => {
                warn!(error = %e, "click input failed");
                if exit_on_eof {
                    let _ = control.send(Delivery::Shutdown);
                }
                return;
            }
            Some(Err(e)) => warn!(error = %e, "skipping input line"),
        }
    }
}
