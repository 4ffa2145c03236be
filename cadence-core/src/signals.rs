//! OS signal plumbing.
//!
//! The [`SignalDispatcher`] owns one tokio signal stream per signal any
//! block subscribed to, plus the termination signals. Streams are polled
//! as ordinary tasks on the runtime, so block handlers never run in raw
//! signal-handler context.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::RunnerError;
use crate::registry::{Entry, Registry};

/// A raw OS signal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signal(i32);

impl Signal {
    pub const HUP: Signal = Signal(libc::SIGHUP);
    pub const INT: Signal = Signal(libc::SIGINT);
    pub const TERM: Signal = Signal(libc::SIGTERM);
    pub const USR1: Signal = Signal(libc::SIGUSR1);
    pub const USR2: Signal = Signal(libc::SIGUSR2);

    /// Signals that stop the runner. Blocks cannot subscribe to these.
    pub const TERMINATION: [Signal; 2] = [Signal::INT, Signal::TERM];

    pub const fn from_raw(signum: i32) -> Self {
        Signal(signum)
    }

    /// `SIGRTMIN + offset`, the usual way to give each block its own signal.
    pub fn realtime(offset: i32) -> Self {
        Signal(libc::SIGRTMIN() + offset)
    }

    pub const fn as_raw(self) -> i32 {
        self.0
    }

    pub fn is_termination(self) -> bool {
        Self::TERMINATION.contains(&self)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            libc::SIGHUP => f.write_str("SIGHUP"),
            libc::SIGINT => f.write_str("SIGINT"),
            libc::SIGTERM => f.write_str("SIGTERM"),
            libc::SIGUSR1 => f.write_str("SIGUSR1"),
            libc::SIGUSR2 => f.write_str("SIGUSR2"),
            n if n >= libc::SIGRTMIN() && n <= libc::SIGRTMAX() => {
                write!(f, "SIGRTMIN+{}", n - libc::SIGRTMIN())
            }
            n => write!(f, "signal {}", n),
        }
    }
}

/// What the dispatcher reports upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A block signal arrived; route it to subscribers.
    Block(Signal),
    /// A termination signal arrived.
    Terminate(Signal),
    /// Shutdown asked for from inside the process.
    Shutdown,
}

/// Routes OS signals to the registry entries subscribed to them.
pub struct SignalDispatcher {
    registry: Arc<Registry>,
    watched: BTreeSet<Signal>,
    tasks: JoinSet<()>,
}

impl fmt::Debug for SignalDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalDispatcher")
            .field("watched", &self.watched)
            .finish()
    }
}

impl SignalDispatcher {
    /// Dispatcher with no OS hooks installed yet.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            watched: BTreeSet::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Install OS handlers for every subscribed signal (and, if asked, the
    /// termination signals). Each arrival is forwarded into `tx`.
    pub fn install(
        &mut self,
        with_termination: bool,
        tx: mpsc::UnboundedSender<Delivery>,
        cancel: CancellationToken,
    ) -> Result<(), RunnerError> {
        let mut wanted = self.registry.signals();
        if with_termination {
            wanted.extend(Signal::TERMINATION);
        }

        for sig in wanted {
            let mut stream = signal(SignalKind::from_raw(sig.as_raw()))
                .map_err(|source| RunnerError::Signal { signal: sig, source })?;
            let tx = tx.clone();
            let cancel = cancel.clone();

            self.tasks.spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        got = stream.recv() => {
                            if got.is_none() {
                                break;
                            }
                            let delivery = if sig.is_termination() {
                                Delivery::Terminate(sig)
                            } else {
                                Delivery::Block(sig)
                            };
                            if tx.send(delivery).is_err() {
                                break;
                            }
                        }
                    }
                }
            });
            self.watched.insert(sig);
        }

        info!(signals = ?self.watched, "signal handlers installed");
        Ok(())
    }

    /// Signals with an installed OS handler.
    pub fn watched(&self) -> &BTreeSet<Signal> {
        &self.watched
    }

    /// Entries that should see `sig`, in registration order.
    pub fn dispatch(&self, sig: Signal) -> Vec<Arc<Entry>> {
        let targets = self.registry.subscribers(sig);
        debug!(signal = %sig, targets = targets.len(), "dispatching signal");
        targets
    }

    /// Drop every OS stream task.
    pub async fn shutdown(mut self) {
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
    }
}
