//! Render trigger and the single-writer render loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::ProtocolError;
use crate::protocol::Encoder;
use crate::registry::Registry;

/// Posts re-render requests. Backed by a one-slot channel: when the slot
/// is taken a render is already pending, so the request folds into it.
#[derive(Debug, Clone)]
pub struct RenderTrigger {
    tx: mpsc::Sender<()>,
    open: Arc<AtomicBool>,
}

impl RenderTrigger {
    pub fn channel() -> (RenderTrigger, RenderRequests) {
        let (tx, rx) = mpsc::channel(1);
        let trigger = RenderTrigger {
            tx,
            open: Arc::new(AtomicBool::new(true)),
        };
        (trigger, RenderRequests { rx, pending: false })
    }

    /// A trigger nobody listens to.
    pub fn disconnected() -> Self {
        let (trigger, _requests) = Self::channel();
        trigger
    }

    /// Ask for a render. Returns `false` if the request went nowhere
    /// (trigger closed or no render loop).
    pub fn request(&self) -> bool {
        if !self.open.load(Ordering::Acquire) {
            return false;
        }
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => false,
        }
    }

    /// Stop accepting requests. Shared by every clone.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Receiving half of a [`RenderTrigger`].
#[derive(Debug)]
pub struct RenderRequests {
    rx: mpsc::Receiver<()>,
    pending: bool,
}

impl RenderRequests {
    /// Wait for a request, let the burst settle for `window`, and swallow
    /// whatever else arrived meanwhile. Returns `false` once every trigger
    /// is gone.
    pub async fn next_burst(&mut self, window: Duration) -> bool {
        if !self.pending {
            if self.rx.recv().await.is_none() {
                return false;
            }
            self.pending = true;
        }
        if !window.is_zero() {
            tokio::time::sleep(window).await;
        }
        while self.rx.try_recv().is_ok() {}
        self.pending = false;
        true
    }

    /// Whether a request is waiting, consuming it.
    pub fn take_pending(&mut self) -> bool {
        let mut pending = std::mem::take(&mut self.pending);
        while self.rx.try_recv().is_ok() {
            pending = true;
        }
        pending
    }
}

/// Owns the encoder for the whole run. Renders once per burst until
/// `cancel` fires, then flushes one last line if a request was pending.
pub(crate) async fn render_loop<W>(
    registry: Arc<Registry>,
    mut encoder: Encoder<W>,
    mut requests: RenderRequests,
    window: Duration,
    cancel: CancellationToken,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            more = requests.next_burst(window) => {
                if !more {
                    break;
                }
                encoder.render(&registry.snapshots()).await?;
                trace!(lines = encoder.lines_written(), "rendered");
            }
        }
    }

    if requests.take_pending() {
        debug!("flushing pending render");
        encoder.render(&registry.snapshots()).await?;
    }
    encoder.finish().await
}
