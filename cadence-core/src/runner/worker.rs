//! The task that drives one block.
//!
//! Runs, clicks and signals for a block all happen inside this one task,
//! so two handlers of the same block never overlap. A custom handler that
//! arrives during a run waits for the run to finish. A failure anywhere is
//! caught here and parks the block in `Errored`.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::block::{BlockContext, Hook, Schedule};
use crate::error::BlockFailure;
use crate::protocol::ClickEvent;
use crate::registry::{BlockStatus, Entry};
use crate::signals::Signal;

/// Events queued in a block's mailbox.
#[derive(Debug, Clone)]
pub enum BlockEvent {
    Click(ClickEvent),
    Signal(Signal),
}

type Guarded<'a> = BoxFuture<'a, Result<(), BlockFailure>>;

/// Catch both `Err` and panics from a block hook.
fn guarded<'a>(hook: BoxFuture<'a, anyhow::Result<()>>) -> Guarded<'a> {
    Box::pin(async move {
        match AssertUnwindSafe(hook).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BlockFailure::Failed(e)),
            Err(payload) => Err(BlockFailure::Panicked(panic_message(payload.as_ref()))),
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string panic payload>".to_string())
}

async fn poll_slot<F>(slot: &mut Option<F>) -> F::Output
where
    F: Future + Unpin,
{
    match slot {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn fail(entry: &Entry, ctx: &BlockContext, failure: BlockFailure) {
    error!(
        block = entry.name(),
        instance = entry.instance(),
        error = %failure,
        "block failed"
    );
    entry.publish(entry.error_snapshot(&failure));
    entry.set_status(BlockStatus::Errored);
    ctx.request_render();
}

enum Flow {
    Continue,
    Cancelled,
    Done,
}

async fn run_custom(
    entry: &Entry,
    ctx: &BlockContext,
    event: &BlockEvent,
    cancel: &CancellationToken,
) -> Flow {
    let block = entry.block();
    let handler = match event {
        BlockEvent::Click(click) => guarded(block.click_handler(ctx, click)),
        BlockEvent::Signal(sig) => guarded(block.signal_handler(ctx, *sig)),
    };
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Flow::Cancelled,
        outcome = handler => outcome,
    };
    if let Err(failure) = outcome {
        fail(entry, ctx, failure);
        return Flow::Done;
    }
    if ctx.is_aborted() {
        info!(block = entry.name(), instance = entry.instance(), "block finished");
        entry.set_status(BlockStatus::Finished);
        return Flow::Done;
    }
    Flow::Continue
}

pub(crate) async fn drive(
    entry: Arc<Entry>,
    ctx: BlockContext,
    mut mailbox: mpsc::Receiver<BlockEvent>,
    cancel: CancellationToken,
) {
    let block = entry.block().clone();
    let hooks = entry.hooks();
    let schedule = entry.schedule();

    entry.set_status(BlockStatus::Active);
    debug!(block = entry.name(), instance = entry.instance(), ?schedule, "block task started");

    let mut running: Option<Guarded<'_>> = match schedule {
        Schedule::Every(_) | Schedule::Once => Some(guarded(block.run(&ctx))),
        Schedule::OnDemand => None,
    };
    let mut next_tick: Option<Instant> = None;
    let mut rerun = false;
    // A custom handler that arrived mid-run. It goes after the run so the
    // run's last update cannot overwrite the handler's.
    let mut deferred: Option<BlockEvent> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            outcome = poll_slot(&mut running) => {
                running = None;
                if let Err(failure) = outcome {
                    fail(&entry, &ctx, failure);
                    return;
                }
                if ctx.is_aborted() {
                    info!(block = entry.name(), instance = entry.instance(), "block finished");
                    entry.set_status(BlockStatus::Finished);
                    return;
                }
                if let Some(event) = deferred.take() {
                    match run_custom(&entry, &ctx, &event, &cancel).await {
                        Flow::Continue => {}
                        Flow::Cancelled => break,
                        Flow::Done => return,
                    }
                }
                if std::mem::take(&mut rerun) {
                    running = Some(guarded(block.run(&ctx)));
                } else if let Schedule::Every(period) = schedule {
                    next_tick = Some(Instant::now() + period);
                }
            }

            _ = wait_until(next_tick), if running.is_none() => {
                next_tick = None;
                running = Some(guarded(block.run(&ctx)));
            }

            event = mailbox.recv(), if deferred.is_none() => {
                let Some(event) = event else { break };

                let hook = match &event {
                    BlockEvent::Click(_) => hooks.click,
                    BlockEvent::Signal(_) => hooks.signal,
                };

                match hook {
                    Hook::Ignore => {
                        debug!(block = entry.name(), ?event, "event ignored");
                    }
                    Hook::Refresh => {
                        if running.is_some() {
                            rerun = true;
                        } else {
                            next_tick = None;
                            running = Some(guarded(block.run(&ctx)));
                        }
                    }
                    Hook::Custom if running.is_some() => {
                        debug!(block = entry.name(), ?event, "event waits for the current run");
                        deferred = Some(event);
                    }
                    Hook::Custom => match run_custom(&entry, &ctx, &event, &cancel).await {
                        Flow::Continue => {}
                        Flow::Cancelled => break,
                        Flow::Done => return,
                    },
                }
            }
        }
    }

    debug!(block = entry.name(), instance = entry.instance(), "block task cancelled");
}
