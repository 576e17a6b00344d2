//! The stage trait and the task combinator that drives it.
//!
//! [`spawn_stage`] owns the receive loop, cancellation checks and the send
//! into the next bounded channel; a [`Stage`] only decides what happens to
//! one item. A full downstream channel blocks the sender, which is the
//! pipeline's backpressure.

use async_trait::async_trait;
use sb_core::{Error, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::item::WorkItem;

/// Capacity of every channel between stages.
pub const CHANNEL_CAPACITY: usize = 64;

/// One step of the sync pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in logs and pipeline errors.
    fn name(&self) -> &'static str;

    /// Handle one item.
    ///
    /// `Ok(Some)` passes the item on, `Ok(None)` drops it from this run and
    /// `Err` is fatal: the run is cancelled.
    async fn process(&self, item: WorkItem) -> Result<Option<WorkItem>>;
}

/// Run `stage` as its own task between `rx` and a new bounded channel.
///
/// Returns the receiving end of the new channel and the task handle. The
/// task ends when its input closes or the run is cancelled; on a fatal
/// error it cancels `cancel` and returns the error.
pub fn spawn_stage<S>(
    stage: S,
    mut rx: mpsc::Receiver<WorkItem>,
    cancel: CancellationToken,
) -> (mpsc::Receiver<WorkItem>, JoinHandle<Result<()>>)
where
    S: Stage + 'static,
{
    let (tx, out) = mpsc::channel(CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        let name = stage.name();
        loop {
            if cancel.is_cancelled() {
                tracing::debug!(stage = name, "stage cancelled");
                break;
            }

            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(item) => item,
                    None => break,
                },
            };

            match stage.process(item).await {
                Ok(Some(item)) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        sent = tx.send(item) => {
                            if sent.is_err() {
                                cancel.cancel();
                                return Err(Error::pipeline(name, "downstream channel closed"));
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(stage = name, error = %e, "stage failed");
                    cancel.cancel();
                    return Err(e);
                }
            }
        }
        Ok(())
    });

    (out, handle)
}

/// Drain the last channel so every upstream stage can finish.
pub fn spawn_sink(
    mut rx: mpsc::Receiver<WorkItem>,
    cancel: CancellationToken,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = rx.recv() => {
                    if next.is_none() {
                        break;
                    }
                }
            }
        }
        Ok(())
    })
}
