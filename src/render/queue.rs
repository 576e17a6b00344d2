//! Multi-worker derivative render queue.
//!
//! Jobs are keyed; a key that is already queued or being rendered cannot be
//! submitted again until its job finishes. Workers pop jobs in FIFO order
//! and exit once the queue is closed and drained, or on cancellation.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sb_core::config::DerivativeConfig;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::focus::Focus;

/// One image to render, with every derivative it needs.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// De-duplication key, normally the image id.
    pub key: String,
    pub source: PathBuf,
    /// Clockwise rotation in degrees applied before resizing.
    pub rotation: i32,
    /// Crop anchor in the source's stored orientation.
    pub focus: Focus,
    pub tasks: Vec<DerivativeConfig>,
}

/// Does the actual work for one job.
#[async_trait]
pub trait RenderStep: Send + Sync {
    async fn render(&self, job: &RenderJob) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("invalid render job: {0}")]
    Validation(String),
    #[error("render queue is closed")]
    Closed,
    #[error("render job already pending: {0}")]
    Duplicate(String),
}

#[derive(Default)]
struct State {
    jobs: VecDeque<RenderJob>,
    /// Keys that are queued or executing.
    pending: HashSet<String>,
    closed: bool,
}

pub struct RenderQueue {
    state: Mutex<State>,
    wakeup: Notify,
    step: Arc<dyn RenderStep>,
    workers: usize,
}

impl RenderQueue {
    /// A queue served by `workers` workers once [`run`](Self::run) is
    /// called. Zero is treated as one.
    pub fn new(step: Arc<dyn RenderStep>, workers: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            wakeup: Notify::new(),
            step,
            workers: workers.max(1),
        }
    }

    pub fn submit(&self, job: RenderJob) -> Result<(), QueueError> {
        if job.key.trim().is_empty() {
            return Err(QueueError::Validation("empty job key".into()));
        }
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            if !state.pending.insert(job.key.clone()) {
                return Err(QueueError::Duplicate(job.key));
            }
            tracing::debug!(key = %job.key, tasks = job.tasks.len(), "render job queued");
            state.jobs.push_back(job);
        }
        self.wakeup.notify_one();
        Ok(())
    }

    /// Stop accepting jobs and wake every idle worker. Jobs already queued
    /// are still rendered.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.wakeup.notify_waiters();
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.state.lock().pending.contains(key)
    }

    /// Number of jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.state.lock().jobs.len()
    }

    /// Serve the queue until it is closed and drained, or `cancel` fires.
    /// Cancellation drops the jobs still waiting and frees their keys.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let handles: Vec<_> = (0..self.workers)
            .map(|worker| {
                let queue = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { queue.work(worker, cancel).await })
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "render worker panicked");
            }
        }
        if cancel.is_cancelled() {
            let mut state = self.state.lock();
            let dropped = state.jobs.len();
            state.jobs.clear();
            state.pending.clear();
            if dropped > 0 {
                tracing::info!(dropped, "render queue cancelled with jobs waiting");
            }
        }
        tracing::debug!("render queue stopped");
    }

    async fn work(&self, worker: usize, cancel: CancellationToken) {
        while let Some(job) = self.next(&cancel).await {
            tracing::info!(worker, key = %job.key, "rendering");
            if let Err(e) = self.step.render(&job).await {
                tracing::error!(worker, key = %job.key, error = %e, "render failed");
            }
            self.state.lock().pending.remove(&job.key);
        }
    }

    async fn next(&self, cancel: &CancellationToken) -> Option<RenderJob> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            // Register interest before looking at the state so a wakeup
            // between the check and the await is not lost.
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(job) = state.jobs.pop_front() {
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = &mut notified => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Blocks every render until a permit is released.
    struct Gate {
        permits: Semaphore,
        started: Notify,
        done: AtomicUsize,
        fail: bool,
    }

    impl Gate {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                permits: Semaphore::new(0),
                started: Notify::new(),
                done: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl RenderStep for Gate {
        async fn render(&self, _job: &RenderJob) -> anyhow::Result<()> {
            self.started.notify_one();
            self.permits.acquire().await?.forget();
            self.done.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("decoder exploded");
            }
            Ok(())
        }
    }

    fn job(key: &str) -> RenderJob {
        RenderJob {
            key: key.into(),
            source: PathBuf::from("/srv/photos/a.jpg"),
            rotation: 0,
            focus: Focus::CENTER,
            tasks: Vec::new(),
        }
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected_until_done() {
        let gate = Gate::new(false);
        let queue = Arc::new(RenderQueue::new(gate.clone(), 1));
        let runner = tokio::spawn(queue.clone().run(CancellationToken::new()));

        queue.submit(job("img-1")).unwrap();
        gate.started.notified().await;

        // Executing.
        assert_eq!(
            queue.submit(job("img-1")),
            Err(QueueError::Duplicate("img-1".into()))
        );
        // Queued behind it.
        queue.submit(job("img-2")).unwrap();
        assert_matches!(queue.submit(job("img-2")), Err(QueueError::Duplicate(_)));

        gate.permits.add_permits(2);
        wait_until(|| !queue.is_pending("img-1") && !queue.is_pending("img-2")).await;

        queue.submit(job("img-1")).unwrap();
        gate.permits.add_permits(1);
        queue.close();
        runner.await.unwrap();
        assert_eq!(gate.done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejects_empty_key_and_closed_queue() {
        let queue = RenderQueue::new(Gate::new(false), 1);
        assert_matches!(queue.submit(job("  ")), Err(QueueError::Validation(_)));
        queue.close();
        assert_eq!(queue.submit(job("img-1")), Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn close_wakes_idle_workers() {
        let queue = Arc::new(RenderQueue::new(Gate::new(false), 4));
        let runner = tokio::spawn(queue.clone().run(CancellationToken::new()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();
        tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn queued_jobs_drain_after_close() {
        let gate = Gate::new(false);
        let queue = Arc::new(RenderQueue::new(gate.clone(), 2));
        for i in 0..5 {
            queue.submit(job(&format!("img-{i}"))).unwrap();
        }
        queue.close();
        gate.permits.add_permits(5);
        queue.clone().run(CancellationToken::new()).await;
        assert_eq!(gate.done.load(Ordering::SeqCst), 5);
        assert_eq!(queue.queued(), 0);
    }

    #[tokio::test]
    async fn failing_step_frees_the_key() {
        let gate = Gate::new(true);
        let queue = Arc::new(RenderQueue::new(gate.clone(), 1));
        let runner = tokio::spawn(queue.clone().run(CancellationToken::new()));

        queue.submit(job("img-1")).unwrap();
        gate.permits.add_permits(1);
        wait_until(|| !queue.is_pending("img-1")).await;
        queue.submit(job("img-1")).unwrap();

        gate.permits.add_permits(1);
        queue.close();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_stops_workers() {
        let queue = Arc::new(RenderQueue::new(Gate::new(false), 2));
        let cancel = CancellationToken::new();
        let runner = tokio::spawn(queue.clone().run(cancel.clone()));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn cancellation_drops_waiting_jobs() {
        let gate = Gate::new(false);
        let queue = Arc::new(RenderQueue::new(gate.clone(), 1));
        for i in 0..3 {
            queue.submit(job(&format!("img-{i}"))).unwrap();
        }
        let cancel = CancellationToken::new();
        cancel.cancel();
        queue.clone().run(cancel).await;

        assert_eq!(gate.done.load(Ordering::SeqCst), 0);
        assert_eq!(queue.queued(), 0);
        assert!(!queue.is_pending("img-0"));
        // Keys can be submitted again to a later run.
        queue.submit(job("img-0")).unwrap();
    }
}
