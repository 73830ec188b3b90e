// ── Serial operation queue ──
//
// FIFO, single-flight: one worker task drains an unbounded channel and
// awaits each operation to its terminal result (retries and refresh
// included) before dequeuing the next.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::CoreError;
use crate::operation::{Lifecycle, Operation, OperationHandle, StateObserver};

// ── Type-erased jobs ─────────────────────────────────────────────────

#[async_trait]
trait Job: Send {
    async fn run(self: Box<Self>, engine: &Engine);

    /// Complete without running. The completion hook is skipped.
    fn reject(self: Box<Self>, error: CoreError);
}

struct QueuedOperation<T> {
    op: Operation<T>,
    lifecycle: Arc<Lifecycle>,
    result_tx: oneshot::Sender<Result<T, CoreError>>,
}

impl<T> QueuedOperation<T> {
    fn deliver(mut self, result: Result<T, CoreError>) {
        let result = self.op.complete(result);
        self.lifecycle.finish();
        if self.result_tx.send(result).is_err() {
            debug!(
                id = self.lifecycle.id(),
                op = self.op.name(),
                "result dropped, handle no longer awaited"
            );
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Job for QueuedOperation<T> {
    async fn run(self: Box<Self>, engine: &Engine) {
        if !self.lifecycle.start() {
            debug!(id = self.lifecycle.id(), op = self.op.name(), "skipping cancelled operation");
            self.reject(CoreError::Cancelled);
            return;
        }

        let result = engine.execute(&self.op).await;
        (*self).deliver(result);
    }

    fn reject(mut self: Box<Self>, error: CoreError) {
        self.lifecycle.cancel();
        self.op.skip_completion();
        (*self).deliver(Err(error));
    }
}

// ── OperationQueue ───────────────────────────────────────────────────

/// Runs submitted operations one at a time, in submission order.
pub struct OperationQueue {
    tx: mpsc::UnboundedSender<Box<dyn Job>>,
    cancel: CancellationToken,
    next_id: AtomicU64,
    observer: Option<Arc<dyn StateObserver>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl OperationQueue {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn start(engine: Arc<Engine>) -> Self {
        Self::with_observer(engine, None)
    }

    pub fn with_observer(engine: Arc<Engine>, observer: Option<Arc<dyn StateObserver>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(worker_task(engine, rx, cancel.clone()));

        Self {
            tx,
            cancel,
            next_id: AtomicU64::new(1),
            observer,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueue `op`. The returned handle resolves once it has run.
    pub fn submit<T: Send + 'static>(&self, op: Operation<T>) -> OperationHandle<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let lifecycle = Arc::new(Lifecycle::new(id, op.name(), self.observer.clone()));
        let (result_tx, result_rx) = oneshot::channel();
        let handle = OperationHandle::new(Arc::clone(&lifecycle), result_rx);

        let job: Box<dyn Job> = Box::new(QueuedOperation {
            op,
            lifecycle,
            result_tx,
        });

        if self.cancel.is_cancelled() {
            job.reject(CoreError::queue_closed());
        } else if let Err(mpsc::error::SendError(job)) = self.tx.send(job) {
            job.reject(CoreError::queue_closed());
        } else {
            debug!(id, "operation queued");
        }
        handle
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the worker after the in-flight operation (if any) completes.
    /// Operations still queued complete with a "queue closed" error.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "queue worker panicked");
            }
        }
    }
}

impl Drop for OperationQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn worker_task(
    engine: Arc<Engine>,
    mut rx: mpsc::UnboundedReceiver<Box<dyn Job>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            job = rx.recv() => {
                let Some(job) = job else { break };
                job.run(&engine).await;
            }
        }
    }

    rx.close();
    let mut drained = 0_usize;
    while let Ok(job) = rx.try_recv() {
        job.reject(CoreError::queue_closed());
        drained += 1;
    }
    debug!(drained, "queue worker stopped");
}
