//! Automatic continuation: forwarding resolved results downstream.
//!
//! When a still-pending handle is forwarded to another body, the local pool
//! registers that body as a continuation target. Once the result arrives, a
//! [`ContinuationBatch`] (result plus remaining targets) is queued here and a
//! single worker thread pushes it out in FIFO order. One unreachable target
//! never blocks the rest of a batch or the batches behind it.
//!
//! Shutdown distinguishes dropping the backlog, handing it back for adoption
//! by a successor dispatcher (body relocation), and flushing it first.

use crate::metrics::RuntimeMetrics;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, trace, warn};
use transport::{ReplyEnvelope, ReplySender};
use types::RemoteBody;

/// One resolved result plus the holders it still has to reach.
#[derive(Debug)]
pub struct ContinuationBatch {
    targets: Vec<RemoteBody>,
    reply: ReplyEnvelope,
}

impl ContinuationBatch {
    pub fn new(targets: Vec<RemoteBody>, reply: ReplyEnvelope) -> Self {
        Self { targets, reply }
    }

    pub fn targets(&self) -> &[RemoteBody] {
        &self.targets
    }

    pub fn reply(&self) -> &ReplyEnvelope {
        &self.reply
    }

    pub fn into_parts(self) -> (Vec<RemoteBody>, ReplyEnvelope) {
        (self.targets, self.reply)
    }
}

/// How to wind the dispatcher down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Stop now and drop anything still queued.
    Discard,
    /// Stop now and hand the queued batches back for adoption elsewhere.
    Preserve,
    /// Keep forwarding until the queue is empty, then stop.
    Flush,
}

struct QueueState {
    queue: VecDeque<ContinuationBatch>,
    shutdown: Option<ShutdownMode>,
}

struct DispatchInner {
    state: Mutex<QueueState>,
    work_ready: Condvar,
    sender: Arc<dyn ReplySender>,
    metrics: Arc<RuntimeMetrics>,
}

/// FIFO continuation queue served by one worker thread.
pub struct ContinuationDispatcher {
    inner: Arc<DispatchInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ContinuationDispatcher {
    /// Spawn the worker thread. It runs until [`shutdown`](Self::shutdown).
    pub(crate) fn start(
        sender: Arc<dyn ReplySender>,
        metrics: Arc<RuntimeMetrics>,
    ) -> io::Result<Self> {
        let inner = Arc::new(DispatchInner {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                shutdown: None,
            }),
            work_ready: Condvar::new(),
            sender,
            metrics,
        });
        let worker_inner = Arc::clone(&inner);
        let worker = thread::Builder::new()
            .name("continuation-dispatcher".to_string())
            .spawn(move || worker_loop(worker_inner))?;
        Ok(Self {
            inner,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue a batch for forwarding. Returns `false` once shutdown has begun.
    pub(crate) fn enqueue(&self, batch: ContinuationBatch) -> bool {
        let mut state = self.inner.state.lock();
        if state.shutdown.is_some() {
            warn!(
                future = %batch.reply().future(),
                "dispatcher shutting down; continuation batch rejected"
            );
            return false;
        }
        state.queue.push_back(batch);
        self.inner.work_ready.notify_one();
        true
    }

    /// Take over batches preserved by another dispatcher's shutdown. Returns
    /// how many were accepted; zero once this dispatcher is shutting down.
    pub fn adopt(&self, batches: Vec<ContinuationBatch>) -> usize {
        let mut state = self.inner.state.lock();
        if state.shutdown.is_some() {
            warn!(
                count = batches.len(),
                "dispatcher shutting down; adopted batches rejected"
            );
            return 0;
        }
        let adopted = batches.len();
        state.queue.extend(batches);
        self.inner.work_ready.notify_one();
        adopted
    }

    /// Batches queued but not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Stop the worker and join it. The first call fixes the mode; repeat
    /// calls are no-ops returning an empty backlog.
    ///
    /// With [`ShutdownMode::Preserve`] the undelivered backlog is returned
    /// so a successor can [`adopt`](Self::adopt) it. A batch the worker has
    /// already started is finished, not preserved.
    pub fn shutdown(&self, mode: ShutdownMode) -> Vec<ContinuationBatch> {
        let preserved = {
            let mut state = self.inner.state.lock();
            let effective = *state.shutdown.get_or_insert(mode);
            let preserved = match effective {
                ShutdownMode::Discard => {
                    state.queue.clear();
                    Vec::new()
                }
                ShutdownMode::Preserve => state.queue.drain(..).collect(),
                ShutdownMode::Flush => Vec::new(),
            };
            self.inner.work_ready.notify_all();
            preserved
        };
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("continuation dispatcher worker panicked");
            }
        }
        preserved
    }
}

impl Drop for ContinuationDispatcher {
    fn drop(&mut self) {
        let running = self.worker.lock().is_some();
        if running {
            let _ = self.shutdown(ShutdownMode::Discard);
        }
    }
}

fn worker_loop(inner: Arc<DispatchInner>) {
    loop {
        let batch = {
            let mut state = inner.state.lock();
            loop {
                match state.shutdown {
                    Some(ShutdownMode::Discard) | Some(ShutdownMode::Preserve) => return,
                    Some(ShutdownMode::Flush) if state.queue.is_empty() => return,
                    _ => {}
                }
                if let Some(batch) = state.queue.pop_front() {
                    break batch;
                }
                inner.work_ready.wait(&mut state);
            }
        };
        // Sends run without the queue lock so enqueue never blocks on I/O.
        forward(&inner, batch);
    }
}

fn forward(inner: &DispatchInner, batch: ContinuationBatch) {
    let (targets, reply) = batch.into_parts();
    for target in targets {
        match inner.sender.send_reply(&reply, &target) {
            Ok(()) => {
                inner.metrics.record_continuation_sent();
                trace!(future = %reply.future(), %target, "continuation forwarded");
            }
            Err(error) => {
                inner.metrics.record_continuation_send_failure();
                warn!(
                    future = %reply.future(),
                    %target,
                    %error,
                    "continuation send failed; continuing with remaining targets"
                );
            }
        }
    }
}
