//! The assembled future-resolution runtime for one body.
//!
//! [`FutureRuntime::new`] wires the pool, the continuation dispatcher and the
//! liveness monitor together behind one explicit handle. There is no global
//! registry and no singleton: a process hosts as many runtimes as it hosts
//! bodies, each with its own identity, worker threads and counters, and all
//! collaborators (transport, probe, configuration) arrive as constructor
//! arguments.

use crate::continuation::{ContinuationBatch, ContinuationDispatcher, ShutdownMode};
use crate::error::FutureError;
use crate::handle::FutureHandle;
use crate::metrics::{MetricsSnapshot, RuntimeMetrics};
use crate::monitor::LivenessMonitor;
use crate::pool::{DeliveryOutcome, FuturePool};
use crate::transfer::{SerializationContext, TransferMode, TransferPayload};
use crate::typed::TypedFuture;
use anyhow::Context;
use config::FuturesConfig;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, trace, warn};
use transport::{LivenessProbe, ReplyEnvelope, ReplySender};
use types::{BodyId, FutureId, NodeAddr, RemoteBody, ResultSlot};

/// One body's future machinery: identity, pool, dispatcher, monitor.
pub struct FutureRuntime {
    local: RemoteBody,
    config: FuturesConfig,
    metrics: Arc<RuntimeMetrics>,
    pool: Arc<FuturePool>,
    dispatcher: Arc<ContinuationDispatcher>,
    monitor: Arc<LivenessMonitor>,
    fault_tolerance: Arc<AtomicBool>,
    next_sequence: AtomicU64,
}

impl FutureRuntime {
    /// Validate the configuration, spawn the worker threads and assemble the
    /// runtime.
    pub fn new(
        config: FuturesConfig,
        local: RemoteBody,
        sender: Arc<dyn ReplySender>,
        probe: Arc<dyn LivenessProbe>,
    ) -> anyhow::Result<Arc<Self>> {
        config
            .validate()
            .context("invalid futures configuration")?;
        let metrics = Arc::new(RuntimeMetrics::default());
        let fault_tolerance = Arc::new(AtomicBool::new(config.fault_tolerance_active));
        let monitor = Arc::new(
            LivenessMonitor::start(
                probe,
                Arc::clone(&fault_tolerance),
                config.probe_interval(),
                Arc::clone(&metrics),
            )
            .context("failed to spawn the liveness monitor")?,
        );
        let dispatcher = Arc::new(
            ContinuationDispatcher::start(sender, Arc::clone(&metrics))
                .context("failed to spawn the continuation dispatcher")?,
        );
        let pool = Arc::new(FuturePool::new(
            local.clone(),
            &config,
            Arc::clone(&dispatcher),
            Arc::downgrade(monitor.core()),
            Arc::clone(&metrics),
        ));
        info!(body = %local, "future runtime started");
        Ok(Arc::new(Self {
            local,
            config,
            metrics,
            pool,
            dispatcher,
            monitor,
            fault_tolerance,
            next_sequence: AtomicU64::new(1),
        }))
    }

    pub fn body_id(&self) -> BodyId {
        self.local.id()
    }

    pub fn node_addr(&self) -> &NodeAddr {
        self.local.node()
    }

    pub fn local(&self) -> &RemoteBody {
        &self.local
    }

    pub fn config(&self) -> &FuturesConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<FuturePool> {
        &self.pool
    }

    pub fn monitor(&self) -> &LivenessMonitor {
        &self.monitor
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Create and register a future for a call answered by `producer`.
    pub fn new_future(&self, producer: RemoteBody) -> FutureHandle {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let id = FutureId::new(self.local.id(), sequence);
        let handle = self.pool.new_handle(id, Some(producer));
        self.pool.register_future(&handle);
        trace!(%id, "future created");
        handle
    }

    /// [`new_future`](Self::new_future) with the result type fixed.
    pub fn new_typed_future<T>(&self, producer: RemoteBody) -> TypedFuture<T>
    where
        T: Clone + Send + fmt::Debug + 'static,
    {
        TypedFuture::new(self.new_future(producer))
    }

    /// Deliver a result for `id` to this body's pool.
    pub fn deliver(
        &self,
        id: FutureId,
        slot: ResultSlot,
    ) -> Result<DeliveryOutcome, FutureError> {
        self.pool.deliver_result(id, slot)
    }

    /// Deliver a reply envelope received from the transport.
    pub fn deliver_envelope(
        &self,
        envelope: ReplyEnvelope,
    ) -> Result<DeliveryOutcome, FutureError> {
        trace!(
            future = %envelope.future(),
            sender = %envelope.sender(),
            "reply envelope received"
        );
        self.pool.deliver_result(envelope.future(), envelope.into_slot())
    }

    /// Register `target` to receive the result of `id` once delivered here.
    pub fn register_continuation(
        &self,
        id: FutureId,
        target: RemoteBody,
    ) -> Result<(), FutureError> {
        self.pool.register_continuation(id, target)
    }

    /// See [`FuturePool::prepare_for_transfer`].
    pub fn prepare_for_transfer(
        &self,
        handle: &FutureHandle,
        mode: TransferMode,
        ctx: &SerializationContext,
    ) -> Result<TransferPayload, FutureError> {
        self.pool.prepare_for_transfer(handle, mode, ctx)
    }

    /// See [`FuturePool::register_incoming`].
    pub fn register_incoming(&self, payload: TransferPayload) -> FutureHandle {
        self.pool.register_incoming(payload)
    }

    /// Raise or clear the fault-tolerance flag. While raised, liveness sweeps
    /// are skipped; the flag is re-read at every monitor tick.
    pub fn set_fault_tolerance(&self, active: bool) {
        self.fault_tolerance.store(active, Ordering::Release);
        info!(active, "fault tolerance flag updated");
    }

    pub fn fault_tolerance(&self) -> bool {
        self.fault_tolerance.load(Ordering::Acquire)
    }

    /// Stop the monitor and the dispatcher. With [`ShutdownMode::Preserve`]
    /// the undelivered continuation backlog is returned for a successor
    /// runtime to [`adopt`](Self::adopt). Safe to call more than once.
    pub fn shutdown(&self, mode: ShutdownMode) -> Vec<ContinuationBatch> {
        self.monitor.stop();
        let preserved = self.dispatcher.shutdown(mode);
        let leftover = self.pool.pending_continuations();
        if leftover > 0 {
            warn!(
                leftover,
                "shutting down with continuation targets still awaiting a result"
            );
        }
        info!(body = %self.local, ?mode, "future runtime stopped");
        preserved
    }

    /// Take over continuation batches preserved by another runtime.
    pub fn adopt(&self, batches: Vec<ContinuationBatch>) -> usize {
        self.dispatcher.adopt(batches)
    }

    /// Continuation batches queued behind the dispatcher worker.
    pub fn pending_continuation_batches(&self) -> usize {
        self.dispatcher.pending()
    }
}

impl fmt::Debug for FutureRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureRuntime")
            .field("local", &self.local)
            .field("pending_futures", &self.pool.pending_futures())
            .finish()
    }
}
