//! Pairing of pending futures with the results that resolve them.
//!
//! The [`FuturePool`] is the per-body registry keyed by [`FutureId`]. Handles
//! register while pending; a delivered result closes the identity, resolves
//! every registered handle (first one takes the delivered value, the rest get
//! deep copies) and queues one continuation batch for the forward targets
//! registered along the way. A result arriving before any registration is
//! stashed and consumed by the next registration. A second delivery for a
//! completed identity is rejected, unless a fresh registration reopened the
//! identity first.
//!
//! Locking is two-level: a directory lock guards the id-to-bucket map, each
//! bucket has its own lock plus a closed flag. Pairing decisions (attach to
//! bucket, stash early, close on delivery) are linearized by the directory
//! lock; slot resolution happens after it is released. Lock order is
//! directory first, then early/completed/bucket, then handle state; the pulse
//! lock is taken only with no other pool lock held.

use crate::continuation::{ContinuationBatch, ContinuationDispatcher};
use crate::error::FutureError;
use crate::handle::{FutureHandle, HandleCtx};
use crate::metrics::RuntimeMetrics;
use crate::monitor::MonitorCore;
use config::FuturesConfig;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use transport::ReplyEnvelope;
use types::{FutureId, RemoteBody, ResultSlot};

/// Condvar beaten once per resolution, so group waits can rescan their set
/// without polling.
pub(crate) struct PoolPulse {
    generation: Mutex<u64>,
    resolved: Condvar,
}

impl PoolPulse {
    pub(crate) fn new() -> Self {
        Self {
            generation: Mutex::new(0),
            resolved: Condvar::new(),
        }
    }

    pub(crate) fn beat(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.resolved.notify_all();
    }
}

/// Everything registered under one identity. `closed` flips when a delivery
/// takes the bucket; late registrants retry against the directory.
struct Bucket {
    handles: Vec<FutureHandle>,
    targets: Vec<RemoteBody>,
    closed: bool,
}

/// What a delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The identity closed; this many registered handles were resolved.
    Delivered(usize),
    /// No registration yet; the result is stashed until one arrives.
    Orphaned,
}

/// Per-body registry pairing pending futures with delivered results.
pub struct FuturePool {
    local: RemoteBody,
    buckets: Mutex<HashMap<FutureId, Arc<Mutex<Bucket>>>>,
    /// Results that arrived before any registration.
    early: Mutex<HashMap<FutureId, ResultSlot>>,
    /// Identities already closed by a delivery. Guards against duplicates.
    completed: Mutex<HashSet<FutureId>>,
    pulse: Arc<PoolPulse>,
    continuation_enabled: AtomicBool,
    default_timeout: Option<Duration>,
    dispatcher: Arc<ContinuationDispatcher>,
    monitor: Weak<MonitorCore>,
    metrics: Arc<RuntimeMetrics>,
}

impl FuturePool {
    pub(crate) fn new(
        local: RemoteBody,
        config: &FuturesConfig,
        dispatcher: Arc<ContinuationDispatcher>,
        monitor: Weak<MonitorCore>,
        metrics: Arc<RuntimeMetrics>,
    ) -> Self {
        Self {
            local,
            buckets: Mutex::new(HashMap::new()),
            early: Mutex::new(HashMap::new()),
            completed: Mutex::new(HashSet::new()),
            pulse: Arc::new(PoolPulse::new()),
            continuation_enabled: AtomicBool::new(config.continuation_enabled),
            default_timeout: config.default_wait_timeout(),
            dispatcher,
            monitor,
            metrics,
        }
    }

    /// Body this pool belongs to.
    pub fn local(&self) -> &RemoteBody {
        &self.local
    }

    /// Create a handle wired to this pool's monitor, pulse and metrics.
    /// `producer` is the remote body expected to push the result, if known.
    pub(crate) fn new_handle(&self, id: FutureId, producer: Option<RemoteBody>) -> FutureHandle {
        let ctx = HandleCtx {
            default_timeout: self.default_timeout,
            monitor: self.monitor.clone(),
            pulse: Some(Arc::clone(&self.pulse)),
            metrics: Some(Arc::clone(&self.metrics)),
        };
        let handle = FutureHandle::new(id, ctx);
        if let Some(producer) = producer {
            handle.set_updater(producer);
        }
        self.metrics.record_future_created();
        handle
    }

    /// Register a pending handle under its identity.
    ///
    /// Consumes a stashed early result on the spot if one is waiting. When
    /// the identity was already completed, registration reopens it for a
    /// fresh delivery round.
    pub fn register_future(&self, handle: &FutureHandle) {
        let id = handle.id();
        if handle.is_resolved() {
            debug!(%id, "skipping registration of an already-resolved handle");
            return;
        }
        handle.set_sender(self.local.id());

        loop {
            let mut directory = self.buckets.lock();
            if let Some(slot) = self.early.lock().remove(&id) {
                self.completed.lock().insert(id);
                drop(directory);
                self.metrics.record_early_result_consumed();
                debug!(%id, "consumed early result at registration");
                if let Err(error) = handle.receive_reply(slot) {
                    warn!(%id, %error, "early result discarded; handle resolved elsewhere");
                }
                return;
            }
            match directory.get(&id) {
                Some(bucket) => {
                    let bucket = Arc::clone(bucket);
                    drop(directory);
                    let mut bucket = bucket.lock();
                    if bucket.closed {
                        // A delivery took this bucket between our directory
                        // lookup and the bucket lock. Retry against the
                        // directory; we either join a fresh round or open one.
                        continue;
                    }
                    bucket.handles.push(handle.clone());
                    return;
                }
                None => {
                    // A completed identity becomes pending again with a fresh
                    // registration; the duplicate guard resets.
                    self.completed.lock().remove(&id);
                    directory.insert(
                        id,
                        Arc::new(Mutex::new(Bucket {
                            handles: vec![handle.clone()],
                            targets: Vec::new(),
                            closed: false,
                        })),
                    );
                    return;
                }
            }
        }
    }

    /// Register `target` to receive the result of `id` once it arrives.
    pub fn register_continuation(
        &self,
        id: FutureId,
        target: RemoteBody,
    ) -> Result<(), FutureError> {
        if !self.continuation_enabled.load(Ordering::Acquire) {
            return Err(FutureError::ContinuationDisabled);
        }
        loop {
            let directory = self.buckets.lock();
            let bucket = match directory.get(&id) {
                Some(bucket) => Arc::clone(bucket),
                None => return Err(FutureError::unknown_identity(id)),
            };
            drop(directory);
            let mut bucket = bucket.lock();
            if bucket.closed {
                continue;
            }
            trace!(%id, %target, "continuation target registered");
            bucket.targets.push(target);
            return Ok(());
        }
    }

    /// Deliver the result for `id`.
    ///
    /// Closes the identity, resolves every registered handle and queues the
    /// continuation batch. The first handle takes the delivered slot without
    /// copying; every further recipient gets an independent deep copy. A
    /// handle that already resolved on its own (wait timeout, probe verdict)
    /// refuses its share; the remaining handles still resolve, but the call
    /// surfaces [`FutureError::AlreadyResolved`] so a late result racing a
    /// local verdict is rejected rather than silently absorbed.
    pub fn deliver_result(
        &self,
        id: FutureId,
        slot: ResultSlot,
    ) -> Result<DeliveryOutcome, FutureError> {
        let mut directory = self.buckets.lock();
        if self.completed.lock().contains(&id) {
            drop(directory);
            self.metrics.record_duplicate_reply();
            warn!(%id, "duplicate result delivery rejected");
            return Err(FutureError::already_resolved(id));
        }
        let bucket = match directory.remove(&id) {
            Some(bucket) => bucket,
            None => {
                self.early.lock().insert(id, slot);
                drop(directory);
                self.metrics.record_orphan_reply();
                debug!(%id, "result arrived before registration; stashed as early result");
                return Ok(DeliveryOutcome::Orphaned);
            }
        };
        self.completed.lock().insert(id);
        drop(directory);

        let (handles, targets) = {
            let mut bucket = bucket.lock();
            bucket.closed = true;
            (
                std::mem::take(&mut bucket.handles),
                std::mem::take(&mut bucket.targets),
            )
        };

        let continuation_slot = if targets.is_empty() {
            None
        } else if self.continuation_enabled.load(Ordering::Acquire) {
            Some(slot.deep_copy())
        } else {
            warn!(
                %id,
                targets = targets.len(),
                "automatic continuation disabled; dropping registered forward targets"
            );
            None
        };

        let copies: Vec<ResultSlot> = (1..handles.len()).map(|_| slot.deep_copy()).collect();
        let shares = std::iter::once(slot).chain(copies);
        let mut completions = Vec::with_capacity(handles.len());
        let mut refused = false;
        for (handle, share) in handles.iter().zip(shares) {
            match handle.resolve_deferred(share) {
                Ok(completion) => completions.push(completion),
                Err(error) => {
                    refused = true;
                    warn!(%id, %error, "registered handle refused its share of the result");
                }
            }
        }

        if let Some(forward_slot) = continuation_slot {
            let target_count = targets.len();
            let reply = ReplyEnvelope::new(id, self.local.id(), forward_slot);
            if self.dispatcher.enqueue(ContinuationBatch::new(targets, reply)) {
                self.metrics.record_continuations_enqueued(target_count);
            }
        }

        let resolved = completions.len();
        // Hooks, barriers and the pulse run with no pool lock held.
        for completion in completions {
            completion.finish();
        }
        if resolved > 0 {
            self.metrics.record_reply_delivered();
        }
        if refused {
            self.metrics.record_duplicate_reply();
            return Err(FutureError::already_resolved(id));
        }
        debug!(%id, resolved, "result delivered");
        Ok(DeliveryOutcome::Delivered(resolved))
    }

    /// Block until at least one handle in `handles` is resolved; returns its
    /// index. Unlike a single-handle wait, giving up never force-resolves
    /// anything: the set is left exactly as it was.
    pub fn wait_for_any(
        &self,
        handles: &[FutureHandle],
        timeout: Option<Duration>,
    ) -> Result<usize, FutureError> {
        if handles.is_empty() {
            return Err(FutureError::timeout(
                "wait_for_any on empty set",
                Duration::ZERO,
            ));
        }
        let limit = self.effective_limit(timeout);
        let deadline = limit.map(|limit| Instant::now() + limit);
        let mut generation = self.pulse.generation.lock();
        loop {
            if let Some(index) = handles.iter().position(FutureHandle::is_resolved) {
                return Ok(index);
            }
            match deadline {
                None => self.pulse.resolved.wait(&mut generation),
                Some(deadline) => {
                    if self
                        .pulse
                        .resolved
                        .wait_until(&mut generation, deadline)
                        .timed_out()
                    {
                        if let Some(index) = handles.iter().position(FutureHandle::is_resolved) {
                            return Ok(index);
                        }
                        return Err(FutureError::timeout(
                            "wait_for_any",
                            limit.unwrap_or_default(),
                        ));
                    }
                }
            }
        }
    }

    /// Block until every handle in `handles` is resolved. Same no-side-effect
    /// timeout behavior as [`wait_for_any`](Self::wait_for_any).
    pub fn wait_for_all(
        &self,
        handles: &[FutureHandle],
        timeout: Option<Duration>,
    ) -> Result<(), FutureError> {
        let limit = self.effective_limit(timeout);
        let deadline = limit.map(|limit| Instant::now() + limit);
        let mut generation = self.pulse.generation.lock();
        loop {
            if handles.iter().all(FutureHandle::is_resolved) {
                return Ok(());
            }
            match deadline {
                None => self.pulse.resolved.wait(&mut generation),
                Some(deadline) => {
                    if self
                        .pulse
                        .resolved
                        .wait_until(&mut generation, deadline)
                        .timed_out()
                    {
                        if handles.iter().all(FutureHandle::is_resolved) {
                            return Ok(());
                        }
                        return Err(FutureError::timeout(
                            "wait_for_all",
                            limit.unwrap_or_default(),
                        ));
                    }
                }
            }
        }
    }

    pub fn enable_continuation(&self) {
        self.continuation_enabled.store(true, Ordering::Release);
        info!("automatic continuation enabled");
    }

    pub fn disable_continuation(&self) {
        self.continuation_enabled.store(false, Ordering::Release);
        info!("automatic continuation disabled");
    }

    pub fn continuation_enabled(&self) -> bool {
        self.continuation_enabled.load(Ordering::Acquire)
    }

    /// Identities with at least one open registration.
    pub fn pending_futures(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Forward targets registered across all open identities.
    pub fn pending_continuations(&self) -> usize {
        let directory = self.buckets.lock();
        directory.values().map(|bucket| bucket.lock().targets.len()).sum()
    }

    /// Early results stashed and not yet consumed by a registration.
    pub fn stashed_results(&self) -> usize {
        self.early.lock().len()
    }

    fn effective_limit(&self, timeout: Option<Duration>) -> Option<Duration> {
        timeout
            .filter(|limit| !limit.is_zero())
            .or(self.default_timeout)
    }
}
