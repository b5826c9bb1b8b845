//! Write-once future handles.
//!
//! A [`FutureHandle`] starts pending and moves to resolved exactly once; the
//! transition is terminal. Resolution can come from a delivered reply, from a
//! wait timeout (the timeout verdict is written into the slot so every waiter
//! observes the same outcome), or from the liveness monitor declaring the
//! producer dead. Waiters block on a condvar; clones share one underlying
//! slot.
//!
//! Completion side effects (resolution hooks, error barriers, pool pulse)
//! never run under the handle lock. Internal resolvers obtain a [`Completion`]
//! while locked and call [`Completion::finish`] after every lock is released.

use crate::barrier::ErrorBarrier;
use crate::error::FutureError;
use crate::metrics::RuntimeMetrics;
use crate::monitor::MonitorCore;
use crate::pool::PoolPulse;
use parking_lot::{Condvar, Mutex};
use std::any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use types::{BodyId, CallError, FutureId, RemoteBody, ResultSlot};

/// Runtime wiring shared by every handle a pool creates.
///
/// All fields are optional so handles can exist outside a full runtime
/// (tests, or payloads rebuilt from the wire before adoption).
#[derive(Clone, Default)]
pub(crate) struct HandleCtx {
    /// Applied when a wait passes no explicit limit.
    pub(crate) default_timeout: Option<Duration>,
    /// First wait on a remote-updated handle registers it here.
    pub(crate) monitor: Weak<MonitorCore>,
    /// Beats once per resolution so group waits can rescan.
    pub(crate) pulse: Option<Arc<PoolPulse>>,
    pub(crate) metrics: Option<Arc<RuntimeMetrics>>,
}

#[derive(Default)]
struct HandleState {
    slot: Option<ResultSlot>,
    /// Body that delivered (or will deliver) the reply.
    sender: Option<BodyId>,
    /// Body expected to push the result here, if the handle arrived over
    /// the wire still pending. Drives liveness monitoring.
    updater: Option<RemoteBody>,
    hooks: Vec<Box<dyn FnOnce(&FutureHandle) + Send>>,
    barriers: Vec<Arc<ErrorBarrier>>,
    monitored: bool,
}

struct HandleShared {
    id: FutureId,
    state: Mutex<HandleState>,
    resolved: Condvar,
    /// Transfer stamps this: `true` ships a snapshot, `false` forwards the
    /// live handle.
    copy_mode: AtomicBool,
    ctx: HandleCtx,
}

/// Shared view of one pending-or-resolved result. Cloning is cheap and all
/// clones resolve together.
#[derive(Clone)]
pub struct FutureHandle {
    shared: Arc<HandleShared>,
}

/// Side effects captured while resolving under the handle lock, to be run
/// after the lock is dropped.
pub(crate) struct Completion {
    handle: FutureHandle,
    hooks: Vec<Box<dyn FnOnce(&FutureHandle) + Send>>,
    barriers: Vec<Arc<ErrorBarrier>>,
    error: Option<CallError>,
}

impl Completion {
    /// Run hooks and barrier notifications. Call with no locks held.
    pub(crate) fn finish(self) {
        for barrier in &self.barriers {
            barrier.complete(self.handle.id(), self.error.as_ref());
        }
        for hook in self.hooks {
            hook(&self.handle);
        }
        if let Some(pulse) = &self.handle.shared.ctx.pulse {
            pulse.beat();
        }
        if let Some(metrics) = &self.handle.shared.ctx.metrics {
            metrics.record_future_resolved();
        }
    }
}

impl FutureHandle {
    pub(crate) fn new(id: FutureId, ctx: HandleCtx) -> Self {
        Self {
            shared: Arc::new(HandleShared {
                id,
                state: Mutex::new(HandleState::default()),
                resolved: Condvar::new(),
                copy_mode: AtomicBool::new(false),
                ctx,
            }),
        }
    }

    /// Handle wired to nothing, for unit tests.
    #[cfg(test)]
    pub(crate) fn detached(id: FutureId) -> Self {
        Self::new(id, HandleCtx::default())
    }

    pub fn id(&self) -> FutureId {
        self.shared.id
    }

    pub fn is_resolved(&self) -> bool {
        self.shared.state.lock().slot.is_some()
    }

    /// Still pending.
    pub fn is_awaited(&self) -> bool {
        !self.is_resolved()
    }

    pub fn sender(&self) -> Option<BodyId> {
        self.shared.state.lock().sender
    }

    pub fn updater(&self) -> Option<RemoteBody> {
        self.shared.state.lock().updater.clone()
    }

    pub fn copy_mode(&self) -> bool {
        self.shared.copy_mode.load(Ordering::Acquire)
    }

    pub(crate) fn set_sender(&self, sender: BodyId) {
        self.shared.state.lock().sender = Some(sender);
    }

    pub(crate) fn set_updater(&self, updater: RemoteBody) {
        self.shared.state.lock().updater = Some(updater);
    }

    pub(crate) fn set_copy_mode(&self, copy: bool) {
        self.shared.copy_mode.store(copy, Ordering::Release);
    }

    /// Two handles over the same slot.
    pub fn ptr_eq(a: &FutureHandle, b: &FutureHandle) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }

    /// Independent copy of the slot content, if resolved.
    pub(crate) fn snapshot_slot(&self) -> Option<ResultSlot> {
        self.shared.state.lock().slot.as_ref().map(ResultSlot::deep_copy)
    }

    /// Fill the slot and collect the deferred side effects. Caller holds the
    /// state lock and must `finish()` the completion after releasing it.
    fn resolve_locked(&self, state: &mut HandleState, slot: ResultSlot) -> Completion {
        let error = slot.error().cloned();
        state.slot = Some(slot);
        self.shared.resolved.notify_all();
        Completion {
            handle: self.clone(),
            hooks: std::mem::take(&mut state.hooks),
            barriers: std::mem::take(&mut state.barriers),
            error,
        }
    }

    /// Resolve without running side effects yet. Used by the pool to resolve
    /// a whole registration group before any hook runs.
    pub(crate) fn resolve_deferred(&self, slot: ResultSlot) -> Result<Completion, FutureError> {
        let mut state = self.shared.state.lock();
        if state.slot.is_some() {
            return Err(FutureError::already_resolved(self.shared.id));
        }
        Ok(self.resolve_locked(&mut state, slot))
    }

    /// Resolve with the given reply. Fails with `AlreadyResolved` on a second
    /// attempt; the first result stays untouched.
    pub fn receive_reply(&self, slot: ResultSlot) -> Result<(), FutureError> {
        let completion = self.resolve_deferred(slot)?;
        completion.finish();
        Ok(())
    }

    /// Block until resolved.
    ///
    /// A limit of `None` or `Duration::ZERO` falls back to the configured
    /// default; with no default the wait is unbounded. When the limit
    /// expires the handle is force-resolved with a timeout verdict, so the
    /// timeout is terminal: later waits return immediately and a late reply
    /// is rejected. Only the thread that performed the force-resolution gets
    /// `Err(Timeout)`; concurrent waiters see a resolved handle.
    pub fn wait_for(&self, timeout: Option<Duration>) -> Result<(), FutureError> {
        let effective = timeout
            .filter(|limit| !limit.is_zero())
            .or(self.shared.ctx.default_timeout);

        let mut state = self.shared.state.lock();
        if state.slot.is_some() {
            return Ok(());
        }

        // First wait on a remote-updated handle puts the producer under
        // liveness watch. Registration talks to the monitor, so the state
        // lock is released around it.
        if !state.monitored && state.updater.is_some() {
            state.monitored = true;
            drop(state);
            if let Some(monitor) = self.shared.ctx.monitor.upgrade() {
                monitor.track(self);
            }
            state = self.shared.state.lock();
        }

        match effective {
            None => {
                while state.slot.is_none() {
                    self.shared.resolved.wait(&mut state);
                }
                Ok(())
            }
            Some(limit) => {
                let deadline = Instant::now() + limit;
                while state.slot.is_none() {
                    if self
                        .shared
                        .resolved
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                if state.slot.is_some() {
                    return Ok(());
                }
                let verdict = ResultSlot::with_error(CallError::timeout(limit));
                let completion = self.resolve_locked(&mut state, verdict);
                drop(state);
                completion.finish();
                if let Some(metrics) = &self.shared.ctx.metrics {
                    metrics.record_wait_timeout();
                }
                Err(FutureError::timeout(
                    format!("wait on {}", self.shared.id),
                    limit,
                ))
            }
        }
    }

    /// Wait, then extract the value as `T`.
    ///
    /// An error carried in the slot (including a synthetic timeout or probe
    /// verdict) surfaces as [`FutureError::Failed`].
    pub fn get_result<T>(&self) -> Result<T, FutureError>
    where
        T: Clone + Send + fmt::Debug + 'static,
    {
        self.wait_for(None)?;
        let state = self.shared.state.lock();
        // Resolution is terminal, so a successful wait leaves the slot filled.
        let slot = match state.slot.as_ref() {
            Some(slot) => slot,
            None => return Err(FutureError::unknown_identity(self.shared.id)),
        };
        if let Some(error) = slot.error() {
            return Err(FutureError::Failed(error.clone()));
        }
        match slot.downcast_value::<T>() {
            Some(value) => Ok(value.clone()),
            None => Err(FutureError::type_mismatch(
                self.shared.id,
                any::type_name::<T>(),
            )),
        }
    }

    /// Wait, then report the call error carried by the slot, if any.
    pub fn raised_error(&self) -> Result<Option<CallError>, FutureError> {
        self.wait_for(None)?;
        let state = self.shared.state.lock();
        Ok(state.slot.as_ref().and_then(|slot| slot.error().cloned()))
    }

    /// Run `hook` once the handle resolves. Runs inline (without the state
    /// lock held) when the handle is already resolved.
    pub fn on_resolved(&self, hook: impl FnOnce(&FutureHandle) + Send + 'static) {
        let mut state = self.shared.state.lock();
        if state.slot.is_some() {
            drop(state);
            hook(self);
        } else {
            state.hooks.push(Box::new(hook));
        }
    }

    /// Attach an error barrier. Returns `None` when the handle is pending
    /// (the barrier will be completed on resolution) or `Some(outcome)` when
    /// already resolved, in which case the caller settles the barrier itself.
    pub(crate) fn attach_barrier(
        &self,
        barrier: &Arc<ErrorBarrier>,
    ) -> Option<Option<CallError>> {
        let mut state = self.shared.state.lock();
        match state.slot.as_ref() {
            Some(slot) => Some(slot.error().cloned()),
            None => {
                state.barriers.push(Arc::clone(barrier));
                None
            }
        }
    }
}

impl fmt::Debug for FutureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("FutureHandle");
        out.field("id", &self.shared.id);
        match self.shared.state.try_lock() {
            Some(state) => {
                out.field("resolved", &state.slot.is_some());
                out.field("sender", &state.sender);
            }
            None => {
                out.field("state", &"<locked>");
            }
        }
        out.finish()
    }
}
