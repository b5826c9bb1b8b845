//! Grouped failure collection for scatter-style call patterns.
//!
//! An [`ErrorBarrier`] watches a set of handles and counts down as they
//! resolve, recording every call error on the way. `wait_idle` blocks until
//! the whole group has settled, then hands back the collected failures in one
//! batch instead of surfacing them at each individual access site.

use crate::error::FutureError;
use crate::handle::FutureHandle;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use types::{CallError, FutureId};

#[derive(Default)]
struct BarrierState {
    outstanding: usize,
    failures: Vec<(FutureId, CallError)>,
}

pub struct ErrorBarrier {
    state: Mutex<BarrierState>,
    idle: Condvar,
}

impl ErrorBarrier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BarrierState::default()),
            idle: Condvar::new(),
        })
    }

    /// Add `handle` to the watched group. A handle that already resolved
    /// settles its share of the barrier immediately.
    pub fn watch(self: &Arc<Self>, handle: &FutureHandle) {
        self.state.lock().outstanding += 1;
        if let Some(outcome) = handle.attach_barrier(self) {
            // Resolved before we attached; the resolution path will not call
            // back, so settle here.
            self.complete(handle.id(), outcome.as_ref());
        }
    }

    /// One watched handle resolved. Called by the resolution path with no
    /// handle lock held.
    pub(crate) fn complete(&self, id: FutureId, error: Option<&CallError>) {
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        if let Some(error) = error {
            state.failures.push((id, error.clone()));
        }
        if state.outstanding == 0 {
            self.idle.notify_all();
        }
    }

    /// Handles still pending in the watched group.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Block until every watched handle has resolved, then drain and return
    /// the failures collected since the last drain.
    ///
    /// On timeout the pending handles are left untouched and the collected
    /// failures stay buffered for the next call.
    pub fn wait_idle(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Vec<(FutureId, CallError)>, FutureError> {
        let mut state = self.state.lock();
        match timeout {
            None => {
                while state.outstanding > 0 {
                    self.idle.wait(&mut state);
                }
            }
            Some(limit) => {
                let deadline = Instant::now() + limit;
                while state.outstanding > 0 {
                    if self.idle.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                if state.outstanding > 0 {
                    return Err(FutureError::timeout("barrier wait", limit));
                }
            }
        }
        Ok(std::mem::take(&mut state.failures))
    }
}
