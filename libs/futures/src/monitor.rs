//! Liveness monitoring of result producers.
//!
//! A future only enters the watch list on its first blocking wait: a handle
//! nobody waits on never costs a probe. The sweep thread wakes on a fixed
//! interval, prunes resolved futures, then probes each producer address once
//! per sweep regardless of how many futures wait on it. A failed probe is the
//! verdict: every future watching that address is force-resolved with a
//! [`CallError::ProbeFailure`] so waiters unblock with a diagnosable error
//! instead of hanging forever.
//!
//! When the fault-tolerance flag is raised, sweeps are skipped entirely; a
//! recovery layer is then responsible for replaying the missing results. The
//! flag is re-read at every tick, so flipping it mid-flight takes effect at
//! the next interval.

use crate::handle::FutureHandle;
use crate::metrics::RuntimeMetrics;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, trace, warn};
use transport::LivenessProbe;
use types::{CallError, NodeAddr, ResultSlot};

/// Watch list and probe logic, shared between the sweep thread and the
/// handles that register themselves on first wait.
pub(crate) struct MonitorCore {
    watched: DashMap<NodeAddr, Vec<FutureHandle>>,
    probe: Arc<dyn LivenessProbe>,
    fault_tolerance: Arc<AtomicBool>,
    metrics: Arc<RuntimeMetrics>,
}

impl MonitorCore {
    pub(crate) fn new(
        probe: Arc<dyn LivenessProbe>,
        fault_tolerance: Arc<AtomicBool>,
        metrics: Arc<RuntimeMetrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            watched: DashMap::new(),
            probe,
            fault_tolerance,
            metrics,
        })
    }

    /// Put `handle`'s producer under watch. No-op for handles without a
    /// known updater, already-resolved handles, and repeat registrations.
    pub(crate) fn track(&self, handle: &FutureHandle) {
        let updater = match handle.updater() {
            Some(updater) => updater,
            None => return,
        };
        if handle.is_resolved() {
            return;
        }
        let addr = updater.node().clone();
        let mut entry = self.watched.entry(addr.clone()).or_default();
        if entry
            .iter()
            .any(|watched| FutureHandle::ptr_eq(watched, handle))
        {
            return;
        }
        trace!(%addr, future = %handle.id(), "producer under liveness watch");
        entry.push(handle.clone());
    }

    /// One monitoring pass: prune resolved futures, probe each remaining
    /// producer address once, force-resolve the futures of dead producers.
    pub(crate) fn sweep(&self) {
        let addrs: Vec<NodeAddr> = self
            .watched
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for addr in addrs {
            let still_watched = match self.watched.get_mut(&addr) {
                Some(mut entry) => {
                    entry.retain(FutureHandle::is_awaited);
                    entry.len()
                }
                None => continue,
            };
            if still_watched == 0 {
                self.watched.remove_if(&addr, |_, handles| handles.is_empty());
                continue;
            }

            // One probe per producer address per sweep, however many futures
            // wait on it. The probe runs with no watch-list entry held.
            self.metrics.record_probe();
            match self.probe.probe(&addr) {
                Ok(()) => {
                    trace!(%addr, futures = still_watched, "producer answered probe");
                }
                Err(error) => {
                    self.metrics.record_probe_failure();
                    warn!(
                        %addr,
                        %error,
                        futures = still_watched,
                        "producer probe failed; force-resolving its futures"
                    );
                    if let Some((_, handles)) = self.watched.remove(&addr) {
                        for handle in handles {
                            if handle.is_resolved() {
                                continue;
                            }
                            let verdict = ResultSlot::with_error(CallError::probe_failure(
                                addr.clone(),
                                error.to_string(),
                            ));
                            if handle.receive_reply(verdict).is_ok() {
                                self.metrics.record_forced_resolution();
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Periodic sweep thread over a [`MonitorCore`].
pub struct LivenessMonitor {
    core: Arc<MonitorCore>,
    stop: Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    interval: Duration,
}

impl LivenessMonitor {
    /// Spawn the sweep thread. It wakes every `interval` until
    /// [`stop`](Self::stop).
    pub(crate) fn start(
        probe: Arc<dyn LivenessProbe>,
        fault_tolerance: Arc<AtomicBool>,
        interval: Duration,
        metrics: Arc<RuntimeMetrics>,
    ) -> io::Result<Self> {
        let core = MonitorCore::new(probe, fault_tolerance, metrics);
        let (stop, stop_rx) = bounded::<()>(1);
        let worker_core = Arc::clone(&core);
        let worker = thread::Builder::new()
            .name("liveness-monitor".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if worker_core.fault_tolerance.load(Ordering::Acquire) {
                            trace!("fault tolerance active; liveness sweep skipped");
                            continue;
                        }
                        worker_core.sweep();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            })?;
        Ok(Self {
            core,
            stop,
            worker: Mutex::new(Some(worker)),
            interval,
        })
    }

    pub(crate) fn core(&self) -> &Arc<MonitorCore> {
        &self.core
    }

    /// Run one sweep immediately. Skipped while fault tolerance is active,
    /// same as the periodic ticks.
    pub fn sweep_now(&self) {
        if self.core.fault_tolerance.load(Ordering::Acquire) {
            debug!("fault tolerance active; requested sweep skipped");
            return;
        }
        self.core.sweep();
    }

    /// No producers currently under watch.
    pub fn is_idle(&self) -> bool {
        self.core.watched.is_empty()
    }

    /// Producer addresses currently under watch.
    pub fn watched_producers(&self) -> usize {
        self.core.watched.len()
    }

    pub fn probe_interval(&self) -> Duration {
        self.interval
    }

    /// Stop the sweep thread and join it. Idempotent.
    pub fn stop(&self) {
        let _ = self.stop.try_send(());
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("liveness monitor worker panicked");
            }
        }
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::HandleCtx;
    use assert_matches::assert_matches;
    use std::time::Instant;
    use transport::test_utils::ScriptedProbe;
    use types::{BodyId, FutureId, RemoteBody};

    fn future_id(sequence: u64) -> FutureId {
        FutureId::new(BodyId::new(), sequence)
    }

    fn producer(name: &str) -> RemoteBody {
        RemoteBody::new(BodyId::new(), NodeAddr::new(name))
    }

    fn watched_handle(core: &Arc<MonitorCore>, sequence: u64, updater: RemoteBody) -> FutureHandle {
        let handle = FutureHandle::detached(future_id(sequence));
        handle.set_updater(updater);
        core.track(&handle);
        handle
    }

    fn test_core(probe: Arc<ScriptedProbe>) -> Arc<MonitorCore> {
        MonitorCore::new(
            probe as Arc<dyn LivenessProbe>,
            Arc::new(AtomicBool::new(false)),
            Arc::new(RuntimeMetrics::default()),
        )
    }

    fn eventually(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn probe_failure_force_resolves_every_watched_future() {
        let probe = Arc::new(ScriptedProbe::new());
        let ghost = producer("ghost-node");
        probe.mark_down(ghost.node().clone());
        let core = test_core(Arc::clone(&probe));

        let first = watched_handle(&core, 1, ghost.clone());
        let second = watched_handle(&core, 2, ghost.clone());
        assert_eq!(core.watched.len(), 1);

        core.sweep();

        for handle in [&first, &second] {
            let raised = handle.raised_error().expect("force-resolved");
            assert_matches!(raised, Some(CallError::ProbeFailure { .. }));
        }
        // Address dropped from the watch list; one probe covered both.
        assert!(core.watched.is_empty());
        assert_eq!(probe.probes_of(ghost.node()), 1);
    }

    #[test]
    fn one_probe_per_address_per_sweep() {
        let probe = Arc::new(ScriptedProbe::new());
        let core = test_core(Arc::clone(&probe));
        let alive = producer("alive-node");

        for sequence in 1..=3 {
            watched_handle(&core, sequence, alive.clone());
        }
        core.sweep();

        assert_eq!(probe.probes_of(alive.node()), 1);
        // Healthy producer stays watched.
        assert_eq!(core.watched.len(), 1);
    }

    #[test]
    fn resolved_futures_are_pruned_without_probing() {
        let probe = Arc::new(ScriptedProbe::new());
        let core = test_core(Arc::clone(&probe));
        let addr_owner = producer("quiet-node");

        let handle = watched_handle(&core, 1, addr_owner.clone());
        handle
            .receive_reply(ResultSlot::with_value(1u8))
            .expect("resolve");

        core.sweep();
        assert!(core.watched.is_empty());
        assert_eq!(probe.probes_of(addr_owner.node()), 0);
    }

    #[test]
    fn track_skips_unmonitorable_and_duplicate_handles() {
        let probe = Arc::new(ScriptedProbe::new());
        let core = test_core(probe);
        let updater = producer("node-x");

        // No updater: nothing to probe.
        let anonymous = FutureHandle::detached(future_id(1));
        core.track(&anonymous);
        assert!(core.watched.is_empty());

        // Already resolved: nothing to wait for.
        let resolved = FutureHandle::detached(future_id(2));
        resolved.set_updater(updater.clone());
        resolved
            .receive_reply(ResultSlot::with_value(1u8))
            .expect("resolve");
        core.track(&resolved);
        assert!(core.watched.is_empty());

        // Repeat registration of the same slot is deduplicated.
        let pending = FutureHandle::detached(future_id(3));
        pending.set_updater(updater.clone());
        core.track(&pending);
        core.track(&pending);
        let watched = core
            .watched
            .get(updater.node())
            .map(|entry| entry.len());
        assert_eq!(watched, Some(1));
    }

    #[test]
    fn first_wait_registers_the_producer_for_monitoring() {
        let probe = Arc::new(ScriptedProbe::new());
        let core = test_core(probe);
        let updater = producer("slow-node");

        let ctx = HandleCtx {
            monitor: Arc::downgrade(&core),
            ..HandleCtx::default()
        };
        let handle = FutureHandle::new(future_id(1), ctx);
        handle.set_updater(updater.clone());
        assert!(core.watched.is_empty());

        let _ = handle.wait_for(Some(Duration::from_millis(20)));
        assert_eq!(core.watched.len(), 1);

        // The timed-out handle is swept away on the next pass.
        core.sweep();
        assert!(core.watched.is_empty());
    }

    #[test]
    fn fault_tolerance_gates_periodic_sweeps() {
        let probe = Arc::new(ScriptedProbe::new());
        let ghost = producer("ft-ghost");
        probe.mark_down(ghost.node().clone());
        let fault_tolerance = Arc::new(AtomicBool::new(true));

        let monitor = LivenessMonitor::start(
            probe as Arc<dyn LivenessProbe>,
            Arc::clone(&fault_tolerance),
            Duration::from_millis(10),
            Arc::new(RuntimeMetrics::default()),
        )
        .expect("spawn monitor");

        let handle = FutureHandle::detached(future_id(1));
        handle.set_updater(ghost);
        monitor.core().track(&handle);

        // Several intervals pass; the flag keeps sweeps off.
        thread::sleep(Duration::from_millis(60));
        assert!(handle.is_awaited());

        fault_tolerance.store(false, Ordering::Release);
        eventually(|| handle.is_resolved());

        monitor.stop();
    }

    #[test]
    fn sweep_now_fires_between_intervals_and_stop_is_idempotent() {
        let probe = Arc::new(ScriptedProbe::new());
        let ghost = producer("manual-ghost");
        probe.mark_down(ghost.node().clone());

        let monitor = LivenessMonitor::start(
            probe as Arc<dyn LivenessProbe>,
            Arc::new(AtomicBool::new(false)),
            Duration::from_secs(60),
            Arc::new(RuntimeMetrics::default()),
        )
        .expect("spawn monitor");

        let handle = FutureHandle::detached(future_id(1));
        handle.set_updater(ghost);
        monitor.core().track(&handle);
        assert_eq!(monitor.watched_producers(), 1);

        monitor.sweep_now();
        assert!(handle.is_resolved());
        assert!(monitor.is_idle());

        monitor.stop();
        monitor.stop();
    }
}
