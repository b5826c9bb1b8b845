//! Shared harness for multi-body end-to-end tests.
//!
//! Each test assembles several [`TestNode`]s on one [`InProcessHub`]. A node
//! is a full [`FutureRuntime`] plus a pump thread draining its hub endpoint
//! into the pool, which is exactly the work a transport binding does in a
//! real deployment.

use config::FuturesConfig;
use crossbeam_channel::Receiver;
use messaging_futures::{ContinuationBatch, FutureRuntime, ShutdownMode};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::warn;
use transport::{InProcessHub, LivenessProbe, ReplyEnvelope, ReplySender};
use types::{BodyId, NodeAddr, RemoteBody};

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

/// Install the test tracing subscriber once per process.
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Poll `condition` until it holds or a generous deadline passes.
pub fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// One body on the hub: runtime plus envelope pump.
pub struct TestNode {
    runtime: Arc<FutureRuntime>,
    hub: Arc<InProcessHub>,
    addr: NodeAddr,
    pump: Option<JoinHandle<()>>,
}

impl TestNode {
    /// Start a node whose replies go straight onto the hub.
    pub fn start(hub: &Arc<InProcessHub>, name: &str, config: FuturesConfig) -> Self {
        Self::start_with_transport(hub, name, config, Arc::clone(hub) as Arc<dyn ReplySender>)
    }

    /// Start a node with a custom outgoing reply path, for tests that gate
    /// or break the link while the hub stays healthy for everyone else.
    pub fn start_with_transport(
        hub: &Arc<InProcessHub>,
        name: &str,
        config: FuturesConfig,
        sender: Arc<dyn ReplySender>,
    ) -> Self {
        init_tracing();
        let addr = NodeAddr::new(name);
        let endpoint = hub.register(addr.clone());
        let local = RemoteBody::new(BodyId::new(), addr.clone());
        let runtime = FutureRuntime::new(
            config,
            local,
            sender,
            Arc::clone(hub) as Arc<dyn LivenessProbe>,
        )
        .expect("runtime starts");
        let pump = spawn_pump(Arc::clone(&runtime), endpoint);
        Self {
            runtime,
            hub: Arc::clone(hub),
            addr,
            pump: Some(pump),
        }
    }

    pub fn runtime(&self) -> &Arc<FutureRuntime> {
        &self.runtime
    }

    pub fn body(&self) -> RemoteBody {
        self.runtime.local().clone()
    }

    pub fn addr(&self) -> &NodeAddr {
        &self.addr
    }

    /// Disconnect from the hub, drain the pump and stop the runtime.
    /// Returns the preserved continuation backlog when `mode` keeps one.
    pub fn shutdown(mut self, mode: ShutdownMode) -> Vec<ContinuationBatch> {
        self.hub.unregister(&self.addr);
        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                warn!(addr = %self.addr, "pump thread panicked");
            }
        }
        self.runtime.shutdown(mode)
    }
}

fn spawn_pump(runtime: Arc<FutureRuntime>, endpoint: Receiver<ReplyEnvelope>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("pump-{}", runtime.node_addr()))
        .spawn(move || {
            // Ends when the node unregisters and the hub drops its sender.
            for envelope in endpoint.iter() {
                if let Err(error) = runtime.deliver_envelope(envelope) {
                    warn!(%error, "undeliverable envelope");
                }
            }
        })
        .expect("spawn pump thread")
}

/// Reply path that parks every send until the gate opens. Used to pin a
/// continuation batch in flight while more work queues up behind it.
pub struct GatedSender {
    open: AtomicBool,
    inner: Arc<InProcessHub>,
}

impl GatedSender {
    pub fn closed(inner: Arc<InProcessHub>) -> Arc<Self> {
        Arc::new(Self {
            open: AtomicBool::new(false),
            inner,
        })
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::Release);
    }
}

impl ReplySender for GatedSender {
    fn send_reply(&self, reply: &ReplyEnvelope, target: &RemoteBody) -> transport::Result<()> {
        while !self.open.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(1));
        }
        self.inner.send_reply(reply, target)
    }
}
