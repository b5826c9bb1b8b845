//! Distributed Future Resolution Runtime
//!
//! Write-once futures for asynchronous calls between bodies, with automatic
//! continuation of results to downstream holders and liveness monitoring of
//! the producers waiters depend on. Everything is thread-and-condvar based:
//! waiting callers park on the handle they hold, worker threads (one
//! continuation dispatcher, one liveness monitor per runtime) do the rest.
//!
//! # Architecture
//!
//! ```text
//!  caller thread                     FutureRuntime (one per body)
//!  ─────────────                     ─────────────────────────────────────
//!  new_future ──────────────────────▶ FuturePool
//!  wait_for / get_result ◀── wake ──   │ pairs FutureId registrations
//!                                      │ with delivered results
//!  transport ── deliver_envelope ────▶ │
//!                                      ├──▶ ContinuationDispatcher
//!                                      │     FIFO worker, forwards each
//!                                      │     result to downstream holders
//!                                      └──▶ LivenessMonitor
//!                                            periodic probe per producer,
//!                                            force-resolves on failure
//! ```
//!
//! # Concurrency Model
//!
//! - OS threads and condvars, no async executor. A blocked wait occupies its
//!   caller's thread and nothing else.
//! - Resolution is terminal. Wait timeouts and failed liveness probes write a
//!   synthetic error verdict into the slot; late replies are rejected.
//! - One delivery resolves every registered handle: the first takes the
//!   result as-is, the rest receive independent deep copies.
//! - Side effects of resolution (hooks, barriers, group-wait wakeups) run
//!   with no internal lock held.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use config::FuturesConfig;
//! use messaging_futures::FutureRuntime;
//! use transport::InProcessHub;
//! use types::{BodyId, NodeAddr, RemoteBody, ResultSlot};
//!
//! let hub = Arc::new(InProcessHub::new());
//! let local = RemoteBody::new(BodyId::new(), NodeAddr::new("node-a"));
//! let runtime = FutureRuntime::new(
//!     FuturesConfig::default(),
//!     local,
//!     hub.clone(),
//!     hub.clone(),
//! )
//! .expect("runtime starts");
//!
//! let producer = RemoteBody::new(BodyId::new(), NodeAddr::new("node-b"));
//! let result = runtime.new_typed_future::<u64>(producer);
//! runtime
//!     .deliver(result.id(), ResultSlot::with_value(42u64))
//!     .expect("deliver");
//! assert_eq!(result.get().expect("resolved"), 42);
//! ```

pub mod barrier;
pub mod continuation;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod monitor;
pub mod pool;
pub mod runtime;
pub mod transfer;
pub mod typed;

pub use barrier::ErrorBarrier;
pub use continuation::{ContinuationBatch, ContinuationDispatcher, ShutdownMode};
pub use error::FutureError;
pub use handle::FutureHandle;
pub use metrics::{MetricsSnapshot, RuntimeMetrics};
pub use monitor::LivenessMonitor;
pub use pool::{DeliveryOutcome, FuturePool};
pub use runtime::FutureRuntime;
pub use transfer::{SerializationContext, TransferMode, TransferPayload};
pub use typed::TypedFuture;
