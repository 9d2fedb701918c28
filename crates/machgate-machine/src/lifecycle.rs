//! Device lifecycle
//!
//! Owns the transport handle and the `Closed → Opening → Open` state
//! machine: the open-retry loop, disconnect reaction, and reopening after
//! a reconfiguration. Exactly one lifecycle worker runs per manager, so at
//! most one open attempt is ever in flight.
//!
//! Handle ownership: the worker installs the handle in a shared slot on
//! open and takes it back on close; the Tx consumer only ever clones the
//! slot for the duration of one send. Closing is preceded by pausing the
//! gate (reconfigure) or followed by send failures (disconnect), so the
//! handle is never reconfigured while a new send is starting.

use crate::gate::FlowGate;
use crate::manager::{ManagerConfig, BAUD_RATE_KEY, DEFAULT_BAUD_RATE};
use crate::stream::ResponseStream;
use crate::transport::{Transport, TransportHandle, TransportSink};
use machgate_core::ConfigStore;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Connection state of the machine link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No device open.
    Closed,
    /// An open attempt is in flight.
    Opening,
    /// A device is open and configured.
    Open,
}

/// State shared between the lifecycle worker, the Tx consumer, and the
/// facade.
pub(crate) struct LinkShared {
    state: Mutex<LinkState>,
    handle: RwLock<Option<Arc<dyn TransportHandle>>>,
    reopen: Notify,
    reopen_requested: AtomicBool,
}

impl LinkShared {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(LinkState::Closed),
            handle: RwLock::new(None),
            reopen: Notify::new(),
            reopen_requested: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> LinkState {
        *self.state.lock()
    }

    fn set_state(&self, state: LinkState) {
        *self.state.lock() = state;
    }

    /// Clone the current handle for one send.
    pub(crate) fn handle(&self) -> Option<Arc<dyn TransportHandle>> {
        self.handle.read().clone()
    }

    fn install(&self, handle: Arc<dyn TransportHandle>) {
        *self.handle.write() = Some(handle);
    }

    pub(crate) fn take_handle(&self) -> Option<Arc<dyn TransportHandle>> {
        self.handle.write().take()
    }

    pub(crate) fn set_closed(&self) {
        self.set_state(LinkState::Closed);
    }

    /// Ask the worker to cycle the link (disconnect callback, or a
    /// reconfiguration that already closed the handle itself).
    pub(crate) fn request_reopen(&self) {
        self.reopen_requested.store(true, Ordering::SeqCst);
        self.reopen.notify_one();
    }

    /// Wait until a reopen has actually been requested. Stale wakeups from
    /// notifications delivered before the link reached `Open` are filtered
    /// by the flag.
    async fn reopen_awaited(&self) {
        loop {
            let notified = self.reopen.notified();
            if self.reopen_requested.swap(false, Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

/// Everything the lifecycle worker needs, cloned out of the manager at
/// start.
pub(crate) struct LifecycleCtx {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: Arc<dyn ConfigStore>,
    pub(crate) link: Arc<LinkShared>,
    pub(crate) gate: Arc<FlowGate>,
    pub(crate) stream: Arc<ResponseStream>,
    pub(crate) config: ManagerConfig,
}

/// Worker loop: open with retry and backoff, apply the persisted line
/// configuration, open the gate, then sleep until a disconnect or
/// reconfiguration cycles the link.
pub(crate) async fn run(ctx: LifecycleCtx) {
    let sink = {
        let stream = ctx.stream.clone();
        let link = ctx.link.clone();
        TransportSink::new(
            move |chunk| stream.push(chunk),
            move || {
                tracing::info!("machine disconnected");
                link.request_reopen();
            },
        )
    };

    loop {
        ctx.link.set_state(LinkState::Opening);
        let handle: Arc<dyn TransportHandle> = loop {
            match ctx.transport.open(&ctx.config.match_filter, sink.clone()).await {
                Ok(handle) => break Arc::from(handle),
                Err(err) => {
                    tracing::debug!(error = %err, "open attempt failed, retrying");
                    tokio::time::sleep(ctx.config.open_retry_delay).await;
                }
            }
        };

        let baud = ctx
            .store
            .get_u32(BAUD_RATE_KEY)
            .unwrap_or(DEFAULT_BAUD_RATE);
        let line = ctx.config.line_config.with_baud_rate(baud);
        if let Err(err) = handle.set_line_config(line).await {
            tracing::warn!(error = %err, "line configuration failed, reopening");
            handle.close().await;
            tokio::time::sleep(ctx.config.open_retry_delay).await;
            continue;
        }

        ctx.link.install(handle);
        ctx.link.set_state(LinkState::Open);
        if ctx.gate.resume().is_err() {
            // A reopen after a disconnect finds the gate still open; only
            // pause/reconfigure ever close it.
            tracing::debug!("gate already open after reopen");
        }
        tracing::info!(baud, "machine link open");

        ctx.link.reopen_awaited().await;

        if let Some(handle) = ctx.link.take_handle() {
            handle.close().await;
        }
        ctx.link.set_state(LinkState::Closed);
        tracing::info!("machine link closed, reopening");
    }
}
