//! Manager facade
//!
//! The public surface of the machine communication manager and the Tx
//! consumer task draining the command queue. One `MachineManager` is
//! constructed at startup and handed to every caller; `start` must run
//! exactly once before any other operation.

use crate::gate::FlowGate;
use crate::lifecycle::{self, LifecycleCtx, LinkShared, LinkState};
use crate::queue::CommandQueue;
use crate::stream::ResponseStream;
use crate::transport::{LineConfig, MatchFilter, Transport};
use machgate_core::{ConfigStore, Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Longest accepted command, in bytes, excluding the separator.
pub const MAX_COMMAND_SIZE: usize = 128;

/// Line terminator appended to every command before transmission.
pub const COMMAND_SEPARATOR: u8 = b'\n';

/// Store key under which the machine baud rate is persisted.
pub const BAUD_RATE_KEY: &str = "baud_rate";

/// Baud rate used when the store holds no value.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Tuning knobs for the manager. The defaults match the gateway's
/// long-standing behavior; tests shrink the capacities and delays.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Which attached device to open.
    pub match_filter: MatchFilter,
    /// Line parameters applied after open; the baud rate is overridden by
    /// the persisted machine configuration.
    pub line_config: LineConfig,
    /// Commands the queue holds before rejecting producers.
    pub queue_capacity: usize,
    /// Bytes the response stream holds before evicting the oldest.
    pub stream_capacity: usize,
    /// Bound on one send attempt, and on the pause quiesce wait.
    pub send_timeout: Duration,
    /// Backoff between failed open attempts.
    pub open_retry_delay: Duration,
    /// Backoff between failed send attempts on the same command.
    pub send_retry_delay: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            match_filter: MatchFilter::any(),
            line_config: LineConfig::default(),
            queue_capacity: 64,
            stream_capacity: 1024,
            send_timeout: Duration::from_millis(1000),
            open_retry_delay: Duration::from_millis(500),
            send_retry_delay: Duration::from_millis(50),
        }
    }
}

/// The machine communication manager.
///
/// Owns the command queue, response stream, flow gate, and link state, and
/// runs two background tasks: the Tx consumer and the device lifecycle
/// worker. All operations return [`Error::NotInitialized`] until
/// [`MachineManager::start`] has run.
pub struct MachineManager {
    transport: Arc<dyn Transport>,
    store: Arc<dyn ConfigStore>,
    config: ManagerConfig,
    queue: Arc<CommandQueue>,
    stream: Arc<ResponseStream>,
    gate: Arc<FlowGate>,
    link: Arc<LinkShared>,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MachineManager {
    /// Create a manager. Nothing runs until [`MachineManager::start`].
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn ConfigStore>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            queue: Arc::new(CommandQueue::new(config.queue_capacity)),
            stream: Arc::new(ResponseStream::new(config.stream_capacity)),
            gate: Arc::new(FlowGate::new()),
            link: Arc::new(LinkShared::new()),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            transport,
            store,
            config,
        }
    }

    /// Spawn the Tx consumer and the lifecycle worker. Must be called from
    /// within a tokio runtime, exactly once.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::invalid_argument("manager already started"));
        }

        let lifecycle_task = tokio::spawn(lifecycle::run(LifecycleCtx {
            transport: self.transport.clone(),
            store: self.store.clone(),
            link: self.link.clone(),
            gate: self.gate.clone(),
            stream: self.stream.clone(),
            config: self.config.clone(),
        }));

        let tx_task = tokio::spawn(tx_consumer(TxCtx {
            queue: self.queue.clone(),
            gate: self.gate.clone(),
            link: self.link.clone(),
            send_timeout: self.config.send_timeout,
            send_retry_delay: self.config.send_retry_delay,
        }));

        self.tasks.lock().extend([lifecycle_task, tx_task]);
        tracing::info!("machine manager started");
        Ok(())
    }

    /// Stop the background tasks. The manager cannot be restarted.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    fn ensure_started(&self) -> Result<()> {
        if self.started.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Queue a command for transmission. Rejects empty commands, commands
    /// longer than [`MAX_COMMAND_SIZE`], and commands embedding the line
    /// terminator; a full queue rejects instead of blocking. `Ok` means
    /// queued, not delivered; delivery is best-effort and eventual.
    pub fn enqueue_command(&self, command: &str) -> Result<()> {
        self.ensure_started()?;

        let bytes = command.as_bytes();
        if bytes.is_empty() {
            return Err(Error::invalid_argument("command is empty"));
        }
        if bytes.len() > MAX_COMMAND_SIZE {
            return Err(Error::invalid_argument(format!(
                "command exceeds {} bytes",
                MAX_COMMAND_SIZE
            )));
        }
        if bytes.contains(&COMMAND_SEPARATOR) {
            return Err(Error::invalid_argument(
                "command must not embed the line terminator",
            ));
        }

        self.queue.push(bytes.to_vec())
    }

    /// Remove and return up to `max_bytes` of machine output. Never
    /// blocks; an empty stream yields an empty vec.
    pub fn drain_responses(&self, max_bytes: usize) -> Result<Vec<u8>> {
        self.ensure_started()?;
        Ok(self.stream.drain(max_bytes))
    }

    /// Whether a device is currently open and configured.
    pub fn is_connected(&self) -> bool {
        self.started.load(Ordering::SeqCst) && self.link.state() == LinkState::Open
    }

    /// Suspend transmission. Waits up to the send timeout for the Tx path
    /// to quiesce; an attempt already past its gate check is not
    /// interrupted. Pausing while already paused times out.
    pub async fn pause(&self) -> Result<()> {
        self.ensure_started()?;
        self.gate.pause(self.config.send_timeout).await
    }

    /// Resume transmission. Refused when transmission is not paused.
    pub fn resume(&self) -> Result<()> {
        self.ensure_started()?;
        self.gate.resume()
    }

    /// Drop every queued command. Commands already handed to the Tx
    /// consumer are not recalled.
    pub fn clear_pending_commands(&self) -> Result<()> {
        self.ensure_started()?;
        self.queue.clear();
        Ok(())
    }

    /// Persist a new baud rate and cycle the device so it takes effect.
    ///
    /// Order matters: persistence failure aborts before anything pauses;
    /// a pause timeout aborts before the handle closes. Returns once the
    /// close has completed; the reopen proceeds asynchronously and is
    /// observable via [`MachineManager::is_connected`].
    pub async fn reconfigure(&self, baud_rate: u32) -> Result<()> {
        self.ensure_started()?;
        if baud_rate == 0 {
            return Err(Error::invalid_argument("baud rate must be non-zero"));
        }

        self.store.set_u32(BAUD_RATE_KEY, baud_rate)?;
        self.gate.pause(self.config.send_timeout).await?;

        // Quiesced: no new send will start, so the handle can close here
        // in the caller's context.
        if let Some(handle) = self.link.take_handle() {
            handle.close().await;
        }
        self.link.set_closed();
        self.link.request_reopen();
        tracing::info!(baud_rate, "machine reconfigured, reopen scheduled");
        Ok(())
    }
}

struct TxCtx {
    queue: Arc<CommandQueue>,
    gate: Arc<FlowGate>,
    link: Arc<LinkShared>,
    send_timeout: Duration,
    send_retry_delay: Duration,
}

/// The single Tx consumer: dequeue, frame, wait for the gate, send with a
/// bounded per-attempt timeout. A failed attempt retries the same framed
/// message forever: failures mean the device is gone, and the lifecycle
/// worker brings it back independently. Ordering is preserved by stalling
/// on the current command rather than skipping it.
async fn tx_consumer(ctx: TxCtx) {
    loop {
        let command = ctx.queue.pop().await;
        let mut framed = Vec::with_capacity(command.len() + 1);
        framed.extend_from_slice(&command);
        framed.push(COMMAND_SEPARATOR);

        loop {
            ctx.gate.passed().await;

            let result = match ctx.link.handle() {
                Some(handle) => handle.send(&framed, ctx.send_timeout).await,
                None => Err(machgate_core::TransportError::Closed),
            };

            match result {
                Ok(()) => {
                    tracing::trace!(len = framed.len(), "command transmitted");
                    break;
                }
                Err(err) => {
                    tracing::debug!(error = %err, "send attempt failed, retrying");
                    tokio::time::sleep(ctx.send_retry_delay).await;
                }
            }
        }
    }
}
