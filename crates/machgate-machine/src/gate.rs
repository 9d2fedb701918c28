//! Flow-control gate
//!
//! A binary, resettable latch controlling whether the Tx consumer may
//! transmit. Semantically a one-shot binary semaphore, not a counter:
//! pausing a paused gate times out, resuming a resumed gate is refused.
//!
//! Atomicity contract: the consumer takes and immediately gives back the
//! latch before every send attempt. No *new* attempt starts while the gate
//! is closed, but an attempt that already passed its gate check when
//! `pause` was called is not interrupted.

use machgate_core::Error;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Pause/resume latch. Starts closed; the device lifecycle opens it after
/// the first successful device open.
pub struct FlowGate {
    permit: Semaphore,
    // Serializes resume's check-then-add so two racing resumes cannot
    // leave more than one permit behind.
    resume_lock: Mutex<()>,
}

impl FlowGate {
    /// Create a closed gate.
    pub fn new() -> Self {
        Self {
            permit: Semaphore::new(0),
            resume_lock: Mutex::new(()),
        }
    }

    /// Close the gate, waiting at most `timeout` for the Tx path to
    /// quiesce. Effective before returning: once this returns `Ok`, no new
    /// send attempt starts until [`FlowGate::resume`].
    ///
    /// Pausing an already-closed gate has no permit to take and therefore
    /// times out.
    pub async fn pause(&self, timeout: Duration) -> Result<(), Error> {
        let timeout_ms = timeout.as_millis() as u64;
        match tokio::time::timeout(timeout, self.permit.acquire()).await {
            Ok(Ok(taken)) => {
                taken.forget();
                Ok(())
            }
            // The semaphore is never closed, but the acquire error must be
            // handled; report it as the bounded wait failing.
            Ok(Err(_)) => Err(Error::Timeout { timeout_ms }),
            Err(_) => Err(Error::Timeout { timeout_ms }),
        }
    }

    /// Open the gate. Refused with [`Error::AlreadyResumed`] when the gate
    /// is already open; that signals misuse to a facade caller, while the
    /// lifecycle worker logs and ignores it after a reopen.
    pub fn resume(&self) -> Result<(), Error> {
        let _guard = self.resume_lock.lock();
        if self.permit.available_permits() > 0 {
            return Err(Error::AlreadyResumed);
        }
        self.permit.add_permits(1);
        Ok(())
    }

    /// Take-then-give: wait until the gate is open, leaving it open. Called
    /// by the Tx consumer before every send attempt; never times out, so a
    /// paused consumer suspends instead of dropping commands.
    pub async fn passed(&self) {
        // Acquire can only fail on a closed semaphore, which never happens;
        // treat it as an open gate rather than panic.
        if let Ok(taken) = self.permit.acquire().await {
            drop(taken);
        }
    }

    /// Whether the gate is currently closed.
    pub fn is_paused(&self) -> bool {
        self.permit.available_permits() == 0
    }
}

impl Default for FlowGate {
    fn default() -> Self {
        Self::new()
    }
}
