//! Transport capability
//!
//! Abstraction over the physical link to the machine: open a device
//! matching identity criteria, apply line parameters, send bytes with a
//! bounded timeout, and deliver arrival/disconnect notifications through
//! callbacks registered at open time.
//!
//! The manager core depends only on these traits; the `serialport`-backed
//! implementation lives in [`crate::serial`], and tests substitute
//! recording doubles.

use async_trait::async_trait;
use machgate_core::TransportError;
use std::sync::Arc;
use std::time::Duration;

/// Identity criteria for selecting which attached device to open.
///
/// An empty filter matches any eligible USB-serial device. Criteria are
/// conjunctive: a device must satisfy every populated field.
#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    /// USB vendor ID the device must report.
    pub usb_vid: Option<u16>,
    /// USB product ID the device must report.
    pub usb_pid: Option<u16>,
    /// Exact device path (e.g. `/dev/ttyACM0`). Overrides pattern matching.
    pub port_name: Option<String>,
}

impl MatchFilter {
    /// A filter that matches any eligible device.
    pub fn any() -> Self {
        Self::default()
    }

    /// Check a candidate against the populated criteria.
    pub fn matches(&self, port_name: &str, vid: Option<u16>, pid: Option<u16>) -> bool {
        if let Some(ref want) = self.port_name {
            if want != port_name {
                return false;
            }
        }
        if let Some(want_vid) = self.usb_vid {
            if vid != Some(want_vid) {
                return false;
            }
        }
        if let Some(want_pid) = self.usb_pid {
            if pid != Some(want_pid) {
                return false;
            }
        }
        true
    }
}

/// Parity setting for the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Serial line parameters applied after a successful open.
///
/// Defaults mirror the CDC line coding the gateway has always used with
/// its machines: 7 data bits, odd parity, one stop bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    /// Line speed in baud.
    pub baud_rate: u32,
    /// Data bits per character (5..=8).
    pub data_bits: u8,
    /// Parity setting.
    pub parity: Parity,
    /// Stop bits (1 or 2).
    pub stop_bits: u8,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            baud_rate: crate::manager::DEFAULT_BAUD_RATE,
            data_bits: 7,
            parity: Parity::Odd,
            stop_bits: 1,
        }
    }
}

impl LineConfig {
    /// This configuration at a different baud rate.
    pub fn with_baud_rate(self, baud_rate: u32) -> Self {
        Self { baud_rate, ..self }
    }
}

/// Callbacks handed to the transport at open time.
///
/// `on_bytes` runs in the transport's read context and must return
/// promptly; it is invoked once per arrived chunk with no framing implied.
/// `on_disconnect` fires when the device drops off the link; a handle
/// closed locally does not report a disconnect.
#[derive(Clone)]
pub struct TransportSink {
    on_bytes: Arc<dyn Fn(&[u8]) + Send + Sync>,
    on_disconnect: Arc<dyn Fn() + Send + Sync>,
}

impl TransportSink {
    /// Bundle the two notification callbacks.
    pub fn new(
        on_bytes: impl Fn(&[u8]) + Send + Sync + 'static,
        on_disconnect: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_bytes: Arc::new(on_bytes),
            on_disconnect: Arc::new(on_disconnect),
        }
    }

    /// Deliver an arrived chunk.
    pub fn bytes_arrived(&self, chunk: &[u8]) {
        (self.on_bytes)(chunk);
    }

    /// Report that the device dropped off the link.
    pub fn disconnected(&self) {
        (self.on_disconnect)();
    }
}

impl std::fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSink").finish_non_exhaustive()
    }
}

/// An open device. Sends happen from exactly one task; close and
/// line-configuration happen from exactly one other, with handoff
/// synchronized by the caller (the flow gate).
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Apply line parameters to the open device.
    async fn set_line_config(&self, config: LineConfig) -> Result<(), TransportError>;

    /// Send bytes, blocking at most `timeout`.
    async fn send(&self, bytes: &[u8], timeout: Duration) -> Result<(), TransportError>;

    /// Close the device. Subsequent sends fail with
    /// [`TransportError::Closed`]; no disconnect notification is emitted.
    async fn close(&self);
}

/// Factory side of the capability: find and open a device matching the
/// filter, wiring its notifications into `sink`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attempt one open. Returns [`TransportError::NoDevice`] when nothing
    /// matching the filter is attached; the lifecycle worker retries.
    async fn open(
        &self,
        filter: &MatchFilter,
        sink: TransportSink,
    ) -> Result<Box<dyn TransportHandle>, TransportError>;
}
