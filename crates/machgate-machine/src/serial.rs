//! Serial transport implementation
//!
//! `serialport`-backed implementation of the transport capability for
//! USB-serial machines. Opens the first attached port matching the filter,
//! runs a reader thread that feeds arrived bytes into the sink, and treats
//! a failed read as a disconnect.
//!
//! Eligible device paths:
//! - Windows: COM* (e.g. COM1, COM3)
//! - Linux: /dev/ttyUSB*, /dev/ttyACM*
//! - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*

use crate::manager::DEFAULT_BAUD_RATE;
use crate::transport::{LineConfig, MatchFilter, Parity, Transport, TransportHandle, TransportSink};
use async_trait::async_trait;
use machgate_core::TransportError;
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Poll interval of the reader thread; also how quickly close is noticed.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Size of the reader's arrival buffer, matching the largest response
/// chunk the stream is expected to absorb in one callback.
const READ_BUFFER_SIZE: usize = 512;

/// Transport over local USB-serial devices.
#[derive(Default)]
pub struct SerialTransport;

impl SerialTransport {
    /// Create the transport. Stateless; each open scans afresh.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(
        &self,
        filter: &MatchFilter,
        sink: TransportSink,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        let filter = filter.clone();
        let opened = tokio::task::spawn_blocking(move || open_blocking(&filter))
            .await
            .map_err(|e| TransportError::OpenFailed {
                port: "<scan>".to_string(),
                reason: e.to_string(),
            })??;

        let (port_name, port) = opened;
        let handle = SerialHandle::start(port_name, port, sink)?;
        Ok(Box::new(handle))
    }
}

fn open_blocking(
    filter: &MatchFilter,
) -> Result<(String, Box<dyn serialport::SerialPort>), TransportError> {
    let ports = serialport::available_ports().map_err(|e| TransportError::OpenFailed {
        port: "<scan>".to_string(),
        reason: e.to_string(),
    })?;

    let candidate = ports
        .into_iter()
        .filter(|p| is_eligible_port(&p.port_name))
        .find(|p| match &p.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                filter.matches(&p.port_name, Some(usb.vid), Some(usb.pid))
            }
            _ => filter.matches(&p.port_name, None, None),
        })
        .ok_or(TransportError::NoDevice)?;

    let port = serialport::new(&candidate.port_name, DEFAULT_BAUD_RATE)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(|e| TransportError::OpenFailed {
            port: candidate.port_name.clone(),
            reason: e.to_string(),
        })?;

    tracing::debug!(port = %candidate.port_name, "serial port opened");
    Ok((candidate.port_name, port))
}

/// Check if a device path matches USB-serial machine patterns.
fn is_eligible_port(port_name: &str) -> bool {
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }
    if port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem") {
        return true;
    }
    false
}

/// An open serial device: a writer/configuration side guarded by a mutex
/// and a reader thread owning a clone of the port.
struct SerialHandle {
    name: String,
    port: Arc<Mutex<Box<dyn serialport::SerialPort>>>,
    closed: Arc<AtomicBool>,
    reader: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl SerialHandle {
    fn start(
        name: String,
        port: Box<dyn serialport::SerialPort>,
        sink: TransportSink,
    ) -> Result<Self, TransportError> {
        let reader_port = port.try_clone().map_err(|e| TransportError::OpenFailed {
            port: name.clone(),
            reason: format!("reader clone failed: {}", e),
        })?;

        let closed = Arc::new(AtomicBool::new(false));
        let reader = {
            let closed = closed.clone();
            let name = name.clone();
            std::thread::Builder::new()
                .name(format!("serial-rx {}", name))
                .spawn(move || read_loop(reader_port, sink, closed))
                .map_err(|e| TransportError::OpenFailed {
                    port: name,
                    reason: format!("reader thread spawn failed: {}", e),
                })?
        };

        Ok(Self {
            name,
            port: Arc::new(Mutex::new(port)),
            closed,
            reader: Mutex::new(Some(reader)),
        })
    }
}

/// Reader loop: poll with a short timeout, forward arrivals, report a hard
/// read failure as a disconnect. A locally closed handle exits silently.
fn read_loop(
    mut port: Box<dyn serialport::SerialPort>,
    sink: TransportSink,
    closed: Arc<AtomicBool>,
) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        if closed.load(Ordering::SeqCst) {
            return;
        }
        match port.read(&mut buf) {
            // EOF on a tty means the device dropped off the bus.
            Ok(0) => {
                if !closed.load(Ordering::SeqCst) {
                    tracing::warn!("serial read returned EOF, treating as disconnect");
                    sink.disconnected();
                }
                return;
            }
            Ok(n) => sink.bytes_arrived(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if !closed.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "serial read failed, treating as disconnect");
                    sink.disconnected();
                }
                return;
            }
        }
    }
}

#[async_trait]
impl TransportHandle for SerialHandle {
    async fn set_line_config(&self, config: LineConfig) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let port = self.port.clone();
        tokio::task::spawn_blocking(move || apply_line_config(&port, config))
            .await
            .map_err(|e| TransportError::ConfigRejected {
                reason: e.to_string(),
            })?
    }

    async fn send(&self, bytes: &[u8], timeout: Duration) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let port = self.port.clone();
        let closed = self.closed.clone();
        let bytes = bytes.to_vec();
        let timeout_ms = timeout.as_millis() as u64;

        tokio::task::spawn_blocking(move || {
            let mut port = port.lock();
            if closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            port.set_timeout(timeout)
                .map_err(|e| TransportError::SendFailed {
                    reason: e.to_string(),
                })?;
            match port.write_all(&bytes) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    Err(TransportError::SendTimeout { timeout_ms })
                }
                Err(e) => Err(TransportError::SendFailed {
                    reason: e.to_string(),
                }),
            }
        })
        .await
        .map_err(|e| TransportError::SendFailed {
            reason: e.to_string(),
        })?
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let reader = self.reader.lock().take();
        if let Some(thread) = reader {
            // The reader notices the flag within one poll interval.
            let _ = tokio::task::spawn_blocking(move || {
                let _ = thread.join();
            })
            .await;
        }
        tracing::debug!(port = %self.name, "serial port closed");
    }
}

impl Drop for SerialHandle {
    fn drop(&mut self) {
        // Unblocks the reader thread if close was never awaited.
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn apply_line_config(
    port: &Mutex<Box<dyn serialport::SerialPort>>,
    config: LineConfig,
) -> Result<(), TransportError> {
    let data_bits = match config.data_bits {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        8 => serialport::DataBits::Eight,
        other => {
            return Err(TransportError::ConfigRejected {
                reason: format!("invalid data bits: {}", other),
            })
        }
    };
    let stop_bits = match config.stop_bits {
        1 => serialport::StopBits::One,
        2 => serialport::StopBits::Two,
        other => {
            return Err(TransportError::ConfigRejected {
                reason: format!("invalid stop bits: {}", other),
            })
        }
    };
    let parity = match config.parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    };

    let reject = |e: serialport::Error| TransportError::ConfigRejected {
        reason: e.to_string(),
    };

    let mut port = port.lock();
    port.set_baud_rate(config.baud_rate).map_err(reject)?;
    port.set_data_bits(data_bits).map_err(reject)?;
    port.set_parity(parity).map_err(reject)?;
    port.set_stop_bits(stop_bits).map_err(reject)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligible_port_patterns() {
        assert!(is_eligible_port("COM3"));
        assert!(is_eligible_port("/dev/ttyUSB0"));
        assert!(is_eligible_port("/dev/ttyACM1"));
        assert!(is_eligible_port("/dev/cu.usbmodem14101"));

        assert!(!is_eligible_port("COMX"));
        assert!(!is_eligible_port("/dev/ttyS0"));
        assert!(!is_eligible_port("/dev/cu.Bluetooth-Incoming-Port"));
    }
}
