//! # Machgate Machine
//!
//! The machine communication manager: a single-producer/single-consumer
//! command-and-response pipeline between network callers and a
//! line-oriented serial machine.
//!
//! Pieces, leaves first:
//! - [`transport`]: the capability trait over the physical link, and a
//!   `serialport`-backed implementation in [`serial`].
//! - [`gate`]: the pause/resume latch controlling transmission.
//! - [`queue`]: the bounded command queue drained by the Tx consumer.
//! - [`stream`]: the bounded raw-byte response stream.
//! - [`lifecycle`]: the open-retry/disconnect/reconfigure state machine.
//! - [`manager`]: the facade tying them together.

pub mod gate;
pub mod lifecycle;
pub mod manager;
pub mod queue;
pub mod serial;
pub mod stream;
pub mod transport;

pub use gate::FlowGate;
pub use lifecycle::LinkState;
pub use manager::{
    MachineManager, ManagerConfig, BAUD_RATE_KEY, COMMAND_SEPARATOR, DEFAULT_BAUD_RATE,
    MAX_COMMAND_SIZE,
};
pub use serial::SerialTransport;
pub use transport::{LineConfig, MatchFilter, Parity, Transport, TransportHandle, TransportSink};
