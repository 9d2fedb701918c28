//! # Machgate
//!
//! A network-to-serial gateway for line-oriented CNC and printer
//! controllers: clients submit commands and poll responses over HTTP while
//! the gateway keeps a USB-serial machine link alive across unplugs,
//! replugs, and baud-rate changes.
//!
//! ## Architecture
//!
//! Machgate is organized as a workspace with multiple crates:
//!
//! 1. **machgate-core** - Error taxonomy, configuration-store trait
//! 2. **machgate-machine** - Command queue, response stream, flow gate,
//!    device lifecycle, manager facade, serial transport
//! 3. **machgate-settings** - File-backed configuration persistence
//! 4. **machgate-server** - HTTP control surface
//! 5. **machgate** - Main binary that wires them together

pub use machgate_core::{ConfigStore, Error, Result, StoreError, TransportError};
pub use machgate_machine::{
    LineConfig, MachineManager, ManagerConfig, MatchFilter, SerialTransport, DEFAULT_BAUD_RATE,
    MAX_COMMAND_SIZE,
};
pub use machgate_settings::FileStore;

/// Initialize tracing with an environment-driven filter (INFO by default).
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let fmt_layer = fmt::layer().with_target(true).with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
