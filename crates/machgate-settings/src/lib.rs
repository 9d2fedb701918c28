//! # Machgate Settings
//!
//! Configuration persistence for the gateway. Stores small key/value
//! configuration (the machine baud rate) in a JSON document under the
//! platform configuration directory, with an in-memory variant for tests.

pub mod store;

pub use store::{FileStore, MemoryStore, SETTINGS_FILE};
