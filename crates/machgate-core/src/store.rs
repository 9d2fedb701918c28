//! Configuration store capability
//!
//! The machine manager persists its machine configuration (currently the
//! baud rate) through this trait. Implementations live outside the core:
//! a file-backed store for production and an in-memory store for tests.

use crate::error::StoreError;

/// Key/value persistence for small unsigned configuration values.
///
/// Absent keys are not an error; callers fall back to documented defaults.
/// `set_u32` must persist durably before returning so a restart observes
/// the new value.
pub trait ConfigStore: Send + Sync {
    /// Read a value, or `None` if the key has never been written.
    fn get_u32(&self, key: &str) -> Option<u32>;

    /// Write a value durably.
    fn set_u32(&self, key: &str, value: u32) -> Result<(), StoreError>;
}
