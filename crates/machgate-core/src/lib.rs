//! # Machgate Core
//!
//! Shared foundations for the Machgate gateway: the error taxonomy used by
//! every crate in the workspace and the configuration-store capability the
//! machine manager consumes.

pub mod error;
pub mod store;

pub use error::{Error, Result, StoreError, TransportError};
pub use store::ConfigStore;
