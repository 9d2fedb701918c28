//! # Machgate Server
//!
//! Thin HTTP control surface over the machine manager: parameter
//! validation and JSON marshaling only, no machine logic. Every route
//! delegates to one facade call; errors map onto HTTP status codes in
//! [`error`].

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{router, MAX_DRAIN_BYTES};

use machgate_machine::MachineManager;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serve the control surface on an already-bound listener until the
/// connection loop fails.
pub async fn serve(listener: TcpListener, manager: Arc<MachineManager>) -> std::io::Result<()> {
    tracing::info!(addr = ?listener.local_addr().ok(), "control surface listening");
    axum::serve(listener, router(manager)).await
}
