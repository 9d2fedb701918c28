//! Route table and handlers
//!
//! One route per facade operation, mirroring the device's control surface:
//! command submission, response draining, status, pause/resume, queue
//! clearing, and baud-rate reconfiguration.

use crate::error::ApiError;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use machgate_machine::MachineManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Most bytes one `/responses` call may drain, regardless of the query.
pub const MAX_DRAIN_BYTES: usize = 4096;

/// Request bodies beyond this are rejected before parsing.
const MAX_BODY_BYTES: usize = 16 * 1024;

fn default_max_bytes() -> usize {
    1024
}

#[derive(Serialize)]
struct HealthResponse {
    name: &'static str,
    version: &'static str,
    build_date: &'static str,
}

#[derive(Serialize)]
struct StatusResponse {
    connected: bool,
}

#[derive(Deserialize)]
struct CommandsRequest {
    commands: Vec<String>,
}

#[derive(Serialize)]
struct CommandsResponse {
    accepted: usize,
}

#[derive(Deserialize)]
struct ResponsesQuery {
    #[serde(default = "default_max_bytes")]
    max_bytes: usize,
}

#[derive(Deserialize)]
struct MachineConfigRequest {
    baud_rate: u32,
}

/// Build the control-surface router around a started manager.
pub fn router(manager: Arc<MachineManager>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/machine-status", get(machine_status))
        .route("/commands", post(post_commands))
        .route("/responses", get(get_responses))
        .route("/machine-config", put(put_machine_config))
        .route("/start", put(put_start))
        .route("/stop", put(put_stop))
        .route("/clear", put(put_clear))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(manager)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        name: "machgate",
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("BUILD_DATE"),
    })
}

async fn machine_status(State(manager): State<Arc<MachineManager>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        connected: manager.is_connected(),
    })
}

/// Enqueue a batch in order. Stops at the first rejection and reports how
/// many commands made it into the queue.
async fn post_commands(
    State(manager): State<Arc<MachineManager>>,
    Json(request): Json<CommandsRequest>,
) -> Result<Json<CommandsResponse>, ApiError> {
    if request.commands.is_empty() {
        return Err(ApiError::bad_request("commands must not be empty"));
    }

    let mut accepted = 0;
    for command in &request.commands {
        match manager.enqueue_command(command) {
            Ok(()) => accepted += 1,
            Err(err) => return Err(ApiError::from(err).with_accepted(accepted)),
        }
    }
    Ok(Json(CommandsResponse { accepted }))
}

async fn get_responses(
    State(manager): State<Arc<MachineManager>>,
    Query(query): Query<ResponsesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let max_bytes = query.max_bytes.min(MAX_DRAIN_BYTES);
    let bytes = manager.drain_responses(max_bytes)?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    ))
}

async fn put_machine_config(
    State(manager): State<Arc<MachineManager>>,
    Json(request): Json<MachineConfigRequest>,
) -> Result<StatusCode, ApiError> {
    manager.reconfigure(request.baud_rate).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_start(State(manager): State<Arc<MachineManager>>) -> Result<StatusCode, ApiError> {
    manager.resume()?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_stop(State(manager): State<Arc<MachineManager>>) -> Result<StatusCode, ApiError> {
    manager.pause().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_clear(State(manager): State<Arc<MachineManager>>) -> Result<StatusCode, ApiError> {
    manager.clear_pending_commands()?;
    Ok(StatusCode::NO_CONTENT)
}
