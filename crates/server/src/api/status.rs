//! SEFAZ status monitoring endpoints.
//!
//! - `/` - Most recent recorded status
//! - `/check` - On-demand probe
//! - `/history` - Transition history
//! - `/start-monitoring`, `/stop-monitoring` - Timer control
//! - `/simulate`, `/simulate/toggle` - Simulated status (non-production only)

use crate::api::ApiState;
use crate::response;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const STATUS_TAG: &str = "Status Monitor API";

const DEFAULT_HISTORY_LIMIT: u64 = 20;

/// Query parameters for the history endpoint.
#[derive(Deserialize, IntoParams, Debug)]
pub struct HistoryParams {
    /// Maximum number of transitions to return (default 20).
    pub limit: Option<u64>,
}

/// Creates the status monitor API router.
#[tracing::instrument(skip(state))]
pub fn router(state: ApiState) -> OpenApiRouter {
    let mut r = OpenApiRouter::new()
        .routes(routes!(get_status))
        .routes(routes!(check_status))
        .routes(routes!(get_history))
        .routes(routes!(start_monitoring))
        .routes(routes!(stop_monitoring));

    if !state.production {
        // Simulated status endpoints are deliberately absent from production
        // deployments and from the OpenAPI document.
        r = r
            .route("/simulate", get(get_simulated))
            .route("/simulate/toggle", post(toggle_simulated));
    }

    r.with_state(state)
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/",
    tag = STATUS_TAG,
    operation_id = "Get Current Status",
    summary = "Most recent recorded SEFAZ status",
    description = "Returns the latest recorded status. When no status has ever been \
                   recorded, a fresh probe is performed to seed one.",
    responses(
        (status = 200, description = "Current status", content_type = "application/json")
    )
)]
async fn get_status(State(state): State<ApiState>) -> Response {
    let current = state.monitor.current_status().await;
    response::success(json!(current))
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/check",
    tag = STATUS_TAG,
    operation_id = "Check Status Now",
    summary = "Probe the SEFAZ status endpoint immediately",
    description = "Performs one on-demand probe and runs the outcome through the same \
                   transition detection as the recurring monitor. Probe failures resolve \
                   to an offline status with diagnostic detail, never an error.",
    responses(
        (status = 200, description = "Probe outcome", content_type = "application/json")
    )
)]
async fn check_status(State(state): State<ApiState>) -> Response {
    let outcome = state.monitor.check_now().await;
    response::success(json!(outcome))
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/history",
    params(HistoryParams),
    tag = STATUS_TAG,
    operation_id = "Get Status History",
    summary = "Status transition history, newest first",
    description = "Returns up to `limit` recorded transitions. The history is a \
                   transition log: consecutive identical states are coalesced at \
                   write time. Fails soft to an empty list when the store is \
                   unavailable.",
    responses(
        (status = 200, description = "Transition history", content_type = "application/json")
    )
)]
async fn get_history(
    Query(params): Query<HistoryParams>,
    State(state): State<ApiState>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = state.monitor.history(limit).await;
    response::success(json!(history))
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/start-monitoring",
    tag = STATUS_TAG,
    operation_id = "Start Monitoring",
    summary = "Arm the recurring status monitor",
    description = "Performs one immediate probe and arms the recurring timer. \
                   Calling while already running replaces the existing timer; it \
                   never creates a second one.",
    responses(
        (status = 200, description = "Monitoring started", content_type = "application/json")
    )
)]
async fn start_monitoring(State(state): State<ApiState>) -> Response {
    state.monitor.start_monitoring().await;
    response::success_with_message(json!({ "running": true }), "monitoring started")
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/stop-monitoring",
    tag = STATUS_TAG,
    operation_id = "Stop Monitoring",
    summary = "Disarm the recurring status monitor",
    description = "Stops future scheduled probes. Safe to call when the monitor is \
                   not running; a probe already in flight is not interrupted.",
    responses(
        (status = 200, description = "Monitoring stopped", content_type = "application/json")
    )
)]
async fn stop_monitoring(State(state): State<ApiState>) -> Response {
    state.monitor.stop_monitoring().await;
    response::success_with_message(json!({ "running": false }), "monitoring stopped")
}

async fn get_simulated(State(state): State<ApiState>) -> Response {
    let outcome = state.monitor.simulated_outcome();
    response::success(json!(outcome))
}

async fn toggle_simulated(State(state): State<ApiState>) -> Response {
    let online = state.monitor.toggle_simulated().await;
    response::success_with_message(
        json!({ "online": online }),
        if online {
            "simulated status set to online"
        } else {
            "simulated status set to offline"
        },
    )
}
