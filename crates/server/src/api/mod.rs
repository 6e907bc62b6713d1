//! API module providing the HTTP façade.
//!
//! This module is organized into submodules:
//! - `documents` - Document lookup and cache endpoints (/api/document*, /api/documents*)
//! - `status` - SEFAZ status monitoring endpoints (/api/status/*)
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod documents;
pub mod health;
pub mod openapi;
pub mod status;

pub use documents::DOCUMENTS_TAG;
pub use health::MISC_TAG;
pub use status::STATUS_TAG;

use crate::lookup::DocumentService;
use crate::monitor::StatusMonitor;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Shared state for all API endpoints.
#[derive(Clone)]
pub struct ApiState {
    pub monitor: Arc<StatusMonitor>,
    pub documents: Arc<DocumentService>,
    /// Production deployments hide the simulated-status endpoints.
    pub production: bool,
}

/// Builds the application router with all routes and middleware attached.
pub fn build_router(state: ApiState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/api", documents::router(state.clone()))
        .nest("/api/status", status::router(state))
        .routes(routes!(health::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(state))]
pub async fn start_webserver(state: ApiState, listen_addr: &str) -> color_eyre::Result<()> {
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "server listening");
    axum::serve(listener, router)
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
