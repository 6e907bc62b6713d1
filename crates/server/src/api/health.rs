//! Liveness endpoint.

/// Tag for OpenAPI documentation.
pub const MISC_TAG: &str = "Miscellaneous";

/// Liveness check.
#[tracing::instrument()]
#[utoipa::path(
    method(get, head),
    path = "/healthz",
    tag = MISC_TAG,
    operation_id = "Health Check",
    summary = "Liveness check",
    description = "Answers as soon as the router is up. Deliberately shallow: \
                   neither the database nor the SEFAZ endpoints are consulted, \
                   so an offline upstream never makes the process look dead.",
    responses(
        (status = 200, description = "Process is up", body = str, content_type = "text/plain", example = "ok")
    )
)]
pub async fn health() -> &'static str {
    "ok"
}
