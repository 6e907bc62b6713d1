//! Document lookup and cache endpoints.
//!
//! - `/document/{key}/lookup` - Cache-first lookup (may call upstream)
//! - `/document/{key}` - Cached details only
//! - `/document/{key}/xml` - Raw XML download
//! - `/document/{key}/save-xml` - Persist the XML to disk
//! - `/documents` - Paginated cache listing
//! - `/documents-rejected` - Paginated listing of rejected documents

use crate::api::ApiState;
use crate::response;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use hyper::{StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const DOCUMENTS_TAG: &str = "Documents API";

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;

/// Pagination query parameters.
#[derive(Deserialize, IntoParams, Debug)]
pub struct PageParams {
    /// 1-based page number (default 1).
    pub page: Option<u64>,
    /// Page size (default 10, capped at 100).
    pub limit: Option<u64>,
}

impl PageParams {
    fn resolve(&self) -> (u64, u64) {
        let page = self.page.unwrap_or(DEFAULT_PAGE).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }
}

/// Request body for saving a document XML to disk.
#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct SaveXmlRequest {
    /// Subdirectory beneath the configured export directory. Absolute paths
    /// and parent traversal are rejected.
    pub directory: Option<String>,
}

/// Creates the documents API router.
#[tracing::instrument(skip(state))]
pub fn router(state: ApiState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(lookup_document))
        .routes(routes!(get_document))
        .routes(routes!(get_document_xml))
        .routes(routes!(save_document_xml))
        .routes(routes!(list_documents))
        .routes(routes!(list_rejected))
        .with_state(state)
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/document/{access_key}/lookup",
    params(("access_key" = String, Path, description = "44-digit document access key")),
    tag = DOCUMENTS_TAG,
    operation_id = "Lookup Document",
    summary = "Cache-first document lookup",
    description = "Returns the document for the given access key. The local cache is \
                   consulted first; on a miss the upstream SEFAZ query service is \
                   called, the response normalized and cached. The `fromCache` field \
                   tells which path answered.",
    responses(
        (status = 200, description = "Document found", content_type = "application/json"),
        (status = 400, description = "Malformed access key", content_type = "application/json"),
        (status = 502, description = "Upstream query failed", content_type = "application/json"),
        (status = 500, description = "Parse or database failure", content_type = "application/json")
    )
)]
async fn lookup_document(
    Path(access_key): Path<String>,
    State(state): State<ApiState>,
) -> Response {
    match state.documents.lookup(&access_key).await {
        Ok(result) => (
            StatusCode::OK,
            axum::Json(json!({
                "success": true,
                "fromCache": result.from_cache,
                "data": result.document,
            })),
        )
            .into_response(),
        Err(err) => response::lookup_error(&err),
    }
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/document/{access_key}",
    params(("access_key" = String, Path, description = "44-digit document access key")),
    tag = DOCUMENTS_TAG,
    operation_id = "Get Document Details",
    summary = "Cached document details",
    description = "Returns the cached record without consulting the upstream service. \
                   404 when the document has never been looked up.",
    responses(
        (status = 200, description = "Document found in cache", content_type = "application/json"),
        (status = 400, description = "Malformed access key", content_type = "application/json"),
        (status = 404, description = "Document not cached", content_type = "application/json")
    )
)]
async fn get_document(Path(access_key): Path<String>, State(state): State<ApiState>) -> Response {
    match state.documents.get_document(&access_key).await {
        Ok(Some(document)) => response::success(json!(document)),
        Ok(None) => response::failure(
            StatusCode::NOT_FOUND,
            "Document not found in cache",
            None,
        ),
        Err(err) => response::lookup_error(&err),
    }
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/document/{access_key}/xml",
    params(("access_key" = String, Path, description = "44-digit document access key")),
    tag = DOCUMENTS_TAG,
    operation_id = "Get Document XML",
    summary = "Raw document XML",
    description = "Returns the original upstream XML as an attachment, fetching it \
                   from upstream when the cache has no payload.",
    responses(
        (status = 200, description = "Document XML", content_type = "application/xml"),
        (status = 400, description = "Malformed access key", content_type = "application/json"),
        (status = 404, description = "No XML obtainable", content_type = "application/json")
    )
)]
async fn get_document_xml(
    Path(access_key): Path<String>,
    State(state): State<ApiState>,
) -> Response {
    match state.documents.raw_xml(&access_key).await {
        Ok(xml) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/xml".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"nfe-{access_key}.xml\""),
                ),
            ],
            xml,
        )
            .into_response(),
        Err(err) => response::lookup_error(&err),
    }
}

#[tracing::instrument(skip(state, body))]
#[utoipa::path(
    post,
    path = "/document/{access_key}/save-xml",
    params(("access_key" = String, Path, description = "44-digit document access key")),
    request_body(content = SaveXmlRequest, description = "Optional export subdirectory"),
    tag = DOCUMENTS_TAG,
    operation_id = "Save Document XML",
    summary = "Write the document XML to disk",
    responses(
        (status = 200, description = "XML written", content_type = "application/json"),
        (status = 400, description = "Malformed access key or target directory", content_type = "application/json"),
        (status = 404, description = "No XML obtainable", content_type = "application/json")
    )
)]
async fn save_document_xml(
    Path(access_key): Path<String>,
    State(state): State<ApiState>,
    body: Option<axum::Json<SaveXmlRequest>>,
) -> Response {
    let directory = body.as_ref().and_then(|b| b.directory.clone());
    match state
        .documents
        .save_xml(&access_key, directory.as_deref())
        .await
    {
        Ok(path) => response::success_with_message(
            json!({ "filePath": path.to_string_lossy() }),
            "XML saved",
        ),
        Err(err) => response::lookup_error(&err),
    }
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/documents",
    params(PageParams),
    tag = DOCUMENTS_TAG,
    operation_id = "List Documents",
    summary = "Paginated listing of cached documents",
    responses(
        (status = 200, description = "Document page", content_type = "application/json"),
        (status = 500, description = "Database failure", content_type = "application/json")
    )
)]
async fn list_documents(Query(params): Query<PageParams>, State(state): State<ApiState>) -> Response {
    let (page, limit) = params.resolve();
    match state.documents.list_documents(page, limit).await {
        Ok(result) => response::paginated(
            json!(result.documents),
            result.page,
            result.limit,
            result.total,
            result.pages,
        ),
        Err(err) => response::lookup_error(&err),
    }
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/documents-rejected",
    params(PageParams),
    tag = DOCUMENTS_TAG,
    operation_id = "List Rejected Documents",
    summary = "Paginated listing of rejected documents",
    description = "Rejected documents ordered by query time descending. When the \
                   store schema is missing the optional rejection columns, the \
                   listing degrades to the core columns and says so in `message` \
                   instead of failing.",
    responses(
        (status = 200, description = "Rejected document page", content_type = "application/json"),
        (status = 500, description = "Database failure", content_type = "application/json")
    )
)]
async fn list_rejected(Query(params): Query<PageParams>, State(state): State<ApiState>) -> Response {
    let (page, limit) = params.resolve();
    match state.documents.list_rejected(page, limit).await {
        Ok(result) => {
            if result.degraded {
                (
                    StatusCode::OK,
                    axum::Json(json!({
                        "success": true,
                        "data": result.documents,
                        "pagination": {
                            "page": result.page,
                            "limit": result.limit,
                            "total": result.total,
                            "pages": result.pages,
                        },
                        "message": "partial data: rejection details unavailable",
                    })),
                )
                    .into_response()
            } else {
                response::paginated(
                    json!(result.documents),
                    result.page,
                    result.limit,
                    result.total,
                    result.pages,
                )
            }
        }
        Err(err) => response::lookup_error(&err),
    }
}
