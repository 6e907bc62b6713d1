//! JSON response envelope shared by all API endpoints.
//!
//! Every payload is wrapped in `{success, data?, error?, details?}`;
//! paginated payloads additionally carry `{page, limit, total, pages}`.

use crate::error::{LookupError, StoreError};
use axum::Json;
use axum::response::{IntoResponse, Response};
use hyper::StatusCode;
use serde_json::{Value, json};

pub fn success(data: Value) -> Response {
    (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
}

pub fn success_with_message(data: Value, message: &str) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": data, "message": message })),
    )
        .into_response()
}

pub fn paginated(data: Value, page: u64, limit: u64, total: u64, pages: u64) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": data,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "pages": pages,
            },
        })),
    )
        .into_response()
}

pub fn failure(status: StatusCode, error: &str, details: Option<String>) -> Response {
    let mut body = json!({ "success": false, "error": error });
    if let Some(details) = details {
        body["details"] = Value::String(details);
    }
    (status, Json(body)).into_response()
}

/// Map lookup failures onto distinct HTTP statuses: caller faults are 400,
/// missing data 404, upstream trouble 502, everything internal 500.
pub fn lookup_error(err: &LookupError) -> Response {
    let (status, error) = match err {
        LookupError::InvalidKey(_) => (StatusCode::BAD_REQUEST, "Invalid access key"),
        LookupError::InvalidPath(_) => (StatusCode::BAD_REQUEST, "Invalid target directory"),
        LookupError::NotFound(_) => (StatusCode::NOT_FOUND, "Document not found"),
        LookupError::Upstream(_) => (StatusCode::BAD_GATEWAY, "Upstream query failed"),
        LookupError::Parse(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to parse upstream payload",
        ),
        LookupError::Store(StoreError::Connectivity(_)) | LookupError::Store(StoreError::Query(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
        LookupError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Filesystem error"),
    };
    failure(status, error, Some(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_maps_to_bad_request() {
        let response = lookup_error(&LookupError::InvalidKey("bad".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_path_maps_to_bad_request() {
        let response = lookup_error(&LookupError::InvalidPath("../escape".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = lookup_error(&LookupError::NotFound("missing".into()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn upstream_maps_to_bad_gateway() {
        let response = lookup_error(&LookupError::Upstream("boom".into()));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn parse_and_store_map_to_internal_error() {
        let response = lookup_error(&LookupError::Parse("bad xml".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = lookup_error(&LookupError::Store(StoreError::Query("syntax".into())));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
