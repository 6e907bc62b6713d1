use hyper::StatusCode;
use sea_orm::DbErr;
use thiserror::Error;

/// Failures raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database unreachable: {0}")]
    Connectivity(String),
    #[error("query failed: {0}")]
    Query(String),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::Conn(e) => StoreError::Connectivity(e.to_string()),
            DbErr::ConnectionAcquire(e) => StoreError::Connectivity(e.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Failures raised by the outbound transport layer.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP status {status}: {context}")]
    Http { status: StatusCode, context: String },
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

impl RequestError {
    /// Only transport-level failures are retried. Application-level HTTP
    /// responses (4xx/5xx) are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RequestError::Timeout(_) | RequestError::Network(_))
    }
}

/// Failures raised by the document lookup service.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("invalid access key: {0}")]
    InvalidKey(String),
    #[error("upstream query failed: {0}")]
    Upstream(String),
    #[error("unparseable upstream payload: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid target directory: {0}")]
    InvalidPath(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}
