//! Error type for catalog REST operations.

use thiserror::Error;

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// All transport and service failures surface as a single request-failed
/// kind; callers decide whether a failed request is fatal.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    RequestFailed(String),
}

impl CatalogError {
    pub fn request(message: impl Into<String>) -> Self {
        CatalogError::RequestFailed(message.into())
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::RequestFailed(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::RequestFailed(format!("response decode failed: {}", err))
    }
}
