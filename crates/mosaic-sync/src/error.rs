//! Error type for synchronization operations.

use catalog_client::CatalogError;
use pattern_parser::PatternError;
use thiserror::Error;

/// Result type alias for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Primary error type for the synchronization core.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A filename did not fit the configured pattern. This is the only
    /// error kind the adder loop suppresses at its per-message boundary.
    #[error("filename pattern mismatch: {0}")]
    PatternMismatch(#[from] PatternError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("can't add granules to filesystem '{0}'")]
    UnsupportedFilesystem(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("missing configuration key '{0}'")]
    MissingConfig(&'static str),

    #[error("subscription failed: {0}")]
    Subscription(String),

    #[error("property bundle failed: {0}")]
    Bundle(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for SyncError {
    fn from(err: zip::result::ZipError) -> Self {
        SyncError::Bundle(err.to_string())
    }
}

impl From<serde_yaml::Error> for SyncError {
    fn from(err: serde_yaml::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}
