use super::models::MediaId;
use super::validation::ValidationError;
use thiserror::Error;

/// Failures reported by the media catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The store could not be opened or created. Fatal at startup.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A CRUD call was issued before Initialize completed, or after Close.
    #[error("Catalog is not initialized")]
    NotInitialized,

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Media record {0} not found")]
    NotFound(MediaId),

    /// The engine rejected a write. Nothing was applied.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// The engine failed while answering a read.
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl CatalogError {
    /// Whether the caller may reissue the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::TransactionFailed(_) | CatalogError::QueryFailed(_)
        )
    }

    pub(crate) fn write(err: impl std::fmt::Display) -> Self {
        CatalogError::TransactionFailed(err.to_string())
    }

    pub(crate) fn read(err: impl std::fmt::Display) -> Self {
        CatalogError::QueryFailed(err.to_string())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
