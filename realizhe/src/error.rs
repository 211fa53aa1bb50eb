use thiserror::Error;

use crate::backend::BackendError;

/// Outcome of a storefront flow that did not complete. Messages are shown to
/// the customer as-is.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        StoreError::Invalid(message.into())
    }
}
