use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::backend::BackendError;
use crate::error::StoreError;

pub const MISSING_BACKEND_MESSAGE: &str = "Configuração do Supabase ausente. Defina SUPABASE_URL, SUPABASE_ANON_KEY e SUPABASE_SERVICE_ROLE_KEY.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Nao autenticado.")]
    Unauthorized,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Requisicao muito grande.")]
    PayloadTooLarge,
    #[error("{}", MISSING_BACKEND_MESSAGE)]
    NotConfigured,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotConfigured | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a flow error. Backend failures become a 500 whose message comes
    /// from `describe`, except a missing backend configuration.
    pub fn from_store(err: StoreError, describe: impl FnOnce(&BackendError) -> String) -> Self {
        match err {
            StoreError::Invalid(message) => ApiError::BadRequest(message),
            StoreError::Conflict(message) => ApiError::Conflict(message),
            StoreError::Internal(message) => ApiError::Internal(message),
            StoreError::Backend(err) => ApiError::from_backend(&err, describe),
        }
    }

    pub fn from_backend(err: &BackendError, describe: impl FnOnce(&BackendError) -> String) -> Self {
        if err.is_not_configured() {
            error!(error = %err, "backend is not configured");
            return ApiError::NotConfigured;
        }
        error!(error = %err, "backend request failed");
        ApiError::Internal(describe(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}
