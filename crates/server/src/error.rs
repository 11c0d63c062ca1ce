use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reckon_core::{AuthError, StoreError};
use reckon_import::IngestError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(e) => store_status(e),
            ApiError::Ingest(e) => match e {
                IngestError::UnreadableInput(_) | IngestError::InvalidRequest(_) => {
                    StatusCode::BAD_REQUEST
                }
                IngestError::Store(e) => store_status(e),
            },
        }
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::InvalidData(_) | StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
