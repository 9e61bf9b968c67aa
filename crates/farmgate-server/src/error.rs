use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use farmgate_core::engine::CheckError;
use farmgate_core::schema::{BreakingChange, SchemaError, ValidationError};
use farmgate_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("check error: {0}")]
    Check(#[from] CheckError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("schema exceeds limits: {}", join(.0))]
    Limits(Vec<ValidationError>),

    #[error("breaking schema changes detected (use force=true to override): {}", join(.0))]
    BreakingChanges(Vec<BreakingChange>),

    #[error("invalid relationship {tuple}: {reason}")]
    InvalidRelationship { tuple: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Check(CheckError::TypeNotFound(_))
            | ApiError::Check(CheckError::PermissionNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Check(CheckError::EvaluationTooDeep(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Check(CheckError::StoreUnavailable(_)) | ApiError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Schema(_)
            | ApiError::Limits(_)
            | ApiError::InvalidRelationship { .. }
            | ApiError::InvalidRequest(_)
            | ApiError::Storage(StorageError::SnapshotAhead { .. })
            | ApiError::Storage(StorageError::SnapshotCompacted { .. }) => StatusCode::BAD_REQUEST,
            ApiError::BreakingChanges(_) => StatusCode::CONFLICT,
            ApiError::Storage(StorageError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
