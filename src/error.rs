use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Unknown project: {0}")]
    UnknownProject(String),

    #[error("Unknown commit: {0}")]
    UnknownCommit(String),

    #[error("Backend request failed: {0}")]
    Backend(String),

    #[error("Backend returned {status}: {message}")]
    BackendStatus { status: u16, message: String },

    #[error("Invalid submission")]
    Validation(Vec<FieldError>),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        DashboardError::Backend(err.to_string())
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::UnknownProject(_) => StatusCode::NOT_FOUND,
            DashboardError::UnknownCommit(_) => StatusCode::NOT_FOUND,
            DashboardError::Backend(_) => StatusCode::BAD_GATEWAY,
            DashboardError::BackendStatus { .. } => StatusCode::BAD_GATEWAY,
            DashboardError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DashboardError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DashboardError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            DashboardError::Validation(fields) => serde_json::json!({
                "error": self.to_string(),
                "fields": fields,
            }),
            _ => serde_json::json!({
                "error": self.to_string(),
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}
