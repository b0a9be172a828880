use arbor_core::ArborError;
use arbor_sync::SyncError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    Api(#[from] ArborError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SyncError> for WebError {
    fn from(err: SyncError) -> Self {
        WebError::Api(err.into())
    }
}

impl WebError {
    fn status(&self) -> StatusCode {
        match self {
            WebError::Api(ArborError::Validation(_)) => StatusCode::BAD_REQUEST,
            WebError::Api(ArborError::Auth(_)) => StatusCode::UNAUTHORIZED,
            WebError::Api(ArborError::Permission(_)) => StatusCode::FORBIDDEN,
            WebError::Api(ArborError::NotFound(_)) => StatusCode::NOT_FOUND,
            WebError::Api(ArborError::Upstream(_) | ArborError::Internal(_))
            | WebError::Config(_)
            | WebError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            WebError::Api(err) => err.kind(),
            WebError::Config(_) | WebError::Io(_) => "internal_error",
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;
