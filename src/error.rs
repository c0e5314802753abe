use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Enter an email or username and a password")]
    MissingCredentials,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("Unauthorized request")]
    MissingToken,
    #[error("Invalid or expired access token")]
    InvalidOrExpiredToken,
    #[error("Refresh token is required")]
    MissingRefreshToken,
    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,
    #[error("User not found")]
    UserNotFound,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Refresh token is expired or already used")]
    RefreshTokenMismatch,
    #[error("persistence failure: {0:#}")]
    Persistence(anyhow::Error),
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCredentials
            | AppError::InvalidCredentials
            | AppError::Validation(_)
            | AppError::MissingRefreshToken
            | AppError::InvalidRefreshToken => StatusCode::BAD_REQUEST,
            AppError::MissingToken
            | AppError::InvalidOrExpiredToken
            | AppError::RefreshTokenMismatch => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Persistence(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Something went wrong".to_string()
        } else {
            tracing::debug!(%status, message = %self, "request rejected");
            self.to_string()
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}
