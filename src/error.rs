use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while setting up or running the service
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] validator::ValidationErrors),

    #[error("Failed to read portfolio file {path}: {source}")]
    Portfolio {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid CORS origin: {0}")]
    InvalidOrigin(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Rate limiter state lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned to HTTP callers of the chat endpoints
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Too many requests. Please wait a bit!")]
    RateLimited { retry_after_secs: u64 },

    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Please provide a message")]
    MissingMessage,

    #[error("Message too long. Please keep it under {max_chars} characters.")]
    MessageTooLong { max_chars: usize },

    #[error("Something went wrong. Please try again!")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidJson | ApiError::MissingMessage => StatusCode::BAD_REQUEST,
            // Clients of the portfolio site rely on the plain 200 here.
            ApiError::MessageTooLong { .. } => StatusCode::OK,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Chat request failed");
        }

        let status = self.status_code();
        let mut response = (status, Json(ErrorResponse::new(self.to_string()))).into_response();

        if let ApiError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::RateLimited { retry_after_secs: 5 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::InvalidJson.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingMessage.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::MessageTooLong { max_chars: 500 }.status_code(),
            StatusCode::OK
        );
        assert_eq!(
            ApiError::Internal("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_hide_internal_detail() {
        let err = ApiError::from(Error::LockPoisoned);
        assert_eq!(err.to_string(), "Something went wrong. Please try again!");
        assert_eq!(
            ApiError::MessageTooLong { max_chars: 500 }.to_string(),
            "Message too long. Please keep it under 500 characters."
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
