use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::chat::ChatService;
use crate::error::{ApiError, Result};
use crate::gemini::GeminiConfig;
use crate::middleware::client_ip;
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::response::{ChatResponse, HealthResponse, ServiceInfo};

/// Longest accepted message, in characters
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub rate_limiter: Arc<RateLimiter>,
    pub chat: Arc<ChatService>,
    pub trust_proxy_headers: bool,
}

impl AppState {
    pub fn new(
        rate_limit: RateLimitConfig,
        gemini: GeminiConfig,
        portfolio: &str,
        trust_proxy_headers: bool,
    ) -> Result<Self> {
        Ok(Self {
            rate_limiter: Arc::new(RateLimiter::new(rate_limit)?),
            chat: Arc::new(ChatService::new(portfolio, gemini)?),
            trust_proxy_headers,
        })
    }
}

/// Body of a chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
}

impl ChatRequest {
    /// Parse and validate a raw request body
    pub fn from_body(body: &[u8]) -> std::result::Result<Self, ApiError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::InvalidJson)?;

        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .ok_or(ApiError::MissingMessage)?;

        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ApiError::MessageTooLong {
                max_chars: MAX_MESSAGE_CHARS,
            });
        }

        Ok(Self {
            message: message.to_string(),
        })
    }
}

/// Service description
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::running())
}

/// Answer a visitor question
pub async fn chat(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Json<ChatResponse>, ApiError> {
    let client = client_ip(
        &headers,
        connect_info.map(|ConnectInfo(addr)| addr),
        state.trust_proxy_headers,
    );

    let decision = state.rate_limiter.admit(&client)?;
    if !decision.allowed {
        tracing::info!(client = %client, count = decision.count, "Rate limited chat request");
        return Err(ApiError::RateLimited {
            retry_after_secs: decision.retry_after_secs().unwrap_or(1),
        });
    }

    let request = ChatRequest::from_body(&body)?;

    let response = state.chat.reply(&request.message).await;

    Ok(Json(ChatResponse { response }))
}

/// Liveness plus a view of the rate limiter
pub async fn health_check(
    State(state): State<AppState>,
) -> std::result::Result<Json<HealthResponse>, ApiError> {
    let rate_limits = state.rate_limiter.snapshot()?;
    Ok(Json(HealthResponse::ok(rate_limits)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    #[test]
    fn test_message_is_trimmed() {
        let request = ChatRequest::from_body(br#"{"message": "  Where should I eat?  "}"#).unwrap();
        assert_eq!(request.message, "Where should I eat?");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ChatRequest::from_body(b"{message: hi"),
            Err(ApiError::InvalidJson)
        ));
        assert!(matches!(ChatRequest::from_body(b""), Err(ApiError::InvalidJson)));
    }

    #[test]
    fn test_missing_or_blank_message() {
        for body in [
            r#"{}"#,
            r#"{"message": ""}"#,
            r#"{"message": "   "}"#,
            r#"{"message": null}"#,
            r#"{"message": 42}"#,
            r#"["message"]"#,
        ] {
            assert!(
                matches!(ChatRequest::from_body(body.as_bytes()), Err(ApiError::MissingMessage)),
                "body {} should be rejected",
                body
            );
        }
    }

    #[test]
    fn test_length_counts_characters() {
        let at_limit = serde_json::json!({ "message": "ラ".repeat(500) }).to_string();
        assert!(ChatRequest::from_body(at_limit.as_bytes()).is_ok());

        let too_long = serde_json::json!({ "message": "a".repeat(501) }).to_string();
        assert!(matches!(
            ChatRequest::from_body(too_long.as_bytes()),
            Err(ApiError::MessageTooLong { max_chars: 500 })
        ));
    }

    #[tokio::test]
    async fn test_poisoned_limiter_answers_internal_error() {
        let state = AppState::new(
            RateLimitConfig::default(),
            GeminiConfig::default(),
            "Likes ramen.",
            false,
        )
        .unwrap();
        state.rate_limiter.poison();
        let app = build_router(state, &["https://sorenumstot.com".to_string()]).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message": "hi"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "error": "Something went wrong. Please try again!" })
        );
    }
}
