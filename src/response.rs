use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: String,
    pub status: String,
    pub endpoints: Vec<String>,
}

impl ServiceInfo {
    pub fn running() -> Self {
        Self {
            message: "Soren's Portfolio Chatbot API".to_string(),
            status: "running".to_string(),
            endpoints: vec!["/chat (POST)".to_string(), "/health (GET)".to_string()],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub rate_limits: BTreeMap<String, usize>,
}

impl HealthResponse {
    pub fn ok(rate_limits: BTreeMap<String, usize>) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            rate_limits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let mut rate_limits = BTreeMap::new();
        rate_limits.insert("203.0.113.9".to_string(), 4);

        let json = serde_json::to_value(HealthResponse::ok(rate_limits)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["rate_limits"]["203.0.113.9"], 4);
        assert!(json["timestamp"].as_u64().unwrap() > 1_600_000_000);
    }
}
