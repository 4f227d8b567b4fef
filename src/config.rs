use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::gemini::{GeminiConfig, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::rate_limiter::RateLimitConfig;

/// Portfolio chatbot backend
#[derive(Debug, Clone, Parser, Validate)]
#[command(name = "portfolio-chatbot", version, about)]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:4567")]
    pub bind_addr: SocketAddr,

    /// Gemini API key; chat replies with a configuration error when unset
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub gemini_model: String,

    /// Base URL of the Gemini REST API
    #[arg(long, env = "GEMINI_API_BASE", default_value = DEFAULT_API_BASE)]
    pub gemini_api_base: String,

    /// Sampling temperature
    #[arg(long, env = "GEMINI_TEMPERATURE", default_value_t = 0.4)]
    pub gemini_temperature: f32,

    /// Maximum tokens in a generated reply
    #[arg(long, env = "GEMINI_MAX_OUTPUT_TOKENS", default_value_t = 200)]
    pub gemini_max_output_tokens: u32,

    /// Chat requests admitted per client within one window
    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS", default_value_t = 10)]
    pub rate_limit_max_requests: usize,

    /// Rate limit window in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 3600)]
    pub rate_limit_window_secs: u64,

    /// Maximum number of client histories kept in memory
    #[arg(long, env = "RATE_LIMIT_MAX_CLIENTS", default_value_t = 10_000)]
    pub rate_limit_max_clients: usize,

    /// Interval between sweeps of idle rate limit entries, in seconds
    #[arg(long, env = "CLEANUP_INTERVAL_SECS", default_value_t = 300)]
    #[validate(range(min = 1))]
    pub cleanup_interval_secs: u64,

    /// Origins allowed to call the API from a browser
    #[arg(
        long,
        env = "CORS_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "https://sorenumstot.com,http://localhost:4567,http://192.168.0.13:4567"
    )]
    #[validate(length(min = 1))]
    pub cors_allowed_origins: Vec<String>,

    /// Use X-Forwarded-For / X-Real-IP to identify clients
    #[arg(long, env = "TRUST_PROXY_HEADERS", default_value_t = false)]
    pub trust_proxy_headers: bool,

    /// Read portfolio text from this file instead of the built-in copy
    #[arg(long, env = "PORTFOLIO_FILE")]
    pub portfolio_file: Option<PathBuf>,

    /// Log level for this crate when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from command line arguments and environment variables
    pub fn from_env() -> Result<Self, crate::Error> {
        let config = Config::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit_max_requests,
            window_secs: self.rate_limit_window_secs,
            max_tracked_clients: self.rate_limit_max_clients,
        }
    }

    pub fn gemini(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.gemini_api_key.clone(),
            model: self.gemini_model.clone(),
            base_url: self.gemini_api_base.clone(),
            temperature: self.gemini_temperature,
            max_output_tokens: self.gemini_max_output_tokens,
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_arguments() {
        let config = Config::try_parse_from([
            "portfolio-chatbot",
            "--bind-addr",
            "127.0.0.1:8080",
            "--gemini-api-key",
            "abc",
            "--rate-limit-max-requests",
            "5",
            "--cors-allowed-origins",
            "https://a.example,https://b.example",
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.gemini().api_key.as_deref(), Some("abc"));
        assert_eq!(config.rate_limit().max_requests, 5);
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_invalid_bind_addr() {
        let result = Config::try_parse_from(["portfolio-chatbot", "--bind-addr", "localhost"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_cleanup_interval_fails_validation() {
        let config =
            Config::try_parse_from(["portfolio-chatbot", "--cleanup-interval-secs", "0"]).unwrap();
        assert!(config.validate().is_err());
    }
}
