pub mod chat;
pub mod config;
pub mod error;
pub mod gemini;
pub mod handlers;
pub mod middleware;
pub mod prompt;
pub mod rate_limiter;
pub mod response;
pub mod server;

pub use config::Config;
pub use error::{ApiError, Error, Result};
pub use handlers::AppState;
pub use server::{build_router, with_layers, Server};
