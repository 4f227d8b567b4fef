use crate::config::Config;
use crate::error::{Error, ErrorResponse, Result};
use crate::handlers::{chat, health_check, root, AppState};
use crate::middleware::logging_middleware;
use crate::prompt::load_portfolio;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use std::any::Any;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyHeaders, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct Server {
    app: Router,
    state: AppState,
    bind_addr: SocketAddr,
    cleanup_interval: Duration,
}

impl Server {
    pub fn new(config: Config) -> Result<Self> {
        let portfolio = load_portfolio(config.portfolio_file.as_deref())?;

        let state = AppState::new(
            config.rate_limit(),
            config.gemini(),
            &portfolio,
            config.trust_proxy_headers,
        )?;

        if !state.chat.client().has_api_key() {
            tracing::warn!("GEMINI_API_KEY is not set; chat will reply with a configuration error");
        }

        let app = build_router(state.clone(), &config.cors_allowed_origins)?;

        Ok(Self {
            app,
            state,
            bind_addr: config.bind_addr,
            cleanup_interval: config.cleanup_interval(),
        })
    }

    pub async fn run(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!("Portfolio chatbot listening on {}", listener.local_addr()?);
        tracing::info!("Chat endpoint available at POST /chat");
        tracing::info!("Health check available at /health");

        let sweeper = spawn_sweeper(self.state.clone(), self.cleanup_interval);

        // Run server with graceful shutdown
        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        sweeper.abort();
        Ok(())
    }
}

/// Build the HTTP router around `state`
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Result<Router> {
    let routes = Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
        .route("/health", get(health_check))
        .with_state(state);

    with_layers(routes, allowed_origins)
}

/// Wrap `router` in tracing, CORS, panic recovery and request logging
pub fn with_layers(router: Router, allowed_origins: &[String]) -> Result<Router> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin.trim()).map_err(|_| Error::InvalidOrigin(origin.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AnyHeaders);

    // CORS wraps the panic handler so browsers can read its 500 body.
    Ok(router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(middleware::from_fn(logging_middleware)),
    ))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = %detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Something went wrong. Please try again!")),
    )
        .into_response()
}

/// Periodically drop rate limit entries that fell out of the window
fn spawn_sweeper(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;

        loop {
            interval.tick().await;
            match state.rate_limiter.sweep(Instant::now()) {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Swept idle rate limit entries"),
                Err(e) => tracing::error!(error = %e, "Rate limit sweep failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
