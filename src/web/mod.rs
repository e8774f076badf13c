//! Web layer
//!
//! Thin axum surface over the [`Resolver`]. Handlers do no resolution work
//! themselves; they pick a status code and serialise what the resolver
//! returned.

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::services::Resolver;

pub mod api;
pub mod responses;

pub use responses::StatusEnvelope;

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, resolver: Arc<Resolver>) -> Result<Self> {
        let app = Self::create_router(AppState { resolver });
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        Ok(Self { app, addr })
    }

    /// Create the router with all routes and middleware
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(api::health_check))
            .route("/api/v2/stream_info", get(api::stream_info))
            .route("/api/v2/past_stream", get(api::past_stream))
            .route("/api/stream_info", get(api::legacy_stream_info))
            .route("/api/internal/discovery", get(api::discovery))
            // Middleware (applied in reverse order)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the web server
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}
