//! # normx-server: HTTP Service for Expression Normalization
//!
//! This binary crate exposes the memo and its normalization rules as a network service.
//! A binder (or a developer with `curl`) posts a bound expression tree and gets back its
//! normalized form, which is handy for inspecting what the rules do to a given input.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   | HTTP POST /normalize (bound tree as JSON)
//!   v
//! normx-server (this binary)
//!   |
//!   +-> register columns in a fresh memo
//!   +-> Memo::build (construct + normalize bottom-up)
//!   +-> Memo::extract / Memo::format
//!   |
//!   | HTTP response (normalized tree, rendering, statistics)
//!   v
//! Client
//! ```
//!
//! ## Endpoints
//!
//! - `GET  /health`    - Health check
//! - `GET  /rules`     - List normalization rules in the order they are tried
//! - `POST /normalize` - Normalize a bound expression tree
//!
//! ## Configuration
//!
//! The server listens on `NORMX_LISTEN` (default `0.0.0.0:3000`). Logging is controlled
//! by the `RUST_LOG` environment variable (defaults to `normx=debug`).

mod config;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .parse_lossy(std::env::var("RUST_LOG").unwrap_or_else(|_| "normx=debug".into())),
        )
        .init();

    let config = config::ServerConfig::from_env();
    let listen = config.listen.clone();
    let state = Arc::new(state::AppState::new(config));

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/rules", get(routes::list_rules))
        .route("/normalize", post(routes::normalize))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!("normx-server listening on http://{}", listen);
    axum::serve(listener, app).await
}
