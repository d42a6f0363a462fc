//! Router configuration for the upload service.
//!
//! # Route Structure
//!
//! ```text
//! /health              - Health check
//! /slides              - List converted slides
//! /slides/{path}       - Converted .dzi files and tiles
//! /upload              - Multipart slide upload (POST)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use wsi_dzi::server::{create_router, AppState, RouterConfig};
//!
//! let router = create_router(AppState::new("."), RouterConfig::default());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, slide_file_handler, slides_handler, upload_handler, AppState,
};
use crate::config::DEFAULT_MAX_UPLOAD_SIZE;

// =============================================================================
// Router Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Request body limit for uploads, in bytes
    pub max_upload_size: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
            max_upload_size: usize::try_from(DEFAULT_MAX_UPLOAD_SIZE).unwrap_or(usize::MAX),
        }
    }
}

impl RouterConfig {
    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    pub fn with_max_upload_size(mut self, bytes: usize) -> Self {
        self.max_upload_size = bytes;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
pub fn create_router(state: AppState, config: RouterConfig) -> Router {
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/slides", get(slides_handler))
        .route("/slides/{*path}", get(slide_file_handler))
        .route(
            "/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(config.max_upload_size)),
        )
        .with_state(state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
