//! Route definitions and router construction.

use axum::Router;
use axum::routing::get;
use deployd_core::{CONTROL_PATH, OBSERVER_PATH};
use std::path::Path;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::bootstrap::CorsConfig;
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            use axum::http::HeaderValue;
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Create the router with the health probe and both WebSocket endpoints.
///
/// For serving the UI as well, use [`create_spa_router`].
pub fn create_router(state: AppState, cors_config: &CorsConfig) -> Router {
    let cors = build_cors_layer(cors_config);

    Router::new()
        .route("/health", get(health_check))
        .route(OBSERVER_PATH, get(handlers::observer_ws::observer_ws))
        .route(CONTROL_PATH, get(handlers::control_ws::control_ws))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Create a router that also serves static assets from `static_dir`.
///
/// Unknown paths fall back to `index.html` so client-side routing works.
pub fn create_spa_router<P: AsRef<Path>>(
    state: AppState,
    static_dir: P,
    cors_config: &CorsConfig,
) -> Router {
    let static_path = static_dir.as_ref();
    let index_path = static_path.join("index.html");

    let serve_dir = ServeDir::new(static_path).fallback(ServeFile::new(&index_path));

    create_router(state, cors_config).fallback_service(serve_dir)
}

/// Health check endpoint.
pub(crate) async fn health_check() -> &'static str {
    "OK"
}
