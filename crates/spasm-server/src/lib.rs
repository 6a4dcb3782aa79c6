//! Spasm server library logic.

pub mod api;
pub mod api_events;
pub mod config;
pub mod dispatch;
pub mod filters;
pub mod pacing;
pub mod resolver;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use pacing::Pacing;
use serde_json::{json, Value};
use spasm_store::EventStore;
use spasm_types::{AppConfig, FeedConfig};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Storage backend.
    pub store: Arc<dyn EventStore>,
    /// Application settings, loaded once when the listener is ready.
    pub app_config: Arc<AppConfig>,
    /// Template cloned by every RSS request.
    pub feed_config: Arc<FeedConfig>,
    pub pacing: Pacing,
    /// The public URL of the server, if configured.
    pub public_url: Option<String>,
}

/// Maximum request body size (2 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/short-id/{id}", get(api::get_full_ids_handler))
        .route("/api/submit/", post(api::submit_event_handler))
        .route("/api/events", get(api_events::get_events_handler))
        .route("/api/events/{id}", get(api_events::get_event_handler))
        .route("/api/app-config", get(api::get_app_config_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}

/// Builds the process-wide [`AppConfig`]: `defaults` overlaid with whatever
/// the store holds.
///
/// A missing, malformed or unreadable stored configuration leaves the
/// defaults in place. Startup never fails here.
pub async fn load_app_config(store: Arc<dyn EventStore>, defaults: AppConfig) -> AppConfig {
    let stored = tokio::task::spawn_blocking(move || store.fetch_app_config()).await;

    let mut config = defaults;
    match stored {
        Ok(Ok(Some(value))) => {
            let applied = config.apply_stored(&value);
            if applied == 0 {
                tracing::warn!(stored = %value, "stored app config has no usable keys");
            } else {
                tracing::info!(applied, "loaded stored app config");
            }
        }
        Ok(Ok(None)) => tracing::info!("no stored app config, using defaults"),
        Ok(Err(e)) => tracing::warn!(error = %e, "failed to read app config, using defaults"),
        Err(e) => tracing::warn!(error = %e, "app config task failed, using defaults"),
    }
    config
}
