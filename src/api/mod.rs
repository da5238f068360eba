//! HTTP API module
//! 
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/countdown", get(countdown_handler))
        .route("/config", get(get_config_handler).put(put_config_handler))
        .route("/snapshot", put(put_snapshot_handler))
        .route("/states/:entity_id", put(put_entity_handler))
        .route("/timers/alexa", get(alexa_timers_handler))
        .route("/timers/google", get(google_timers_handler))
        .route("/timers/:entity_id", get(timer_handler))
        .route("/cache", delete(clear_cache_handler))
        .route("/cache/:entity_id", delete(evict_cache_handler))
        .route("/attach", post(attach_handler))
        .route("/detach", post(detach_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
