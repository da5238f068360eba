//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::state::{AppState, CardConfig, CountdownView, EntityState, HostSnapshot, TimerData};
use super::responses::{ApiResponse, DiscoveryResponse, ErrorResponse, HealthResponse};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal(e: String) -> ApiError {
    error!("{}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(e, "internal")),
    )
}

/// Recompute the view right away instead of waiting for the next tick
async fn refresh(state: &AppState) {
    if let Err(e) = state.run_tick(Utc::now()).await {
        warn!("Failed to refresh countdown: {}", e);
    }
}

/// Handle GET /countdown - Latest published countdown view
pub async fn countdown_handler(State(state): State<Arc<AppState>>) -> Result<Json<CountdownView>, StatusCode> {
    state.get_view().map(Json).map_err(|e| {
        error!("Failed to read countdown view: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Handle GET /config - Current card configuration
pub async fn get_config_handler(State(state): State<Arc<AppState>>) -> Result<Json<CardConfig>, StatusCode> {
    state.get_card_config().map(Json).map_err(|e| {
        error!("Failed to read card config: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Handle PUT /config - Replace the card configuration
pub async fn put_config_handler(
    State(state): State<Arc<AppState>>,
    Json(config): Json<CardConfig>,
) -> Result<Json<ApiResponse>, ApiError> {
    if let Err(e) = config.validate() {
        warn!("Rejected card configuration: {}", e);
        return Err((StatusCode::UNPROCESSABLE_ENTITY, Json(e.into())));
    }

    state.set_card_config(config).map_err(internal)?;
    refresh(&state).await;
    Ok(Json(ApiResponse::ok("Card configuration updated")))
}

/// Handle PUT /snapshot - Replace the whole host snapshot
pub async fn put_snapshot_handler(
    State(state): State<Arc<AppState>>,
    Json(snapshot): Json<HostSnapshot>,
) -> Result<Json<ApiResponse>, ApiError> {
    let count = snapshot.len();
    state.set_snapshot(snapshot).map_err(internal)?;
    refresh(&state).await;
    Ok(Json(ApiResponse::ok(format!("Snapshot replaced with {} entities", count))))
}

/// Handle PUT /states/:entity_id - Insert or replace one entity state
pub async fn put_entity_handler(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Json(entity): Json<EntityState>,
) -> Result<Json<ApiResponse>, ApiError> {
    state.upsert_entity(&entity_id, entity).map_err(internal)?;
    refresh(&state).await;
    Ok(Json(ApiResponse::ok(format!("{} updated", entity_id))))
}

/// Handle GET /timers/alexa - Discoverable Alexa timer sensors
pub async fn alexa_timers_handler(State(state): State<Arc<AppState>>) -> Result<Json<DiscoveryResponse>, ApiError> {
    let timers = state.timers().map_err(internal)?;
    let snapshot = state.get_snapshot().map_err(internal)?;
    Ok(Json(DiscoveryResponse {
        vendor: "alexa".to_string(),
        entity_ids: timers.get_available_alexa_timers(&snapshot, Utc::now()),
    }))
}

/// Handle GET /timers/google - Discoverable Google timer sensors
pub async fn google_timers_handler(State(state): State<Arc<AppState>>) -> Result<Json<DiscoveryResponse>, ApiError> {
    let timers = state.timers().map_err(internal)?;
    let snapshot = state.get_snapshot().map_err(internal)?;
    Ok(Json(DiscoveryResponse {
        vendor: "google".to_string(),
        entity_ids: timers.get_available_google_timers(&snapshot),
    }))
}

/// Handle GET /timers/:entity_id - Normalized data for one timer entity
pub async fn timer_handler(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<Json<TimerData>, ApiError> {
    let timers = state.timers().map_err(internal)?;
    let snapshot = state.get_snapshot().map_err(internal)?;

    timers
        .get_timer_data(&entity_id, &snapshot, Utc::now())
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(format!("{} is not a known timer", entity_id), "unknown_timer")),
            )
        })
}

/// Handle DELETE /cache - Forget all adapter memory
pub async fn clear_cache_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    state.cache.clear();
    info!("Timer caches cleared");
    Json(ApiResponse::ok("Timer caches cleared"))
}

/// Handle DELETE /cache/:entity_id - Forget adapter memory for one entity
pub async fn evict_cache_handler(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    if state.cache.evict(&entity_id) {
        info!("Evicted cache for {}", entity_id);
        Ok(Json(ApiResponse::ok(format!("Cache for {} evicted", entity_id))))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("No cache entry for {}", entity_id), "not_cached")),
        ))
    }
}

/// Handle POST /attach - Resume ticking
pub async fn attach_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    state.attach();
    refresh(&state).await;
    Json(ApiResponse::ok("Countdown attached"))
}

/// Handle POST /detach - Stop ticking and drop in-flight ticks
pub async fn detach_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    state.detach();
    Json(ApiResponse::ok("Countdown detached"))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.get_uptime(), state.is_attached()))
}
