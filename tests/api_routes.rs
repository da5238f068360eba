//! Integration tests for the HTTP surface.
//!
//! Requests go straight through the router with `tower::ServiceExt::oneshot`,
//! no socket involved.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use countdown_engine::api::create_router;
use countdown_engine::state::{AppState, CardConfig};

// ============================================================================
// Test Helpers
// ============================================================================

fn app_state(config: CardConfig) -> Arc<AppState> {
    Arc::new(AppState::new(
        0,
        "127.0.0.1".to_string(),
        config,
        Duration::seconds(30),
    ))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn google_sensor(fire_in_secs: i64) -> Value {
    json!({
        "state": "set",
        "attributes": {
            "friendly_name": "Kitchen Display Timers",
            "timers": [
                {
                    "timer_id": "g1",
                    "status": "set",
                    "fire_time": (Utc::now() + Duration::seconds(fire_in_secs)).timestamp(),
                    "duration": 3600,
                    "label": "Roast"
                }
            ]
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = create_router(app_state(CardConfig::default()));
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["attached"], true);
}

#[tokio::test]
async fn test_put_config_rejects_sourceless_config() {
    let app = create_router(app_state(CardConfig::for_timer("timer.tea")));
    let (status, body) = send(&app, Method::PUT, "/config", Some(json!({ "show_seconds": false }))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "missing_source");

    let (_, config) = send(&app, Method::GET, "/config", None).await;
    assert_eq!(config["timer_entity"], "timer.tea");
}

#[tokio::test]
async fn test_config_change_recomputes_countdown() {
    let app = create_router(app_state(CardConfig::default()));

    let target = (Utc::now() + Duration::days(3) + Duration::hours(2)).to_rfc3339();
    let (status, _) = send(&app, Method::PUT, "/config", Some(json!({ "target_date": target }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, view) = send(&app, Method::GET, "/countdown", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["state"]["days"], 3);
    assert_eq!(view["expired"], false);
    assert!(view["error"].is_null());
}

#[tokio::test]
async fn test_sourceless_startup_reports_validation_error() {
    let state = app_state(CardConfig::default());
    state.run_tick(Utc::now()).await.unwrap();
    let app = create_router(state);

    let (_, view) = send(&app, Method::GET, "/countdown", None).await;
    assert_eq!(view["error"]["code"], "missing_source");
}

#[tokio::test]
async fn test_entity_upsert_and_timer_lookup() {
    let app = create_router(app_state(CardConfig::for_timer("sensor.kitchen_display_timers")));

    let (status, _) = send(
        &app,
        Method::PUT,
        "/states/sensor.kitchen_display_timers",
        Some(google_sensor(600)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, timer) = send(&app, Method::GET, "/timers/sensor.kitchen_display_timers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timer["vendor"], "google");
    assert_eq!(timer["status"], "active");
    assert_eq!(timer["details"]["label"], "Roast");

    let (_, view) = send(&app, Method::GET, "/countdown", None).await;
    assert_eq!(view["timer"]["entity_id"], "sensor.kitchen_display_timers");
    assert_eq!(view["color"], "#4285F4");

    let (status, body) = send(&app, Method::GET, "/timers/light.kitchen", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "unknown_timer");
}

#[tokio::test]
async fn test_discovery_lists() {
    let app = create_router(app_state(CardConfig::default()));
    let snapshot = json!({
        "sensor.kitchen_display_timers": google_sensor(120),
        "sensor.office_display_timers": { "state": "none", "attributes": { "timers": [] } },
        "light.porch": { "state": "on" }
    });

    let (status, _) = send(&app, Method::PUT, "/snapshot", Some(snapshot)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, google) = send(&app, Method::GET, "/timers/google", None).await;
    assert_eq!(google["entity_ids"], json!(["sensor.kitchen_display_timers"]));

    let (_, alexa) = send(&app, Method::GET, "/timers/alexa", None).await;
    assert_eq!(alexa["entity_ids"], json!([]));
}

#[tokio::test]
async fn test_cache_eviction() {
    let app = create_router(app_state(CardConfig::for_timer("sensor.kitchen_display_timers")));
    send(
        &app,
        Method::PUT,
        "/states/sensor.kitchen_display_timers",
        Some(google_sensor(600)),
    )
    .await;

    let (status, _) = send(&app, Method::DELETE, "/cache/sensor.kitchen_display_timers", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::DELETE, "/cache/sensor.kitchen_display_timers", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_cached");

    let (status, _) = send(&app, Method::DELETE, "/cache", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_detach_freezes_view_until_attach() {
    let state = app_state(CardConfig::for_target((Utc::now() + Duration::hours(5)).to_rfc3339()));
    let app = create_router(Arc::clone(&state));

    let (status, _) = send(&app, Method::POST, "/detach", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!state.is_attached());
    assert!(state.run_tick(Utc::now()).await.unwrap().is_none());

    let (_, health) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(health["attached"], false);

    send(&app, Method::POST, "/attach", None).await;
    let (_, view) = send(&app, Method::GET, "/countdown", None).await;
    assert_eq!(view["state"]["hours"], 4);
}
