//! HTTP surface driven through the router without a listener.
//!
//! Run with: cargo test --test routes_test

mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use common::{DOOR, FakeSource, HOUR, ManualClock, NOW, p, sensor};
use uptime_timeline::common::AppState;
use uptime_timeline::config::Config;
use uptime_timeline::routes::build_router;
use uptime_timeline::services::MemoryStore;

fn app(source: FakeSource) -> Router {
    let config = Config {
        disable_rate_limiting: true,
        ..Config::default()
    };
    let state = AppState::with_clock(
        config,
        Arc::new(source),
        Arc::new(MemoryStore::new(1024 * 1024)),
        ManualClock::new(NOW),
    );
    build_router(state).unwrap()
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn healthz_is_ok() {
    let app = app(FakeSource::default());
    let (status, body) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn timeline_returns_one_bar_per_amount() {
    let source = FakeSource::new(
        vec![p(NOW - 30 * HOUR, "off"), p(NOW - 6 * HOUR, "on")],
        Some(sensor("on", NOW - 6 * HOUR)),
    );
    let app = app(source);

    let (status, body) = get(
        &app,
        "/api/timelines/binary_sensor.door?hours_to_show=24&bar_amount=12&alias_ok=Open",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entityId"], DOOR);
    assert_eq!(body["refreshed"], true);
    assert_eq!(body["windowLabel"], "1 day ago");
    assert_eq!(body["current"]["status"], "ok");
    assert_eq!(body["current"]["label"], "Open");
    assert_eq!(body["lastFetched"], NOW);

    let bars = body["bars"].as_array().unwrap();
    assert_eq!(bars.len(), 12);
    assert_eq!(bars[11]["to"], NOW);
    assert_eq!(bars[11]["status"], "ok");
    // Nothing is known before the first fetched point
    assert_eq!(bars[0]["status"], "none");

    // Points endpoint now serves the cached snapshot
    let (status, points) = get(&app, "/api/timelines/binary_sensor.door/points").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(points["points"][0]["y"], "on");
    assert_eq!(points["hoursToShow"], 24.0);
}

#[tokio::test]
async fn second_request_within_ten_seconds_is_served_from_cache() {
    let source = FakeSource::new(vec![p(NOW - HOUR, "on")], Some(sensor("on", NOW - HOUR)));
    let app = app(source);

    let (_, first) = get(&app, "/api/timelines/binary_sensor.door").await;
    let (status, second) = get(&app, "/api/timelines/binary_sensor.door").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["refreshed"], true);
    assert_eq!(second["refreshed"], false);
    assert_eq!(second["lastFetched"], first["lastFetched"]);
}

#[tokio::test]
async fn missing_sensor_yields_unknown_without_fetching() {
    let app = app(FakeSource::default());

    let (status, body) = get(&app, "/api/timelines/binary_sensor.ghost?bar_amount=3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refreshed"], false);
    assert_eq!(body["current"]["label"], "Unknown");
    assert_eq!(body["current"]["status"], "unknown");
    assert!(body["lastFetched"].is_null());
    let bars = body["bars"].as_array().unwrap();
    assert_eq!(bars.len(), 3);
    assert!(bars.iter().all(|b| b["none"] == 100.0));
}

#[tokio::test]
async fn history_failure_serves_unrefreshed_timeline() {
    let source = FakeSource::new(Vec::new(), Some(sensor("off", NOW - HOUR)));
    source.set_failing(true);
    let app = app(source);

    let (status, body) = get(&app, "/api/timelines/binary_sensor.door?bar_amount=4").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refreshed"], false);
    assert_eq!(body["current"]["status"], "ko");
    assert_eq!(body["bars"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn invalid_parameters_are_rejected() {
    let app = app(FakeSource::default());

    let (status, body) = get(&app, "/api/timelines/binary_sensor.door?bar_amount=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("bar_amount"));

    let (status, _) = get(&app, "/api/timelines/binary_sensor.door?hours_to_show=-2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn points_for_unknown_entity_is_not_found() {
    let app = app(FakeSource::default());
    let (status, _) = get(&app, "/api/timelines/binary_sensor.door/points").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_entity_ids_never_reach_the_history_source() {
    let source = FakeSource::new(Vec::new(), Some(sensor("on", NOW - HOUR)));
    let app = app(source);

    let (status, _) = get(&app, "/api/timelines/..%2Fconfig").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/api/timelines/..%2Fconfig/points").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_bar_amount_is_rejected() {
    let app = app(FakeSource::default());
    let (status, body) = get(&app, "/api/timelines/binary_sensor.door?bar_amount=1000000000000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("bar_amount"));
}
