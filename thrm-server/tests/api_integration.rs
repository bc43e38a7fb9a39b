//! Integration tests for the theremin dashboard API
//!
//! Tests the HTTP surface driven through the router without a socket:
//! - Health check
//! - State snapshot before and after sensor messages
//! - SSE stream (initial audio_state event)
//! - Audio diagnostics and CORS

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use http::{Method, Request};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use thrm_common::config::{DashboardConfig, MappingConfig, SynthConfig};
use thrm_server::api::{build_router, AppContext};
use thrm_server::audio::CallbackStats;
use thrm_server::mapping::ParameterMapper;
use thrm_server::sse::SseBroadcaster;
use thrm_server::synth::{AudioParameters, HarmonicProfile, ParameterStore, ToneSynthesizer};
use thrm_server::StateBus;

/// Test helper to create a router over a fresh state bus
fn setup_test_server() -> (axum::Router, Arc<StateBus>) {
    let profile = Arc::new(HarmonicProfile::new(&SynthConfig::default().harmonics).unwrap());
    let params = Arc::new(ParameterStore::new(AudioParameters {
        frequency_hz: 0.0,
        ..AudioParameters::default()
    }));
    let state = Arc::new(StateBus::new(
        params,
        ParameterMapper::new(MappingConfig::default()).unwrap(),
        ToneSynthesizer::new(profile, 44100, false).unwrap(),
        DashboardConfig::default(),
        SseBroadcaster::new(16),
    ));

    let ctx = AppContext {
        state: Arc::clone(&state),
        stats: Arc::new(CallbackStats::new()),
        audio_device: None,
    };
    (build_router(ctx), state)
}

/// Helper function to make HTTP requests to the test router
async fn make_request(app: &axum::Router, path: &str) -> (StatusCode, Option<Value>) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json_body = if !body.is_empty() {
        Some(serde_json::from_slice(&body).unwrap())
    } else {
        None
    };

    (status, json_body)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = setup_test_server();

    let (status, body) = make_request(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let body = body.expect("Expected response body");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "thrm-server");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_initial_state_is_silent() {
    let (app, _) = setup_test_server();

    let (status, body) = make_request(&app, "/state").await;
    assert_eq!(status, StatusCode::OK);

    let body = body.unwrap();
    assert_eq!(body["is_playing"], false);
    assert_eq!(body["frequency_hz"], 0.0);
    assert_eq!(body["volume"], 0.5);
    assert_eq!(body["waveform_samples"].as_array().unwrap().len(), 50);
    assert!(body["waveform_samples"]
        .as_array()
        .unwrap()
        .iter()
        .all(|v| v.as_f64() == Some(0.0)));
}

#[tokio::test]
async fn test_state_follows_sensor_messages() {
    let (app, state) = setup_test_server();

    state.on_sensor_event("sensors/distance", "13.5").await.unwrap();
    state.on_sensor_event("sensors/volume", "0.75").await.unwrap();

    let (status, body) = make_request(&app, "/state").await;
    assert_eq!(status, StatusCode::OK);

    let body = body.unwrap();
    assert_eq!(body["is_playing"], true);
    assert_eq!(body["frequency_hz"], 640.0);
    assert_eq!(body["volume"], 0.75);
    assert_eq!(body["distance_cm"], 13.5);
    assert_eq!(body["waveform_samples"].as_array().unwrap().len(), 45);
}

#[tokio::test]
async fn test_audio_stats_without_device() {
    let (app, _) = setup_test_server();

    let (status, body) = make_request(&app, "/audio/stats").await;
    assert_eq!(status, StatusCode::OK);

    let body = body.unwrap();
    assert!(body["device"].is_null());
    assert_eq!(body["callbacks"], 0);
    assert_eq!(body["faults"], 0);
    assert_eq!(body["dashboard_clients"], 0);
}

#[tokio::test]
async fn test_audio_devices_responds() {
    let (app, _) = setup_test_server();

    // Result depends on the host's audio hardware
    let (status, body) = make_request(&app, "/audio/devices").await;
    match status {
        StatusCode::OK => assert!(body.unwrap()["devices"].is_array()),
        StatusCode::INTERNAL_SERVER_ERROR => assert!(body.unwrap()["status"].is_string()),
        other => panic!("unexpected status {}", other),
    }
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = setup_test_server();
    let (status, _) = make_request(&app, "/playback/play").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let (app, _) = setup_test_server();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header("origin", "http://dashboard.local")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_events_stream_starts_with_audio_state() {
    let (app, state) = setup_test_server();
    state.on_sensor_event("sensors/distance", "2").await.unwrap();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/events")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(state.broadcaster().client_count(), 1);

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(1), body.frame())
        .await
        .expect("no initial SSE event")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();

    assert!(text.contains("event: audio_state"), "got {:?}", text);
    assert!(text.contains("\"frequency\":1024.0"), "got {:?}", text);
    assert!(text.contains("\"playing\":true"), "got {:?}", text);
}

#[tokio::test]
async fn test_events_stream_receives_broadcasts() {
    let (app, state) = setup_test_server();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/events")
        .body(Body::empty())
        .unwrap();
    let mut body = app.oneshot(request).await.unwrap().into_body();

    // Initial audio_state
    tokio::time::timeout(Duration::from_secs(1), body.frame())
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(state.broadcast_tick().await);

    let mut names = Vec::new();
    while names.len() < 3 {
        let frame = tokio::time::timeout(Duration::from_secs(1), body.frame())
            .await
            .expect("broadcast not delivered")
            .unwrap()
            .unwrap();
        let Ok(data) = frame.into_data() else { continue };
        let text = String::from_utf8(data.to_vec()).unwrap();
        for line in text.lines() {
            if let Some(name) = line.strip_prefix("event: ") {
                names.push(name.to_string());
            }
        }
    }
    assert_eq!(names, ["audio_state", "sensor_update", "waveform_data"]);
}
