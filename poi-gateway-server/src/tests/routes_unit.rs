//! HTTP surface tests driven through `tower::ServiceExt::oneshot`.

use super::helpers::{primary, scripted_gateway, scripted_gateway_with_cache};
use super::*;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use poi_gateway_core::{CachedPayload, ResponseCache};
use poi_gateway_upstream::test_support::ScriptedTransport;
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
    transport: Arc<ScriptedTransport>,
    app: axum::Router,
}

#[fixture]
fn harness() -> Harness {
    let transport = Arc::new(ScriptedTransport::default());
    let gateway = scripted_gateway(&transport);
    Harness {
        transport,
        app: router(AppState::new(Arc::new(gateway))),
    }
}

fn museums() -> Value {
    json!({
        "rules": [{ "key": "tourism", "values": ["museum"] }],
        "center": { "lat": 51.5, "lng": -0.1 }
    })
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/overpass")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .expect("request should build")
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    read(response).await
}

async fn read(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let body = serde_json::from_slice(&bytes).expect("body should be JSON");
    (status, body)
}

#[rstest]
#[tokio::test]
async fn valid_query_returns_upstream_payload_verbatim(harness: Harness) {
    let payload = json!({ "version": 0.6, "elements": [{ "type": "node", "id": 1 }] });
    harness.transport.push_json(&primary(), payload.clone());

    let (status, body) = send(&harness.app, post_json(&museums().to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, payload);
}

#[rstest]
#[tokio::test]
async fn repeated_query_is_served_from_cache(harness: Harness) {
    harness.transport.push_json(&primary(), json!({ "elements": [] }));

    let (first, _) = send(&harness.app, post_json(&museums().to_string())).await;
    let (second, body) = send(&harness.app, post_json(&museums().to_string())).await;

    assert_eq!((first, second), (StatusCode::OK, StatusCode::OK));
    assert_eq!(body, json!({ "elements": [] }));
    assert_eq!(harness.transport.total_calls(), 1);
}

#[rstest]
#[case::missing_center(json!({ "rules": [] }).to_string())]
#[case::missing_rules(json!({ "center": { "lat": 1.0, "lng": 2.0 } }).to_string())]
#[case::wrong_shape(json!({ "rules": "museum", "center": { "lat": 1.0, "lng": 2.0 } }).to_string())]
#[case::not_json("rules=museum".to_owned())]
#[tokio::test]
async fn invalid_input_is_a_bad_request(harness: Harness, #[case] body: String) {
    let (status, response) = send(&harness.app, post_json(&body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response, json!({ "error": "rules and center are required" }));
    assert_eq!(harness.transport.total_calls(), 0);
}

#[rstest]
#[case::huge(r#""maxResults": 1e400, "radiusMeters": 1e400"#)]
#[case::huge_negative(r#""maxResults": -1e400, "radiusMeters": -1e400"#)]
#[tokio::test]
async fn unrepresentable_numbers_fall_back_to_defaults(harness: Harness, #[case] extra: &str) {
    harness.transport.push_json(&primary(), json!({ "elements": [] }));
    let body = format!(
        r#"{{"rules": [{{"key": "tourism", "values": ["museum"]}}], "center": {{"lat": 51.5, "lng": -0.1}}, {extra}}}"#
    );

    let (status, _) = send(&harness.app, post_json(&body)).await;

    assert_eq!(status, StatusCode::OK);
    let queries = harness.transport.queries();
    let [query] = queries.as_slice() else {
        panic!("expected one upstream query, got {queries:?}");
    };
    assert!(query.contains("(around:10000,51.5,-0.1)"), "{query}");
    assert!(query.ends_with("out center 100;"), "{query}");
}

#[rstest]
#[tokio::test]
async fn missing_content_type_is_a_bad_request(harness: Harness) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/overpass")
        .body(Body::from(museums().to_string()))
        .expect("request should build");

    let (status, _) = send(&harness.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test]
async fn exhausted_mirrors_are_service_unavailable(harness: Harness) {
    for _ in 0..3 {
        harness.transport.push_status(&primary(), 502);
    }

    let (status, body) = send(&harness.app, post_json(&museums().to_string())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "error": "Overpass unavailable; try later" }));
}

#[rstest]
#[tokio::test]
async fn health_reports_cache_and_mirror_counts(harness: Harness) {
    harness.transport.push_json(&primary(), json!({ "elements": [] }));
    send(&harness.app, post_json(&museums().to_string())).await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request should build");

    let (status, body) = send(&harness.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "ok", "cached_entries": 1, "mirrors": 1 })
    );
}

/// Cache whose lookups panic, standing in for a handler bug.
struct PanickingCache;

impl ResponseCache for PanickingCache {
    fn get(&self, _key: &str) -> Option<CachedPayload> {
        panic!("cache lookup failed");
    }

    fn put(&self, _key: String, _payload: CachedPayload) {}

    fn len(&self) -> usize {
        0
    }
}

#[rstest]
#[tokio::test]
async fn handler_panics_become_generic_server_errors() {
    let transport = Arc::new(ScriptedTransport::default());
    let gateway = scripted_gateway_with_cache(&transport, Arc::new(PanickingCache));
    let app = router(AppState::new(Arc::new(gateway)));

    let (status, body) = send(&app, post_json(&museums().to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Server error" }));
    assert_eq!(transport.total_calls(), 0);
}

#[rstest]
#[tokio::test]
async fn server_returns_once_shutdown_resolves() {
    let transport = Arc::new(ScriptedTransport::default());
    let state = AppState::new(Arc::new(scripted_gateway(&transport)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");

    let outcome = crate::serve::serve_on(listener, state, async {}).await;

    assert!(outcome.is_ok(), "expected clean shutdown, got {outcome:?}");
}
