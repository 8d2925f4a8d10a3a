#![cfg(feature = "server")]

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use zpanalytics::server::{
    config::ServerConfig,
    documents::HashMapDocumentStore,
    router,
    state::AppState,
};

fn app(default_property_id: Option<&str>, documents: HashMapDocumentStore) -> Router {
    let config = ServerConfig {
        default_property_id: default_property_id.map(str::to_string),
        ..ServerConfig::default()
    };
    router(AppState::with_stores(config, Default::default(), documents))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<(&str, String)>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some((content_type, body)) => builder
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn event(event_type: &str, path: &str, session: &str, user: &str) -> Value {
    json!({
        "event_type": event_type,
        "page_url": format!("https://example.com{path}"),
        "page_title": path,
        "referrer": "",
        "session_id": session,
        "user_id": user,
        "domain": "example.com",
        "event_data": {},
        "user_agent": "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)",
        "language": "en-GB",
        "screen": {"width": 390, "height": 844},
        "viewport": {"width": 390, "height": 700},
        "timezone": "Europe/London"
    })
}

#[tokio::test]
async fn test_collect_and_report() {
    let app = app(Some("example.com"), HashMapDocumentStore::new());

    // Beacons arrive as text/plain.
    let batch = json!({"events": [
        event("pageview", "/", "s1", "u1"),
        event("click", "/", "s1", "u1"),
        event("pageview", "/pricing", "s1", "u1"),
        event("pageview", "/", "s2", "u2"),
    ]});
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/analytics/track",
        Some(("text/plain;charset=UTF-8", batch.to_string())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], 4);
    assert_eq!(body["stored"], 4);

    // A single event is accepted too.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/analytics/track",
        Some(("application/json", event("pageview", "/", "s3", "u3").to_string())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stored"], 1);

    let (status, body) = send(&app, Method::GET, "/api/analytics", None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["propertyId"], "example.com");
    assert_eq!(data["dateRange"]["startDate"], "7daysAgo");
    assert_eq!(data["metrics"]["pageViews"], 4);
    assert_eq!(data["metrics"]["uniqueVisitors"], 3);
    assert_eq!(data["topPages"][0]["path"], "/");
    assert_eq!(data["topPages"][0]["views"], 3);
    assert_eq!(data["deviceBreakdown"]["mobile"], 3);
    assert_eq!(data["geoData"][0]["country"], "GB");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/analytics/test?propertyId=example.com",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], true);
    assert_eq!(body["testData"]["pageViews"], 4);

    let (status, body) = send(&app, Method::GET, "/api/analytics/realtime", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["propertyId"], "example.com");
    assert_eq!(body["activeUsers"], 3);
    assert_eq!(body["windowMinutes"], 30);
}

#[tokio::test]
async fn test_single_event_without_domain() {
    let app = app(Some("shop.example.com"), HashMapDocumentStore::new());

    // The domain is taken from the page URL.
    let single = json!({
        "event_type": "pageview",
        "page_url": "https://shop.example.com/a",
        "session_id": "s1",
        "user_id": "u1"
    });
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/analytics/track",
        Some(("application/json", single.to_string())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stored"], 1);

    let (_, body) = send(&app, Method::GET, "/api/analytics", None).await;
    assert_eq!(body["data"]["metrics"]["pageViews"], 1);

    // Nowhere to file it: rejected, nothing stored.
    let orphan = json!({"event_type": "click", "page_url": "/a"});
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/analytics/track",
        Some(("application/json", orphan.to_string())),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_malformed_requests_get_json_errors() {
    let app = app(None, HashMapDocumentStore::new());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/analytics/track",
        Some(("text/plain", "not json".to_string())),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(&app, Method::GET, "/api/analytics", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Property ID"));

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/analytics?propertyId=example.com&startDate=someday",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        send(&app, Method::GET, "/api/analytics?clientId=nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["clientId"], "nobody");
}

#[tokio::test]
async fn test_clients_and_history() {
    let app = app(None, HashMapDocumentStore::new());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/clients",
        Some((
            "application/json",
            json!({
                "clientName": "Acme",
                "websiteDomain": "acme.com",
                "analyticsPropertyId": "acme.com"
            })
            .to_string(),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let client_id = body["client"]["id"].as_str().unwrap().to_string();

    let (_, body) = send(&app, Method::GET, "/api/clients", None).await;
    assert_eq!(body["clients"].as_array().map(Vec::len), Some(1));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/analytics",
        Some((
            "application/json",
            json!({"clientId": client_id, "dateRange": {"startDate": "30daysAgo", "endDate": "today"}})
                .to_string(),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["propertyId"], "acme.com");
    assert_eq!(body["data"]["metrics"]["pageViews"], 0);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/analytics/history?clientId={client_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["websiteDomain"], "acme.com");

    let (status, _) = send(&app, Method::GET, "/api/analytics/history", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_snapshot_failure_does_not_fail_request() {
    let app = app(
        Some("example.com"),
        HashMapDocumentStore::new().rejecting_snapshots(),
    );
    let (status, body) = send(&app, Method::POST, "/api/analytics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}
