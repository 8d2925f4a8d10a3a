use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    aggregation::{
        event_store_api::{EventStoreReportingApi, REALTIME_WINDOW_MINUTES},
        report::{
            AnalyticsOverview, BasicMetrics, DateRange, DEFAULT_END_DATE,
            DEFAULT_START_DATE,
        },
        service::AggregationService,
    },
    clock::{Clock, SystemClock},
    error::AggregationServiceError,
    events::{
        payload::CollectPayload, traits::EventStorage, tracking_event::TrackingEvent,
    },
    server::{
        documents::{ClientRecord, DocumentStore, NewClient, SnapshotRow},
        error::AppError,
        state::{AppState, ServerEventStorage},
    },
    tracker::platform::Location,
};

/// Headers a CDN or edge proxy uses to pass the visitor's country.
const GEO_HEADERS: [&str; 3] = ["cf-ipcountry", "x-vercel-ip-country", "x-country-code"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub client_id: Option<String>,
    pub property_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsBody {
    pub client_id: Option<String>,
    pub property_id: Option<String>,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub client_id: Option<String>,
}

/// Property a dashboard request was routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProperty {
    pub property_id: String,
    /// Human-readable description of where the property came from.
    pub context: String,
    pub client: Option<ClientRecord>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Picks the property from the client record, an explicit property id, or
/// the configured default, in that order.
pub fn resolve_property(
    state: &AppState,
    client_id: Option<&str>,
    property_id: Option<&str>,
) -> Result<ResolvedProperty, AppError> {
    if let Some(client_id) = non_empty(client_id) {
        let client = state
            .documents()?
            .get_client(client_id)
            .map_err(|e| AppError::Storage(e.to_string()))?
            .ok_or_else(|| AppError::ClientNotFound {
                client_id: client_id.to_string(),
            })?;
        let property_id = non_empty(client.analytics_property_id.as_deref())
            .ok_or_else(|| AppError::ClientWithoutProperty {
                client_id: client_id.to_string(),
            })?
            .to_string();
        return Ok(ResolvedProperty {
            property_id,
            context: format!("client: {} ({})", client.client_name, client.website_domain),
            client: Some(client),
        });
    }

    if let Some(property_id) = non_empty(property_id) {
        return Ok(ResolvedProperty {
            property_id: property_id.to_string(),
            context: format!("property ID: {property_id}"),
            client: None,
        });
    }

    let property_id = non_empty(state.config.default_property_id.as_deref())
        .ok_or(AppError::MissingProperty)?;
    Ok(ResolvedProperty {
        property_id: property_id.to_string(),
        context: "default property".to_string(),
        client: None,
    })
}

type EventStoreService<'a> =
    AggregationService<EventStoreReportingApi<'a, ServerEventStorage, SystemClock>>;

/// Runs `query` against the collected events while holding the store lock.
fn with_service<T>(
    state: &AppState,
    property_id: &str,
    query: impl FnOnce(&EventStoreService<'_>) -> Result<T, AggregationServiceError>,
) -> Result<T, AppError> {
    let events = state.events()?;
    let api = EventStoreReportingApi::new(&*events, &state.clock);
    let service = AggregationService::with_property_id(api, property_id)?;
    Ok(query(&service)?)
}

fn fetch_overview(
    state: &AppState,
    property_id: &str,
    date_range: &DateRange,
) -> Result<AnalyticsOverview, AppError> {
    with_service(state, property_id, |service| service.fetch_overview(date_range))
}

/// `POST /api/analytics/track`
///
/// Parses the body whatever its content type: beacons send `text/plain`.
pub async fn collect_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let payload = CollectPayload::from_slice(&body)
        .map_err(|e| AppError::MalformedPayload(e.to_string()))?;
    let mut events = payload.into_events();
    let received = events.len();
    if let Some(index) = events.iter_mut().position(|event| !ensure_domain(event)) {
        return Err(AppError::MalformedPayload(format!(
            "event #{index} has neither a domain nor an absolute page_url"
        )));
    }

    if let Some(country) = geo_country(&headers) {
        for event in events.iter_mut().filter(|e| e.context.country.is_none()) {
            event.context.country = Some(country.clone());
        }
    }

    let mut storage = state.events()?;
    let mut stored = 0;
    for event in events {
        match storage.add_event(event) {
            Ok(()) => stored += 1,
            Err(e) => warn!("Dropping event: {e}"),
        }
    }

    Ok(Json(json!({
        "success": true,
        "received": received,
        "stored": stored,
    })))
}

/// Fills a missing `domain` from the hostname of `page_url`. Returns false
/// when neither is available.
fn ensure_domain(event: &mut TrackingEvent) -> bool {
    if event.domain.trim().is_empty() {
        event.domain = Location::parse(&event.page_url).hostname;
    }
    !event.domain.is_empty()
}

fn geo_country(headers: &HeaderMap) -> Option<String> {
    GEO_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name)?.to_str().ok())
        .map(|value| value.trim().to_ascii_uppercase())
        // XX: unknown, T1: Tor
        .find(|code| code.len() == 2 && code != "XX" && code != "T1")
}

/// `GET /api/analytics`
pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Value>, AppError> {
    let resolved = resolve_property(
        &state,
        query.client_id.as_deref(),
        query.property_id.as_deref(),
    )?;
    let date_range = DateRange::new(
        query.start_date.as_deref().unwrap_or(DEFAULT_START_DATE),
        query.end_date.as_deref().unwrap_or(DEFAULT_END_DATE),
    );
    date_range.resolve(state.clock.today())?;

    let overview = fetch_overview(&state, &resolved.property_id, &date_range)?;
    Ok(Json(json!({
        "success": true,
        "data": overview,
        "timestamp": state.clock.now(),
    })))
}

/// `POST /api/analytics`
///
/// Same as the GET variant, and stores today's snapshot for the client. A
/// failed snapshot write does not fail the request.
pub async fn analytics_snapshot_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body: AnalyticsBody = if body.iter().all(u8::is_ascii_whitespace) {
        AnalyticsBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::MalformedPayload(e.to_string()))?
    };
    let resolved = resolve_property(
        &state,
        body.client_id.as_deref(),
        body.property_id.as_deref(),
    )?;
    let date_range = body.date_range.unwrap_or_default();
    date_range.resolve(state.clock.today())?;

    let overview = fetch_overview(&state, &resolved.property_id, &date_range)?;

    let client_id = resolved
        .client
        .as_ref()
        .map(|client| client.id.as_str())
        .unwrap_or("default");
    let website_domain = resolved
        .client
        .as_ref()
        .map(|client| client.website_domain.as_str())
        .unwrap_or(resolved.property_id.as_str());
    if let Err(e) = store_snapshot(&state, client_id, website_domain, &overview.metrics) {
        warn!("Failed to store analytics snapshot: {e}");
    }

    Ok(Json(json!({
        "success": true,
        "data": overview,
        "timestamp": state.clock.now(),
    })))
}

fn store_snapshot(
    state: &AppState,
    client_id: &str,
    website_domain: &str,
    metrics: &BasicMetrics,
) -> Result<(), AppError> {
    let row = SnapshotRow::new(client_id, website_domain, metrics, state.clock.now());
    state
        .documents()?
        .add_snapshot(row)
        .map_err(|e| AppError::Storage(e.to_string()))
}

/// `GET /api/analytics/test`
pub async fn analytics_test_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Response, AppError> {
    let resolved = resolve_property(
        &state,
        query.client_id.as_deref(),
        query.property_id.as_deref(),
    )?;
    info!(
        "Testing analytics connection for {} ({})",
        resolved.property_id, resolved.context
    );

    let result = with_service(&state, &resolved.property_id, |service| {
        service.get_basic_metrics(&DateRange::default())
    });

    let response = match result {
        Ok(test_data) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "connected": true,
                "message": format!("Analytics connection successful for {}!", resolved.context),
                "propertyId": resolved.property_id,
                "context": resolved.context,
                "testData": test_data,
                "timestamp": state.clock.now(),
            })),
        ),
        Err(e) => {
            warn!("Analytics connection test failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "connected": false,
                    "error": "Analytics connection failed",
                    "details": e.to_string(),
                    "propertyId": resolved.property_id,
                    "context": resolved.context,
                    "timestamp": state.clock.now(),
                })),
            )
        }
    };
    Ok(response.into_response())
}

/// `GET /api/analytics/realtime`
pub async fn realtime_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Value>, AppError> {
    let resolved = resolve_property(
        &state,
        query.client_id.as_deref(),
        query.property_id.as_deref(),
    )?;
    let metrics = with_service(&state, &resolved.property_id, |service| {
        service.get_realtime_data()
    })?;
    Ok(Json(json!({
        "success": true,
        "propertyId": resolved.property_id,
        "activeUsers": metrics.unique_visitors,
        "windowMinutes": REALTIME_WINDOW_MINUTES,
        "timestamp": state.clock.now(),
    })))
}

/// `GET /api/clients`
pub async fn list_clients_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let clients = state
        .documents()?
        .list_clients()
        .map_err(|e| AppError::Storage(e.to_string()))?;
    Ok(Json(json!({ "success": true, "clients": clients })))
}

/// `POST /api/clients`
pub async fn create_client_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let client: NewClient = serde_json::from_slice(&body)
        .map_err(|e| AppError::MalformedPayload(e.to_string()))?;
    if client.client_name.trim().is_empty() {
        return Err(AppError::MalformedPayload(
            "clientName is required".to_string(),
        ));
    }

    let record = state
        .documents()?
        .create_client(client)
        .map_err(|e| AppError::Storage(e.to_string()))?;
    info!("Registered client {} ({})", record.id, record.website_domain);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "client": record })),
    ))
}

/// `GET /api/analytics/history?clientId=`
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, AppError> {
    let client_id = non_empty(query.client_id.as_deref()).ok_or_else(|| {
        AppError::MalformedPayload("clientId is required".to_string())
    })?;

    let documents = state.documents()?;
    documents
        .get_client(client_id)
        .map_err(|e| AppError::Storage(e.to_string()))?
        .ok_or_else(|| AppError::ClientNotFound {
            client_id: client_id.to_string(),
        })?;
    let history = documents
        .snapshots_for(client_id)
        .map_err(|e| AppError::Storage(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "clientId": client_id,
        "history": history,
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::server::{config::ServerConfig, documents::HashMapDocumentStore};

    fn state(default_property_id: Option<&str>) -> Arc<AppState> {
        let mut documents = HashMapDocumentStore::new();
        documents.insert_client(ClientRecord {
            id: "acme".to_string(),
            client_name: "Acme".to_string(),
            website_domain: "acme.com".to_string(),
            analytics_property_id: Some("acme.com".to_string()),
        });
        documents.insert_client(ClientRecord {
            id: "bare".to_string(),
            client_name: "Bare".to_string(),
            website_domain: "bare.com".to_string(),
            analytics_property_id: None,
        });
        let config = ServerConfig {
            default_property_id: default_property_id.map(str::to_string),
            ..ServerConfig::default()
        };
        AppState::with_stores(config, Default::default(), documents)
    }

    #[test]
    fn test_resolve_property_order() {
        let state = state(Some("fallback.com"));

        let resolved = resolve_property(&state, Some("acme"), Some("ignored")).unwrap();
        assert_eq!(resolved.property_id, "acme.com");
        assert_eq!(resolved.context, "client: Acme (acme.com)");

        let resolved = resolve_property(&state, None, Some("direct.com")).unwrap();
        assert_eq!(resolved.property_id, "direct.com");

        let resolved = resolve_property(&state, Some(" "), None).unwrap();
        assert_eq!(resolved.property_id, "fallback.com");
    }

    #[test]
    fn test_resolve_property_errors() {
        let state = state(None);
        assert!(matches!(
            resolve_property(&state, Some("missing"), None),
            Err(AppError::ClientNotFound { .. })
        ));
        assert!(matches!(
            resolve_property(&state, Some("bare"), None),
            Err(AppError::ClientWithoutProperty { .. })
        ));
        assert!(matches!(
            resolve_property(&state, None, None),
            Err(AppError::MissingProperty)
        ));
    }

    #[test]
    fn test_ensure_domain_from_page_url() {
        let mut event: TrackingEvent = serde_json::from_str(
            r#"{"event_type": "pageview", "page_url": "https://shop.example.com:8443/a"}"#,
        )
        .unwrap();
        assert!(ensure_domain(&mut event));
        assert_eq!(event.domain, "shop.example.com");

        // An explicit domain wins over the URL.
        event.domain = "example.com".to_string();
        assert!(ensure_domain(&mut event));
        assert_eq!(event.domain, "example.com");

        let mut relative: TrackingEvent =
            serde_json::from_str(r#"{"event_type": "click", "page_url": "/a"}"#).unwrap();
        assert!(!ensure_domain(&mut relative));
    }

    #[test]
    fn test_geo_country() {
        let mut headers = HeaderMap::new();
        assert_eq!(geo_country(&headers), None);
        headers.insert("cf-ipcountry", HeaderValue::from_static("XX"));
        headers.insert("x-vercel-ip-country", HeaderValue::from_static("de"));
        assert_eq!(geo_country(&headers).as_deref(), Some("DE"));
    }
}
