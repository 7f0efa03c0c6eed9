//! Integration tests for the geosys client and identity client against in-process mock servers

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use impactarea_core::models::{AreaOfInterest, DateRange, TimeSeriesRequest, VegetationIndex};
use impactarea_core::ports::{ImageryCatalog, TimeSeriesSource};
use impactarea_core::{ImpactError, TransferMeter};
use impactarea_fetch::{GeosysClient, GeosysCredentials, IdentityClient, SessionToken};
use serde_json::{json, Value};

type Captured = Arc<Mutex<Vec<Value>>>;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "Bearer session-token")
        .unwrap_or(false)
}

async fn coverage(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    captured.lock().unwrap().push(body);
    Ok(Json(json!([
        { "image": { "id": "a", "date": "2023-05-20", "sensor": "SENTINEL_2" }, "coverPercent": 100.0 },
        { "image": { "id": "b", "date": "2023-04-28T10:11:12Z", "sensor": "LANDSAT_8" }, "coverPercent": 97.5 },
        { "image": { "id": "c", "date": "2023-05-20", "sensor": "LANDSAT_9" }, "coverPercent": 100.0 },
        { "image": { "id": "d", "date": "2024-05-20", "sensor": "LANDSAT_9" }, "coverPercent": 100.0 }
    ])))
}

async fn time_series(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    captured.lock().unwrap().push(body);
    Ok(Json(json!({
        "dates": ["2023-04-28", "2023-05-20"],
        "width": 2,
        "height": 2,
        "values": [[0.6, 0.6, 0.6, null], [0.4, 0.5, 0.6, 0.1]],
        "grid": { "origin_x": 1.0, "origin_y": 44.0, "pixel_width": 0.0001, "pixel_height": -0.0001, "epsg": 4326 }
    })))
}

fn mock_platform(captured: Captured) -> Router {
    Router::new()
        .route("/imagery/v1/coverage", post(coverage))
        .route("/imagery/v1/time-series", post(time_series))
        .with_state(captured)
}

fn area() -> AreaOfInterest {
    AreaOfInterest::parse("POLYGON((1 43.9, 1.1 43.9, 1.1 44, 1 44, 1 43.9))").unwrap()
}

fn range() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2022, 11, 15).unwrap(),
        NaiveDate::from_ymd_opt(2023, 11, 15).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_image_dates_are_sorted_unique_and_in_range() {
    let captured: Captured = Arc::default();
    let base = spawn(mock_platform(captured.clone())).await;
    let client = GeosysClient::new(base, SessionToken::bearer("session-token"));

    let dates = client.image_dates(&area(), range()).await.unwrap();
    assert_eq!(
        dates,
        vec![
            NaiveDate::from_ymd_opt(2023, 4, 28).unwrap(),
            NaiveDate::from_ymd_opt(2023, 5, 20).unwrap(),
        ]
    );

    let body = captured.lock().unwrap()[0].clone();
    assert_eq!(body["startDate"], "2022-11-15");
    assert_eq!(body["sensors"], json!(["SENTINEL_2", "LANDSAT_8", "LANDSAT_9"]));
    assert!(body["geometry"].as_str().unwrap().starts_with("MULTIPOLYGON"));
}

#[tokio::test]
async fn test_fetch_time_series_and_count_bytes() {
    let captured: Captured = Arc::default();
    let base = spawn(mock_platform(captured.clone())).await;
    let meter = TransferMeter::new();
    let client = GeosysClient::new(base, SessionToken::bearer("session-token")).with_meter(meter.clone());

    let request = TimeSeriesRequest::new(area(), VegetationIndex::NDVI, range());
    let series = client.fetch(&request).await.unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series.shape(), (2, 2));
    assert!(series.slice(0)[[1, 1]].is_nan());
    assert_eq!(series.slice(1)[[0, 0]], 0.4);
    assert_eq!(series.grid().unwrap().epsg, 4326);
    assert!(meter.downloaded() > 0);

    let body = captured.lock().unwrap()[0].clone();
    assert_eq!(body["indicator"], "ndvi");
}

#[tokio::test]
async fn test_rejected_session_is_authentication_error() {
    let base = spawn(mock_platform(Arc::default())).await;
    let client = GeosysClient::new(base, SessionToken::bearer("stale"));

    let err = client.image_dates(&area(), range()).await.unwrap_err();
    assert!(matches!(err, ImpactError::Authentication { .. }));
}

#[tokio::test]
async fn test_unreachable_platform_is_upstream_error() {
    let client = GeosysClient::new("http://127.0.0.1:9", SessionToken::bearer("session-token"));
    let err = client.image_dates(&area(), range()).await.unwrap_err();
    assert!(matches!(err, ImpactError::Upstream { .. }));
}

async fn token_endpoint(
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    match form.get("grant_type").map(String::as_str) {
        Some("password") if form.get("password").map(String::as_str) == Some("pass") => {
            Ok(Json(json!({ "access_token": "from-password", "expires_in": 3600 })))
        }
        Some("client_credentials") if headers.get("authorization").is_some() => {
            Ok(Json(json!({ "access_token": "from-client", "token_type": "bearer" })))
        }
        _ => Err(StatusCode::BAD_REQUEST),
    }
}

#[tokio::test]
async fn test_identity_grants() {
    let base = spawn(Router::new().route("/connect/token", post(token_endpoint))).await;
    let identity = IdentityClient::new(format!("{}/connect/token", base));

    let credentials = GeosysCredentials {
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
        username: "user".to_string(),
        password: "pass".to_string(),
    };
    let token = identity.password_grant(&credentials).await.unwrap();
    assert_eq!(token.access_token, "from-password");
    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.expires_in, Some(3600));

    let token = identity.client_credentials("skyfox", "secret").await.unwrap();
    assert_eq!(token.access_token, "from-client");

    let wrong = GeosysCredentials { password: "nope".to_string(), ..credentials };
    let err = identity.password_grant(&wrong).await.unwrap_err();
    assert!(matches!(err, ImpactError::Authentication { .. }));
}
