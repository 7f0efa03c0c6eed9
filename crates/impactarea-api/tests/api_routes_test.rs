//! Integration tests for the API routes, driven through the router with `oneshot`

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use impactarea_api::{create_router, AppState};
use impactarea_core::error::Result;
use impactarea_core::models::{
    AreaOfInterest, CloudStorageProvider, DateRange, IndexTimeSeries, Observation,
    TimeSeriesRequest,
};
use impactarea_core::ports::{ImageryCatalog, TimeSeriesSource};
use impactarea_core::TransferMeter;
use impactarea_fetch::{SessionToken, TokenValidator};
use impactarea_processor::{Backends, Imagery, ProcessorSettings, Reference};
use impactarea_store::memory::MemoryStore;
use impactarea_store::ObjectStore;
use ndarray::{array, Array2};
use serde_json::{json, Value};
use tower::ServiceExt;

const PUBLIC_KEY: &str = include_str!("../../impactarea-fetch/tests/fixtures/signing_key.pub.pem");

fn scenes() -> BTreeMap<NaiveDate, Array2<f64>> {
    let day = |m, d| NaiveDate::from_ymd_opt(2023, m, d).unwrap();
    let mut scenes = BTreeMap::new();
    scenes.insert(day(5, 1), Array2::from_elem((2, 2), 0.6));
    scenes.insert(day(5, 20), array![[0.4, 0.5], [0.5, 0.5]]);
    scenes
}

#[derive(Clone, Default)]
struct StaticImagery;

#[async_trait]
impl ImageryCatalog for StaticImagery {
    async fn image_dates(&self, _area: &AreaOfInterest, range: DateRange) -> Result<Vec<NaiveDate>> {
        Ok(scenes().into_keys().filter(|d| range.contains(*d)).collect())
    }
}

#[async_trait]
impl TimeSeriesSource for StaticImagery {
    async fn fetch(&self, request: &TimeSeriesRequest) -> Result<IndexTimeSeries> {
        let observations = scenes()
            .into_iter()
            .filter(|(date, _)| request.range.contains(*date))
            .map(|(date, values)| Observation {
                date,
                values,
                clear_fraction: Some(1.0),
            })
            .collect();
        IndexTimeSeries::from_observations(request.index, observations)
    }
}

#[derive(Default)]
struct TestBackends {
    store: MemoryStore,
}

#[async_trait]
impl Backends for TestBackends {
    async fn imagery(
        &self,
        reference: Reference,
        _token: &SessionToken,
        _meter: &TransferMeter,
    ) -> Result<Imagery> {
        let catalog: Option<Arc<dyn ImageryCatalog>> = match reference {
            Reference::MapReference => Some(Arc::new(StaticImagery)),
            Reference::Stac => None,
        };
        Ok(Imagery {
            catalog,
            source: Arc::new(StaticImagery),
        })
    }

    async fn object_store(
        &self,
        _provider: CloudStorageProvider,
        _bucket: Option<&str>,
    ) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::new(self.store.clone()))
    }
}

fn app_with(validator: TokenValidator) -> Router {
    let state = AppState::new(
        Arc::new(TestBackends::default()),
        ProcessorSettings::default(),
        validator,
    );
    create_router(Arc::new(state))
}

fn app() -> Router {
    app_with(TokenValidator::permissive())
}

fn parameters(event: &str) -> Value {
    json!({
        "polygon": "POLYGON((10 48, 10.01 48, 10.01 48.01, 10 48.01, 10 48))",
        "eventDate": event,
        "threshold": -0.15
    })
}

fn post(uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let response = app()
        .oneshot(post(
            "/impacted-area-based-on-map-reference?indicator=NDVI",
            &parameters("2023-05-15"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Not Authorized");
}

#[tokio::test]
async fn test_unsigned_token_rejected_when_key_configured() {
    let app = app_with(TokenValidator::with_public_key(PUBLIC_KEY).unwrap());
    let response = app
        .oneshot(post(
            "/impacted-area-based-on-map-reference?indicator=NDVI",
            &parameters("2023-05-15"),
            Some("not-a-jwt"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_map_reference_inline_result() {
    let response = app()
        .oneshot(post(
            "/impacted-area-based-on-map-reference?indicator=NDVI&metrics=Yes",
            &parameters("2023-05-15"),
            Some("caller"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["results"]["before_event_date"], "2023-5-1");
    assert_eq!(body["results"]["after_event_date"], "2023-5-20");
    assert_eq!(body["results"]["impacted_area_percentage"], "25.00 %");
    assert!(body["storage_links"].is_null());
    assert_eq!(body["arrays"]["impacted"], json!([true, false, false, false]));
    assert!(body["metrics"]["execution_time"].is_string());
}

#[tokio::test]
async fn test_export_returns_storage_link() {
    let response = app()
        .oneshot(post(
            "/impacted-area-based-on-map-reference?indicator=NDVI&cloud_storage_provider=LOCAL&entity_id=field_9",
            &parameters("2023-05-15"),
            Some("caller"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let link = body["storage_links"].as_str().unwrap();
    assert!(link.starts_with("memory://field_9_"));
    assert!(body.get("arrays").is_none());
    assert!(body.get("metrics").is_none());
}

#[tokio::test]
async fn test_bad_requests() {
    let unknown_index = app()
        .oneshot(post(
            "/impacted-area-based-on-map-reference?indicator=NDXI",
            &parameters("2023-05-15"),
            Some("caller"),
        ))
        .await
        .unwrap();
    assert_eq!(unknown_index.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(unknown_index).await["details"]
        .as_str()
        .unwrap()
        .contains("NDXI"));

    let bad_provider = app()
        .oneshot(post(
            "/impacted-area-based-on-map-reference?indicator=NDVI&cloud_storage_provider=GCS",
            &parameters("2023-05-15"),
            Some("caller"),
        ))
        .await
        .unwrap();
    assert_eq!(bad_provider.status(), StatusCode::BAD_REQUEST);

    let missing_indicator = app()
        .oneshot(post(
            "/impacted-area-based-on-map-reference",
            &parameters("2023-05-15"),
            Some("caller"),
        ))
        .await
        .unwrap();
    assert_eq!(missing_indicator.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_no_baseline_is_unprocessable() {
    let response = app()
        .oneshot(post(
            "/impacted-area-based-on-map-reference?indicator=NDVI",
            &parameters("2023-04-01"),
            Some("caller"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["error"], "Insufficient data");
}

#[tokio::test]
async fn test_stac_endpoint() {
    let mut body = parameters("2023-05-15");
    body["sensor_collection"] = json!("sentinel-2-l2a");
    body["mask_collection"] = json!("cloud-mask");
    body["mask_band"] = json!("CMASK");
    body["bands"] = json!(["red", "nir"]);
    body["max_cloud_cover_percentage"] = json!(20.0);

    let response = app()
        .oneshot(post("/impacted-area-based-on-stac?indicator=NDVI", &body, Some("caller")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["results"]["impacted_area_percentage"], "25.00 %");
}
