//! Client for the geosys imagery platform

use async_trait::async_trait;
use chrono::NaiveDate;
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::{
    AreaOfInterest, DateRange, GridGeometry, IndexTimeSeries, TimeSeriesRequest,
};
use impactarea_core::ports::{ImageryCatalog, TimeSeriesSource};
use impactarea_core::TransferMeter;
use ndarray::Array3;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::SessionToken;

const SERVICE: &str = "geosys";
const COVERAGE_PATH: &str = "/imagery/v1/coverage";
const TIME_SERIES_PATH: &str = "/imagery/v1/time-series";

/// Geosys imagery client bound to one session
pub struct GeosysClient {
    base_url: String,
    token: SessionToken,
    sensors: Vec<String>,
    meter: TransferMeter,
    client: reqwest::Client,
}

impl GeosysClient {
    pub fn new(base_url: impl Into<String>, token: SessionToken) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            sensors: impactarea_core::models::default_sensors(),
            meter: TransferMeter::new(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_meter(mut self, meter: TransferMeter) -> Self {
        self.meter = meter;
        self
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| ImpactError::upstream(SERVICE, format!("Failed to reach {}: {}", url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ImpactError::Authentication {
                reason: format!("{} rejected the session ({})", SERVICE, status),
            });
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ImpactError::upstream(
                SERVICE,
                format!("{} returned {}: {}", path, status, error_text),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ImpactError::upstream(SERVICE, format!("Failed to read response: {}", e)))?;
        self.meter.record_download(body.len() as u64);
        serde_json::from_slice(&body)
            .map_err(|e| ImpactError::upstream(SERVICE, format!("Failed to parse {} response: {}", path, e)))
    }
}

#[async_trait]
impl ImageryCatalog for GeosysClient {
    async fn image_dates(&self, area: &AreaOfInterest, range: DateRange) -> Result<Vec<NaiveDate>> {
        let request = CoverageRequest {
            geometry: area.wkt(),
            start_date: range.start,
            end_date: range.end,
            sensors: &self.sensors,
        };
        let entries: Vec<CoverageEntry> = self.post(COVERAGE_PATH, &request).await?;

        let mut dates: Vec<NaiveDate> = entries
            .iter()
            .filter_map(|e| parse_day(&e.image.date))
            .filter(|d| range.contains(*d))
            .collect();
        dates.sort_unstable();
        dates.dedup();

        tracing::info!(images = entries.len(), dates = dates.len(), "Coverage retrieved");
        Ok(dates)
    }
}

#[async_trait]
impl TimeSeriesSource for GeosysClient {
    async fn fetch(&self, request: &TimeSeriesRequest) -> Result<IndexTimeSeries> {
        let body = TimeSeriesRequestBody {
            geometry: request.area.wkt(),
            start_date: request.range.start,
            end_date: request.range.end,
            sensors: &request.sensors,
            indicator: request.index.indicator(),
        };
        let response: TimeSeriesResponse = self.post(TIME_SERIES_PATH, &body).await?;
        let series = response.into_series(request)?;
        tracing::info!(
            index = %request.index,
            dates = series.len(),
            range = %request.range.to_interval(),
            "Time series retrieved"
        );
        Ok(series)
    }
}

/// `YYYY-MM-DD`, with or without a time part
fn parse_day(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CoverageRequest<'a> {
    geometry: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    sensors: &'a [String],
}

/// `{ image: { id, date, sensor }, coverPercent }`; only the date is used
#[derive(Debug, Deserialize)]
struct CoverageEntry {
    image: CoverageImage,
}

#[derive(Debug, Deserialize)]
struct CoverageImage {
    date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimeSeriesRequestBody<'a> {
    geometry: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    sensors: &'a [String],
    indicator: &'a str,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    dates: Vec<String>,
    width: usize,
    height: usize,
    #[serde(default)]
    nodata: Option<f64>,
    /// One row-major image per date; null marks a missing pixel
    values: Vec<Vec<Option<f64>>>,
    #[serde(default)]
    grid: Option<GridGeometry>,
}

impl TimeSeriesResponse {
    fn into_series(self, request: &TimeSeriesRequest) -> Result<IndexTimeSeries> {
        if self.dates.is_empty() {
            return Err(ImpactError::unavailable(format!(
                "No {} images time series found",
                request.index
            )));
        }
        if self.values.len() != self.dates.len() {
            return Err(ImpactError::ShapeMismatch {
                expected: vec![self.dates.len()],
                actual: vec![self.values.len()],
            });
        }

        let dates = self
            .dates
            .iter()
            .map(|d| {
                parse_day(d).ok_or_else(|| {
                    ImpactError::upstream(SERVICE, format!("invalid image date '{}'", d))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let pixels = self.width * self.height;
        let mut flat = Vec::with_capacity(dates.len() * pixels);
        for image in &self.values {
            if image.len() != pixels {
                return Err(ImpactError::ShapeMismatch {
                    expected: vec![self.height, self.width],
                    actual: vec![image.len()],
                });
            }
            let nodata = self.nodata;
            flat.extend(image.iter().map(|v| match v {
                Some(x) if Some(*x) != nodata => *x,
                _ => f64::NAN,
            }));
        }

        let values = Array3::from_shape_vec((dates.len(), self.height, self.width), flat)
            .map_err(|e| ImpactError::upstream(SERVICE, e.to_string()))?;
        let series = IndexTimeSeries::new(request.index, dates, values)?;
        Ok(match self.grid {
            Some(grid) => series.with_grid(grid),
            None => series,
        })
    }
}
