//! JSON input and output documents of the processor

use std::path::Path;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ImpactError, Result};
use crate::models::{AreaOfInterest, ImpactResult, StacOptions, VegetationIndex};

/// Processor input document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputModel {
    pub parameters: Parameters,
    pub indicator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stac: Option<StacParameters>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub polygon: String,
    #[serde(rename = "eventDate")]
    pub event_date: String,
    /// Consecutive post-event observations required to flag a pixel
    #[serde(rename = "minDuration", default, skip_serializing_if = "Option::is_none")]
    pub min_duration: Option<u32>,
    pub threshold: f64,
    /// Minimum number of days between baseline and post-event observation
    #[serde(rename = "minGapDays", default, skip_serializing_if = "Option::is_none")]
    pub min_gap_days: Option<u32>,
}

/// STAC catalog selection sent with the STAC endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StacParameters {
    pub sensor_collection: String,
    pub mask_collection: String,
    pub mask_band: String,
    pub bands: Vec<String>,
    pub max_cloud_cover_percentage: f64,
}

impl From<StacParameters> for StacOptions {
    fn from(p: StacParameters) -> Self {
        StacOptions {
            sensor_collection: p.sensor_collection,
            mask_collection: p.mask_collection,
            mask_band: p.mask_band,
            bands: p.bands,
            max_cloud_cover_percentage: p.max_cloud_cover_percentage,
        }
    }
}

impl InputModel {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            ImpactError::invalid_input("input", format!("not a valid input document: {}", e))
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn index(&self) -> Result<VegetationIndex> {
        self.indicator.parse()
    }

    pub fn area(&self) -> Result<AreaOfInterest> {
        AreaOfInterest::parse(&self.parameters.polygon)
    }
}

impl Parameters {
    /// `eventDate` as `YYYY-MM-DD`
    pub fn event_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(self.event_date.trim(), "%Y-%m-%d").map_err(|e| {
            ImpactError::invalid_input(
                "eventDate",
                format!("'{}' is not a YYYY-MM-DD date: {}", self.event_date, e),
            )
        })
    }
}

/// Processor output document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputModel {
    pub storage_links: Option<String>,
    pub results: Results,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrays: Option<ImpactArrays>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub before_event_date: String,
    pub after_event_date: String,
    pub impacted_area_percentage: String,
    pub impacted_area: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub execution_time: Option<String>,
    pub data_generation_network_use: Option<String>,
    pub data_upload_network_use: Option<String>,
}

impl Metrics {
    pub fn from_measurements(elapsed: Duration, generation_bytes: u64, upload_bytes: u64) -> Self {
        let secs = elapsed.as_secs();
        Self {
            execution_time: Some(format!("{} minutes {} seconds", secs / 60, secs % 60)),
            data_generation_network_use: Some(format_gigabits(generation_bytes)),
            data_upload_network_use: Some(format_gigabits(upload_bytes)),
        }
    }
}

fn format_gigabits(bytes: u64) -> String {
    format!("{:.3} Gb", bytes as f64 / 1024.0 / 1024.0 / 1024.0 * 8.0)
}

/// Inline copy of the result arrays, row-major. Missing differences are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactArrays {
    pub shape: [usize; 2],
    pub difference: Vec<Option<f64>>,
    pub impacted: Vec<bool>,
}

impl ImpactArrays {
    pub fn from_result(result: &ImpactResult) -> Self {
        let (rows, cols) = result.shape();
        Self {
            shape: [rows, cols],
            difference: result
                .difference
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect(),
            impacted: result.mask.iter().copied().collect(),
        }
    }
}

/// `Y-M-D` without zero padding (e.g. `2024-3-7`)
pub fn format_output_date(date: NaiveDate) -> String {
    format!("{}-{}-{}", date.year(), date.month(), date.day())
}
