use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::{CloudStorageProvider, Parameters, StacParameters};
use serde::Deserialize;

/// Query string shared by both impacted area endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ImpactQuery {
    pub indicator: String,
    #[serde(default)]
    pub cloud_storage_provider: Option<String>,
    #[serde(default)]
    pub aws_s3_bucket: Option<String>,
    #[serde(default = "default_entity_id")]
    pub entity_id: String,
    /// `Yes` or `No`
    #[serde(default)]
    pub metrics: Option<String>,
}

fn default_entity_id() -> String {
    "entity_1".to_string()
}

impl ImpactQuery {
    /// `None` when the arrays are returned inline
    pub fn provider(&self) -> Result<Option<CloudStorageProvider>> {
        self.cloud_storage_provider
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::parse)
            .transpose()
    }

    pub fn wants_metrics(&self) -> Result<bool> {
        match self.metrics.as_deref().map(|m| m.trim().to_lowercase()) {
            None => Ok(false),
            Some(m) if m == "yes" => Ok(true),
            Some(m) if m == "no" => Ok(false),
            Some(other) => Err(ImpactError::invalid_input(
                "metrics",
                format!("'{}' is not one of Yes, No", other),
            )),
        }
    }
}

/// Body of the STAC endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct StacImpactRequest {
    #[serde(flatten)]
    pub parameters: Parameters,
    pub sensor_collection: String,
    pub mask_collection: String,
    pub mask_band: String,
    pub bands: Vec<String>,
    pub max_cloud_cover_percentage: f64,
}

impl StacImpactRequest {
    pub fn into_parts(self) -> (Parameters, StacParameters) {
        let stac = StacParameters {
            sensor_collection: self.sensor_collection,
            mask_collection: self.mask_collection,
            mask_band: self.mask_band,
            bands: self.bands,
            max_cloud_cover_percentage: self.max_cloud_cover_percentage,
        };
        (self.parameters, stac)
    }
}
