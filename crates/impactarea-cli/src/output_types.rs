use chrono::NaiveDate;
use impactarea_core::models::{ImpactSummary, VegetationIndex};
use impactarea_store::StoredImpact;
use serde::Serialize;

/// Output for the inspect command
#[derive(Debug, Serialize)]
pub struct InspectStoreOutput {
    pub store: String,
    pub entity_id: Option<String>,
    pub index: VegetationIndex,
    pub threshold: f64,
    pub comparison: String,
    pub event_date: NaiveDate,
    pub baseline_date: NaiveDate,
    pub post_event_date: NaiveDate,
    pub min_duration: Option<u32>,
    pub shape: [usize; 2],
    pub valid_pixels: usize,
    pub impacted_pixels: usize,
    pub summary: ImpactSummary,
}

impl InspectStoreOutput {
    pub fn new(store: String, stored: &StoredImpact) -> Self {
        let result = &stored.result;
        let (rows, cols) = result.difference.dim();
        Self {
            store,
            entity_id: stored.entity_id.clone(),
            index: result.index,
            threshold: result.threshold,
            comparison: result.comparison.to_string(),
            event_date: result.event_date,
            baseline_date: result.baseline_date,
            post_event_date: result.post_event_date,
            min_duration: result.min_duration,
            shape: [rows, cols],
            valid_pixels: result.valid_pixel_count,
            impacted_pixels: result.impacted_pixel_count,
            summary: stored.summary,
        }
    }
}

/// Output for the config command
#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    pub values: Vec<ConfigEntry>,
}

#[derive(Debug, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub source: String,
}
