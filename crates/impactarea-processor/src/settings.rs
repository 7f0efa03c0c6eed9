//! Processor settings resolved from the layered configuration

use std::path::PathBuf;

use impactarea_core::config::LayeredConfig;
use impactarea_core::models::ThresholdComparison;
use impactarea_store::StoreSettings;

/// Values the processor reads once per invocation
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub geosys_api_url: String,
    pub identity_server_url: String,
    pub stac_url: String,
    pub stac_auth_url: String,
    pub search_window_months: u32,
    pub comparison: ThresholdComparison,
    pub tolerance_days: Option<u32>,
    pub chunk_size: usize,
    pub aws_region: Option<String>,
    pub output_dir: PathBuf,
    pub keep_local_copy: bool,
}

impl ProcessorSettings {
    pub fn from_config(config: &LayeredConfig) -> Self {
        Self {
            geosys_api_url: config.geosys_api_url.value.clone(),
            identity_server_url: config.identity_server_url.value.clone(),
            stac_url: config.stac_url.value.clone(),
            stac_auth_url: config.stac_auth_url.value.clone(),
            search_window_months: config.search_window_months.value,
            comparison: config.comparison.value,
            tolerance_days: config.tolerance_days.value,
            chunk_size: config.chunk_size.value,
            aws_region: config.aws_region.value.clone(),
            output_dir: config.output_dir.value.clone(),
            keep_local_copy: config.keep_local_copy.value,
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            aws_region: self.aws_region.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self::from_config(&LayeredConfig::with_defaults())
    }
}
