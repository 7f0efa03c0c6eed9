use crate::error::{ImpactError, Result};
use crate::models::{CloudStorageProvider, ThresholdComparison};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "impactarea.toml";

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration of the processor
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub geosys_api_url: ConfigValue<String>,
    pub identity_server_url: ConfigValue<String>,
    pub stac_url: ConfigValue<String>,
    pub stac_auth_url: ConfigValue<String>,
    pub search_window_months: ConfigValue<u32>,
    pub comparison: ConfigValue<ThresholdComparison>,
    pub tolerance_days: ConfigValue<Option<u32>>,
    pub chunk_size: ConfigValue<usize>,
    pub cloud_storage_provider: ConfigValue<CloudStorageProvider>,
    pub aws_region: ConfigValue<Option<String>>,
    pub output_dir: ConfigValue<PathBuf>,
    pub keep_local_copy: ConfigValue<bool>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            geosys_api_url: ConfigValue::new(
                "https://api.geosys-na.net".to_string(),
                ConfigSource::Default,
            ),
            identity_server_url: ConfigValue::new(
                "https://identity.geosys-na.com/v2.1/connect/token".to_string(),
                ConfigSource::Default,
            ),
            stac_url: ConfigValue::new(
                "https://api.geosys-na.net/skyfox/stac".to_string(),
                ConfigSource::Default,
            ),
            stac_auth_url: ConfigValue::new(
                "https://api.geosys-na.net/skyfox/auth/token".to_string(),
                ConfigSource::Default,
            ),
            search_window_months: ConfigValue::new(6, ConfigSource::Default),
            comparison: ConfigValue::new(ThresholdComparison::Auto, ConfigSource::Default),
            tolerance_days: ConfigValue::new(None, ConfigSource::Default),
            chunk_size: ConfigValue::new(256, ConfigSource::Default),
            cloud_storage_provider: ConfigValue::new(
                CloudStorageProvider::AwsS3,
                ConfigSource::Default,
            ),
            aws_region: ConfigValue::new(None, ConfigSource::Default),
            output_dir: ConfigValue::new(env::temp_dir(), ConfigSource::Default),
            keep_local_copy: ConfigValue::new(false, ConfigSource::Default),
        }
    }

    /// Defaults, then `impactarea.toml` when present, then environment
    pub fn discover() -> Result<Self> {
        let mut config = Self::with_defaults();
        let path = Path::new(CONFIG_FILE_NAME);
        if path.exists() {
            config = config.load_from_file(path)?;
        }
        Ok(config.load_from_env())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ImpactError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| ImpactError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(url) = file_config.geosys_api_url {
            self.geosys_api_url.update(url, ConfigSource::File);
        }
        if let Some(url) = file_config.identity_server_url {
            self.identity_server_url.update(url, ConfigSource::File);
        }
        if let Some(url) = file_config.stac_url {
            self.stac_url.update(url, ConfigSource::File);
        }
        if let Some(url) = file_config.stac_auth_url {
            self.stac_auth_url.update(url, ConfigSource::File);
        }
        if let Some(months) = file_config.search_window_months {
            self.search_window_months.update(months, ConfigSource::File);
        }
        if let Some(comparison) = file_config.comparison {
            self.comparison.update(comparison, ConfigSource::File);
        }
        if let Some(days) = file_config.tolerance_days {
            self.tolerance_days.update(Some(days), ConfigSource::File);
        }
        if let Some(size) = file_config.chunk_size {
            if size == 0 {
                return Err(ImpactError::ConfigInvalid {
                    key: "chunk_size".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            self.chunk_size.update(size, ConfigSource::File);
        }
        if let Some(provider) = file_config.cloud_storage_provider {
            self.cloud_storage_provider.update(provider, ConfigSource::File);
        }
        if let Some(region) = file_config.aws_region {
            self.aws_region.update(Some(region), ConfigSource::File);
        }
        if let Some(dir) = file_config.output_dir {
            self.output_dir.update(dir, ConfigSource::File);
        }
        if let Some(keep) = file_config.keep_local_copy {
            self.keep_local_copy.update(keep, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    ///
    /// `IMPACTAREA_*` names win over the platform names (`GEOSYS_API_URL`, ...).
    pub fn load_from_env(mut self) -> Self {
        if let Some(url) = first_env(&["IMPACTAREA_GEOSYS_API_URL", "GEOSYS_API_URL"]) {
            self.geosys_api_url.update(url, ConfigSource::Environment);
        }
        if let Some(url) = first_env(&["IMPACTAREA_IDENTITY_SERVER_URL", "IDENTITY_SERVER_URL"]) {
            self.identity_server_url.update(url, ConfigSource::Environment);
        }
        if let Some(url) = first_env(&["IMPACTAREA_STAC_URL", "SKYFOX_URL"]) {
            self.stac_url.update(url, ConfigSource::Environment);
        }
        if let Some(url) = first_env(&["IMPACTAREA_STAC_AUTH_URL", "SKYFOX_AUTH_URL"]) {
            self.stac_auth_url.update(url, ConfigSource::Environment);
        }

        if let Ok(months_str) = env::var("IMPACTAREA_SEARCH_WINDOW_MONTHS") {
            match months_str.parse::<u32>() {
                Ok(months) if months > 0 => {
                    self.search_window_months.update(months, ConfigSource::Environment)
                }
                _ => tracing::warn!(
                    "Invalid IMPACTAREA_SEARCH_WINDOW_MONTHS value '{}': expected a positive integer",
                    months_str
                ),
            }
        }

        if let Ok(comparison_str) = env::var("IMPACTAREA_COMPARISON") {
            match comparison_str.parse::<ThresholdComparison>() {
                Ok(comparison) => self.comparison.update(comparison, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid IMPACTAREA_COMPARISON value '{}': expected auto, below, or above",
                    comparison_str
                ),
            }
        }

        if let Ok(days_str) = env::var("IMPACTAREA_TOLERANCE_DAYS") {
            match days_str.parse::<u32>() {
                Ok(days) => self.tolerance_days.update(Some(days), ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid IMPACTAREA_TOLERANCE_DAYS value '{}': expected integer days",
                    days_str
                ),
            }
        }

        if let Ok(size_str) = env::var("IMPACTAREA_CHUNK_SIZE") {
            match size_str.parse::<usize>() {
                Ok(size) if size > 0 => self.chunk_size.update(size, ConfigSource::Environment),
                _ => tracing::warn!(
                    "Invalid IMPACTAREA_CHUNK_SIZE value '{}': expected a positive integer",
                    size_str
                ),
            }
        }

        if let Ok(provider_str) = env::var("IMPACTAREA_CLOUD_STORAGE_PROVIDER") {
            match provider_str.parse::<CloudStorageProvider>() {
                Ok(provider) => {
                    self.cloud_storage_provider.update(provider, ConfigSource::Environment)
                }
                Err(_) => tracing::warn!(
                    "Invalid IMPACTAREA_CLOUD_STORAGE_PROVIDER value '{}': expected AWS_S3, AZURE_BLOB_STORAGE, or LOCAL",
                    provider_str
                ),
            }
        }

        if let Some(region) = first_env(&["IMPACTAREA_AWS_REGION", "AWS_REGION"]) {
            self.aws_region.update(Some(region), ConfigSource::Environment);
        }

        if let Ok(dir) = env::var("IMPACTAREA_OUTPUT_DIR") {
            self.output_dir.update(PathBuf::from(dir), ConfigSource::Environment);
        }

        if let Ok(keep_str) = env::var("IMPACTAREA_KEEP_LOCAL_COPY") {
            match parse_bool(&keep_str) {
                Some(keep) => self.keep_local_copy.update(keep, ConfigSource::Environment),
                None => tracing::warn!(
                    "Invalid IMPACTAREA_KEEP_LOCAL_COPY value '{}': expected true or false",
                    keep_str
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(url) = overrides.geosys_api_url {
            self.geosys_api_url.update(url, ConfigSource::Cli);
        }
        if let Some(months) = overrides.search_window_months {
            self.search_window_months.update(months, ConfigSource::Cli);
        }
        if let Some(comparison) = overrides.comparison {
            self.comparison.update(comparison, ConfigSource::Cli);
        }
        if let Some(days) = overrides.tolerance_days {
            self.tolerance_days.update(Some(days), ConfigSource::Cli);
        }
        if let Some(provider) = overrides.cloud_storage_provider {
            self.cloud_storage_provider.update(provider, ConfigSource::Cli);
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir.update(dir, ConfigSource::Cli);
        }
        if let Some(keep) = overrides.keep_local_copy {
            self.keep_local_copy.update(keep, ConfigSource::Cli);
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "geosys_api_url".to_string(),
            (self.geosys_api_url.value.clone(), self.geosys_api_url.source),
        );
        map.insert(
            "identity_server_url".to_string(),
            (self.identity_server_url.value.clone(), self.identity_server_url.source),
        );
        map.insert("stac_url".to_string(), (self.stac_url.value.clone(), self.stac_url.source));
        map.insert(
            "stac_auth_url".to_string(),
            (self.stac_auth_url.value.clone(), self.stac_auth_url.source),
        );
        map.insert(
            "search_window_months".to_string(),
            (self.search_window_months.value.to_string(), self.search_window_months.source),
        );
        map.insert(
            "comparison".to_string(),
            (self.comparison.value.to_string(), self.comparison.source),
        );
        map.insert(
            "tolerance_days".to_string(),
            (
                self.tolerance_days.value.map_or("none".to_string(), |d| d.to_string()),
                self.tolerance_days.source,
            ),
        );
        map.insert(
            "chunk_size".to_string(),
            (self.chunk_size.value.to_string(), self.chunk_size.source),
        );
        map.insert(
            "cloud_storage_provider".to_string(),
            (self.cloud_storage_provider.value.to_string(), self.cloud_storage_provider.source),
        );
        map.insert(
            "aws_region".to_string(),
            (
                self.aws_region.value.clone().unwrap_or_else(|| "none".to_string()),
                self.aws_region.source,
            ),
        );
        map.insert(
            "output_dir".to_string(),
            (self.output_dir.value.display().to_string(), self.output_dir.source),
        );
        map.insert(
            "keep_local_copy".to_string(),
            (self.keep_local_copy.value.to_string(), self.keep_local_copy.source),
        );

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    geosys_api_url: Option<String>,
    identity_server_url: Option<String>,
    stac_url: Option<String>,
    stac_auth_url: Option<String>,
    search_window_months: Option<u32>,
    comparison: Option<ThresholdComparison>,
    tolerance_days: Option<u32>,
    chunk_size: Option<usize>,
    cloud_storage_provider: Option<CloudStorageProvider>,
    aws_region: Option<String>,
    output_dir: Option<PathBuf>,
    keep_local_copy: Option<bool>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub geosys_api_url: Option<String>,
    pub search_window_months: Option<u32>,
    pub comparison: Option<ThresholdComparison>,
    pub tolerance_days: Option<u32>,
    pub cloud_storage_provider: Option<CloudStorageProvider>,
    pub output_dir: Option<PathBuf>,
    pub keep_local_copy: Option<bool>,
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| env::var(name).ok().filter(|v| !v.trim().is_empty()))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
