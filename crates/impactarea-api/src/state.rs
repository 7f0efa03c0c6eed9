use std::sync::Arc;

use impactarea_core::config::LayeredConfig;
use impactarea_core::error::Result;
use impactarea_fetch::TokenValidator;
use impactarea_processor::{Backends, PlatformBackends, ProcessorSettings};

/// Shared, read-only state of the API
#[derive(Clone)]
pub struct AppState {
    pub backends: Arc<dyn Backends>,
    pub settings: ProcessorSettings,
    pub validator: TokenValidator,
}

impl AppState {
    pub fn new(
        backends: Arc<dyn Backends>,
        settings: ProcessorSettings,
        validator: TokenValidator,
    ) -> Self {
        Self {
            backends,
            settings,
            validator,
        }
    }

    /// Platform backends configured from the layered configuration and environment
    pub fn from_config(config: &LayeredConfig) -> Result<Self> {
        let settings = ProcessorSettings::from_config(config);
        Ok(Self::new(
            Arc::new(PlatformBackends::new(settings.clone())),
            settings,
            TokenValidator::from_env()?,
        ))
    }
}
