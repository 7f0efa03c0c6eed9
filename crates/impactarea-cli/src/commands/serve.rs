//! Serve command implementation

use crate::cli::ServeArgs;
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use impactarea_api::{ApiConfig, AppState};
use impactarea_core::config::LayeredConfig;
use std::sync::Arc;

pub async fn execute(args: ServeArgs, output: &OutputWriter) -> Result<()> {
    let mut api_config = ApiConfig::from_env();
    if let Some(port) = args.port {
        api_config = api_config.with_port(port);
    }

    let config = LayeredConfig::discover().context("Failed to load configuration")?;
    let state = AppState::from_config(&config).context("Failed to build API state")?;

    output.info(format!("Starting API on {}", api_config.bind_address()));
    impactarea_api::serve(api_config, Arc::new(state)).await
}
