use std::sync::Arc;

use impactarea_api::{serve, ApiConfig, AppState};
use impactarea_core::config::LayeredConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "impactarea_api=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env();
    let layered = LayeredConfig::discover()?;
    let state = Arc::new(AppState::from_config(&layered)?);

    tracing::info!(
        port = config.port,
        geosys_api_url = %state.settings.geosys_api_url,
        verifies_tokens = state.validator.verifies_signatures(),
        "Starting impacted area API server"
    );

    serve(config, state).await
}
