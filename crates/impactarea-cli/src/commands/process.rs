//! Process command implementation

use crate::cli::ProcessArgs;
use crate::environment::{AppEnvironment, INPUT_JSON_PATH_VAR};
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use impactarea_core::config::{CliConfigOverrides, LayeredConfig};
use impactarea_core::models::{InputModel, OutputModel};
use impactarea_processor::{ImpactedAreasProcessor, PlatformBackends, ProcessRequest, ProcessorSettings};
use std::env;

const DEFAULT_ENTITY_ID: &str = "entity_1";

pub async fn execute(args: ProcessArgs, output: &OutputWriter) -> Result<()> {
    // Phase 1: Input
    let environment = AppEnvironment::from_env()?;
    let input_path =
        environment.input_path(args.input_path.clone(), env::var(INPUT_JSON_PATH_VAR).ok())?;
    let input = InputModel::from_path(&input_path)
        .with_context(|| format!("Failed to read input document {}", input_path.display()))?;
    tracing::info!(
        environment = environment.as_str(),
        input = %input_path.display(),
        indicator = %input.indicator,
        "Input loaded"
    );

    // Phase 2: Configuration
    let mut config = LayeredConfig::discover().context("Failed to load configuration")?;
    config.update_from_cli(CliConfigOverrides {
        search_window_months: args.search_window_months,
        comparison: args.comparison,
        tolerance_days: args.tolerance_days,
        cloud_storage_provider: args.cloud_storage_provider,
        output_dir: args.output_dir.clone(),
        keep_local_copy: args.keep_local_copy.then_some(true),
        ..Default::default()
    });
    let provider = config.cloud_storage_provider.value;
    let settings = ProcessorSettings::from_config(&config);

    // Phase 3: Session
    let backends = PlatformBackends::new(settings.clone());
    let token = backends
        .session(args.bearer_token.as_deref())
        .await
        .context("Failed to open an imagery session")?;

    // Phase 4: Processing
    let request = ProcessRequest::new(token)
        .with_storage(provider, args.aws_s3_bucket.clone())
        .with_entity_id(args.entity_id.as_deref().unwrap_or(DEFAULT_ENTITY_ID))
        .with_metrics(args.metrics);
    let result = ImpactedAreasProcessor::new(backends, settings)
        .trigger(&input, &request)
        .await
        .context("Impacted area processing failed")?;

    report(&result, output)
}

fn report(result: &OutputModel, output: &OutputWriter) -> Result<()> {
    if output.is_json() {
        return output.result(result);
    }

    output.section("Impacted Area");
    output.kv("Before event", &result.results.before_event_date);
    output.kv("After event", &result.results.after_event_date);
    output.kv("Impacted", &result.results.impacted_area_percentage);
    output.kv("Area", result.results.impacted_area.trim());

    if let Some(metrics) = &result.metrics {
        output.section("Metrics");
        let fields = [
            ("Execution time", &metrics.execution_time),
            ("Data generation", &metrics.data_generation_network_use),
            ("Data upload", &metrics.data_upload_network_use),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                output.kv(label, value);
            }
        }
    }

    match &result.storage_links {
        Some(link) => output.success(format!("Exported to {}", link)),
        None => output.success("Processing complete"),
    }
    Ok(())
}
