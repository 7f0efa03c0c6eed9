//! Config command implementation

use crate::output::OutputWriter;
use crate::output_types::{ConfigEntry, ConfigOutput};
use anyhow::{Context, Result};
use impactarea_core::config::{ConfigSource, LayeredConfig, CONFIG_FILE_NAME};
use tabled::Tabled;

pub fn execute(output: &OutputWriter) -> Result<()> {
    let config = LayeredConfig::discover().context("Failed to load configuration")?;
    let entries = entries(&config);

    if output.is_json() {
        return output.result(ConfigOutput { values: entries });
    }

    output.section("Configuration");

    #[derive(Tabled)]
    struct ConfigRow {
        #[tabled(rename = "Key")]
        key: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    let rows: Vec<ConfigRow> = entries
        .into_iter()
        .map(|e| ConfigRow {
            key: e.key,
            value: e.value,
            source: e.source,
        })
        .collect();
    output.table(rows);
    output.info(format!(
        "Precedence: CLI > environment (IMPACTAREA_*) > {} > defaults",
        CONFIG_FILE_NAME
    ));
    Ok(())
}

fn source_label(source: ConfigSource) -> &'static str {
    match source {
        ConfigSource::Default => "default",
        ConfigSource::File => "file",
        ConfigSource::Environment => "environment",
        ConfigSource::Cli => "cli",
    }
}

/// Inspection map sorted by key
fn entries(config: &LayeredConfig) -> Vec<ConfigEntry> {
    let mut entries: Vec<ConfigEntry> = config
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigEntry {
            key,
            value,
            source: source_label(source).to_string(),
        })
        .collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    entries
}
