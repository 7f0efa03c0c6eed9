//! Inspect command implementation

use crate::cli::InspectArgs;
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::InspectStoreOutput;
use anyhow::{Context, Result};
use impactarea_store::local::LocalStore;
use impactarea_store::Exporter;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

pub async fn execute(args: InspectArgs, output: &OutputWriter) -> Result<()> {
    let (root, name) = split_store_path(&args.store)?;
    let exporter = Exporter::new(Arc::new(LocalStore::new(root)));
    let stored = exporter
        .load(&name)
        .await
        .with_context(|| format!("Failed to read store {}", args.store.display()))?;

    let report = InspectStoreOutput::new(args.store.display().to_string(), &stored);
    if output.is_json() {
        return output.result(report);
    }

    output.section("Impacted Area Store");

    #[derive(Tabled)]
    struct FieldRow {
        #[tabled(rename = "Field")]
        field: &'static str,
        #[tabled(rename = "Value")]
        value: String,
    }

    let optional = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    let rows = vec![
        FieldRow { field: "Entity", value: optional(report.entity_id.clone()) },
        FieldRow { field: "Index", value: report.index.to_string() },
        FieldRow { field: "Threshold", value: report.threshold.to_string() },
        FieldRow { field: "Comparison", value: report.comparison.clone() },
        FieldRow { field: "Event date", value: report.event_date.to_string() },
        FieldRow { field: "Before event", value: report.baseline_date.to_string() },
        FieldRow { field: "After event", value: report.post_event_date.to_string() },
        FieldRow {
            field: "Minimum duration",
            value: optional(report.min_duration.map(|n| n.to_string())),
        },
        FieldRow {
            field: "Shape",
            value: format!("{} x {}", report.shape[0], report.shape[1]),
        },
        FieldRow { field: "Valid pixels", value: report.valid_pixels.to_string() },
        FieldRow { field: "Impacted pixels", value: report.impacted_pixels.to_string() },
        FieldRow { field: "Impacted", value: report.summary.formatted_percentage() },
        FieldRow {
            field: "Area",
            value: report.summary.formatted_area().trim().to_string(),
        },
    ];
    output.table(rows);
    Ok(())
}

/// `<root>/<name>.zarr` into the store root and the store name
fn split_store_path(path: &Path) -> Result<(std::path::PathBuf, String)> {
    if !path.is_dir() {
        return Err(errors::store_not_found(&path.display().to_string()).into());
    }
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| errors::store_not_found(&path.display().to_string()))?;
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    Ok((root, name))
}
