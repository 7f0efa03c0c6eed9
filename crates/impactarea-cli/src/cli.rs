use clap::{Args, Parser, Subcommand};
use impactarea_core::models::{CloudStorageProvider, ThresholdComparison};
use std::path::PathBuf;

/// impactarea - Vegetation index impacted area processor
#[derive(Parser, Debug)]
#[command(name = "impactarea")]
#[command(about = "Identify areas whose vegetation index dropped after an event", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Without a subcommand the run mode comes from `RUN_MODE_ENV`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the impacted area for one input document
    Process(ProcessArgs),

    /// Start the HTTP API
    Serve(ServeArgs),

    /// Read back an exported local store
    Inspect(InspectArgs),

    /// Show the layered configuration and where each value comes from
    Config,
}

#[derive(Args, Debug, Default)]
pub struct ProcessArgs {
    /// Input document (required outside the local environment)
    #[arg(long)]
    pub input_path: Option<PathBuf>,

    /// Token forwarded to the imagery platform
    #[arg(long, env = "BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Target bucket when exporting to AWS S3
    #[arg(long)]
    pub aws_s3_bucket: Option<String>,

    /// AWS_S3, AZURE_BLOB_STORAGE or LOCAL
    #[arg(long)]
    pub cloud_storage_provider: Option<CloudStorageProvider>,

    /// Prefix of the exported store name [default: entity_1]
    #[arg(long)]
    pub entity_id: Option<String>,

    /// Report execution time and network use
    #[arg(long)]
    pub metrics: bool,

    /// Months searched on each side of the event
    #[arg(long)]
    pub search_window_months: Option<u32>,

    /// auto, below or above
    #[arg(long)]
    pub comparison: Option<ThresholdComparison>,

    /// Maximum distance in days between the event and the selected images
    #[arg(long)]
    pub tolerance_days: Option<u32>,

    /// Root directory of LOCAL stores and local copies
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Keep a copy of exported stores below the output directory
    #[arg(long)]
    pub keep_local_copy: bool,
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (defaults to IMPACTAREA_PORT or 8081)
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path of a `.zarr` store directory
    pub store: PathBuf,
}
