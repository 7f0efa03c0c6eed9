pub mod area;
pub mod impact;
pub mod index;
pub mod io;
pub mod storage;
pub mod timeseries;

pub use area::AreaOfInterest;
pub use impact::{BaselineRule, ImpactParams, ImpactResult, ImpactSummary, ThresholdComparison};
pub use index::VegetationIndex;
pub use io::{
    format_output_date, ImpactArrays, InputModel, Metrics, OutputModel, Parameters, Results,
    StacParameters,
};
pub use storage::{CloudStorageProvider, ExportedArtifact};
pub use timeseries::{
    default_sensors, DateRange, GridGeometry, IndexTimeSeries, Observation, StacOptions,
    TimeSeriesRequest,
};
