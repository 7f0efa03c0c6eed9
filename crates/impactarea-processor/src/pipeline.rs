use std::time::Instant;

use chrono::{NaiveDate, Utc};
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::{
    format_output_date, AreaOfInterest, BaselineRule, CloudStorageProvider, DateRange,
    ImpactArrays, ImpactParams, ImpactResult, ImpactSummary, IndexTimeSeries, InputModel, Metrics,
    OutputModel, Results, StacOptions, TimeSeriesRequest, VegetationIndex,
};
use impactarea_core::processing::{compute_impact, find_nearest_dates};
use impactarea_core::TransferMeter;
use impactarea_fetch::SessionToken;
use impactarea_geo::spatial::geodesic_area_m2;
use impactarea_geo::validation::ensure_valid_area;
use impactarea_store::{check_credentials, Exporter};

use crate::backends::{Backends, Imagery, Reference};
use crate::settings::ProcessorSettings;

/// Per-call options that are not part of the input document
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub token: SessionToken,
    /// `None` returns the arrays inline instead of exporting them
    pub cloud_storage_provider: Option<CloudStorageProvider>,
    pub aws_s3_bucket: Option<String>,
    pub entity_id: Option<String>,
    pub metrics: bool,
}

impl ProcessRequest {
    pub fn new(token: SessionToken) -> Self {
        Self {
            token,
            cloud_storage_provider: None,
            aws_s3_bucket: None,
            entity_id: None,
            metrics: false,
        }
    }

    pub fn with_storage(mut self, provider: CloudStorageProvider, bucket: Option<String>) -> Self {
        self.cloud_storage_provider = Some(provider);
        self.aws_s3_bucket = bucket;
        self
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_metrics(mut self, metrics: bool) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Validated view of an input document
struct Job {
    index: VegetationIndex,
    area: AreaOfInterest,
    event_date: NaiveDate,
    threshold: f64,
    min_duration: Option<u32>,
    min_gap_days: Option<u32>,
    stac: Option<StacOptions>,
}

impl Job {
    fn reference(&self) -> Reference {
        if self.stac.is_some() {
            Reference::Stac
        } else {
            Reference::MapReference
        }
    }
}

/// Impacted area use case over a set of backends
pub struct ImpactedAreasProcessor<B: Backends> {
    backends: B,
    settings: ProcessorSettings,
    today: Option<NaiveDate>,
}

impl<B: Backends> ImpactedAreasProcessor<B> {
    pub fn new(backends: B, settings: ProcessorSettings) -> Self {
        Self {
            backends,
            settings,
            today: None,
        }
    }

    /// Fix the date that caps the search window
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Run the whole computation for one input document
    pub async fn trigger(&self, input: &InputModel, request: &ProcessRequest) -> Result<OutputModel> {
        let started = Instant::now();
        let meter = TransferMeter::new();

        // Phase 1: Validation
        let job = validate(input)?;
        if let Some(provider) = request.cloud_storage_provider {
            check_credentials(provider)?;
        }

        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let window = DateRange::around_event(job.event_date, self.settings.search_window_months, today)?;
        tracing::info!(
            index = %job.index,
            event_date = %job.event_date,
            window = %window.to_interval(),
            reference = ?job.reference(),
            "Processing impacted area"
        );

        // Phase 2: Imagery
        let imagery = self.backends.imagery(job.reference(), &request.token, &meter).await?;
        let series = self.fetch_series(&job, &imagery, window).await?;

        // Phase 3: Calculation
        let params = self.impact_params(&job);
        let result = compute_impact(&series, &params)?;
        let summary = ImpactSummary::new(geodesic_area_m2(&job.area), result.impacted_percentage());

        // Phase 4: Export
        let (storage_links, arrays) = match request.cloud_storage_provider {
            Some(provider) => {
                let uri = self.export(provider, request, &result, &summary, &meter).await?;
                (Some(uri), None)
            }
            None => (None, Some(ImpactArrays::from_result(&result))),
        };

        let metrics = request.metrics.then(|| {
            Metrics::from_measurements(started.elapsed(), meter.downloaded(), meter.uploaded())
        });

        Ok(OutputModel {
            storage_links,
            results: Results {
                before_event_date: format_output_date(result.baseline_date),
                after_event_date: format_output_date(result.post_event_date),
                impacted_area_percentage: summary.formatted_percentage(),
                impacted_area: summary.formatted_area(),
            },
            metrics,
            arrays,
        })
    }

    async fn fetch_series(
        &self,
        job: &Job,
        imagery: &Imagery,
        window: DateRange,
    ) -> Result<IndexTimeSeries> {
        let request = TimeSeriesRequest::new(job.area.clone(), job.index, window);

        if let Some(stac) = &job.stac {
            return imagery.source.fetch(&request.with_stac(stac.clone())).await;
        }

        let catalog = imagery.catalog.as_ref().ok_or_else(|| {
            ImpactError::unavailable("no imagery catalog for map reference imagery")
        })?;
        let dates = catalog.image_dates(&job.area, window).await?;
        tracing::debug!(count = dates.len(), "Catalog dates listed");

        let nearest = find_nearest_dates(job.event_date, job.min_gap_days.unwrap_or(0), &dates)?;
        let end = if job.min_duration.is_some_and(|n| n > 0) {
            window.end
        } else {
            nearest.after
        };
        let narrowed = DateRange::new(nearest.before, end)?;

        imagery.source.fetch(&request.with_range(narrowed)).await
    }

    fn impact_params(&self, job: &Job) -> ImpactParams {
        let baseline = match job.min_gap_days {
            Some(days) if days > 0 => BaselineRule::MinimumGap { days },
            _ => BaselineRule::Nearest,
        };
        ImpactParams::new(job.event_date, job.threshold)
            .with_comparison(self.settings.comparison)
            .with_min_duration(job.min_duration)
            .with_baseline(baseline)
            .with_tolerance_days(self.settings.tolerance_days)
            .with_max_cloud_cover(job.stac.as_ref().map(|s| s.max_cloud_cover_percentage))
    }

    async fn export(
        &self,
        provider: CloudStorageProvider,
        request: &ProcessRequest,
        result: &ImpactResult,
        summary: &ImpactSummary,
        meter: &TransferMeter,
    ) -> Result<String> {
        let store = self
            .backends
            .object_store(provider, request.aws_s3_bucket.as_deref())
            .await?;
        let mut exporter = Exporter::new(store)
            .with_chunk_size(self.settings.chunk_size)
            .with_meter(meter.clone());
        if self.settings.keep_local_copy {
            exporter = exporter.with_local_copy(self.settings.output_dir.clone());
        }

        let artifact = exporter.export(result, summary, request.entity_id.as_deref()).await?;
        tracing::info!(uri = %artifact.uri, bytes = artifact.bytes, "Impacted area exported");
        Ok(artifact.uri)
    }
}

fn validate(input: &InputModel) -> Result<Job> {
    let index = input.index()?;
    let area = input.area()?;
    ensure_valid_area(&area)?;
    let event_date = input.parameters.event_date()?;

    let stac = input.stac.clone().map(StacOptions::from);
    if let Some(options) = &stac {
        if options.bands.is_empty() {
            return Err(ImpactError::invalid_input("bands", "at least one band is required"));
        }
        if !(0.0..=100.0).contains(&options.max_cloud_cover_percentage) {
            return Err(ImpactError::invalid_input(
                "max_cloud_cover_percentage",
                format!("{} is not within 0..=100", options.max_cloud_cover_percentage),
            ));
        }
    }

    let job = Job {
        index,
        area,
        event_date,
        threshold: input.parameters.threshold,
        min_duration: input.parameters.min_duration,
        min_gap_days: input.parameters.min_gap_days,
        stac,
    };
    ImpactParams::new(job.event_date, job.threshold).validate()?;
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use impactarea_core::models::{Parameters, StacParameters};

    fn input(indicator: &str, polygon: &str) -> InputModel {
        InputModel {
            parameters: Parameters {
                polygon: polygon.to_string(),
                event_date: "2023-05-15".to_string(),
                min_duration: None,
                threshold: -0.15,
                min_gap_days: None,
            },
            indicator: indicator.to_string(),
            stac: None,
        }
    }

    const SQUARE: &str = "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))";

    #[test]
    fn test_validate_selects_reference() {
        let job = validate(&input("NDVI", SQUARE)).unwrap();
        assert_eq!(job.index, VegetationIndex::NDVI);
        assert_eq!(job.reference(), Reference::MapReference);

        let mut with_stac = input("NDVI", SQUARE);
        with_stac.stac = Some(StacParameters {
            sensor_collection: "s2".to_string(),
            mask_collection: "mask".to_string(),
            mask_band: "CMASK".to_string(),
            bands: vec!["red".to_string(), "nir".to_string()],
            max_cloud_cover_percentage: 20.0,
        });
        assert_eq!(validate(&with_stac).unwrap().reference(), Reference::Stac);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(matches!(
            validate(&input("NDXI", SQUARE)),
            Err(ImpactError::UnknownIndex { .. })
        ));
        assert!(matches!(
            validate(&input("NDVI", "POINT(1 1)")),
            Err(ImpactError::InvalidGeometry { .. })
        ));

        let mut bad_threshold = input("NDVI", SQUARE);
        bad_threshold.parameters.threshold = f64::INFINITY;
        assert!(matches!(validate(&bad_threshold), Err(ImpactError::InvalidInput { .. })));
    }
}
