use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{AreaOfInterest, DateRange, IndexTimeSeries, TimeSeriesRequest};

/// Port for listing the dates on which imagery covers an area
#[async_trait]
pub trait ImageryCatalog: Send + Sync {
    /// Acquisition dates within `range`, ascending and unique
    async fn image_dates(&self, area: &AreaOfInterest, range: DateRange)
        -> Result<Vec<NaiveDate>>;
}

/// Port for fetching a vegetation-index time series
#[async_trait]
pub trait TimeSeriesSource: Send + Sync {
    /// Fetch the series for the request; fails with `DataUnavailable` when empty
    async fn fetch(&self, request: &TimeSeriesRequest) -> Result<IndexTimeSeries>;
}
