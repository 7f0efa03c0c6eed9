use chrono::{Months, NaiveDate};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ImpactError, Result};
use crate::models::{AreaOfInterest, VegetationIndex};

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(ImpactError::invalid_input(
                "date_range",
                format!("end date {} is before start date {}", end, start),
            ));
        }
        Ok(Self { start, end })
    }

    /// Window of `months` on each side of the event, never extending past `today`
    pub fn around_event(event: NaiveDate, months: u32, today: NaiveDate) -> Result<Self> {
        let span = Months::new(months);
        let start = event.checked_sub_months(span).ok_or_else(|| {
            ImpactError::invalid_input("eventDate", format!("{} is out of range", event))
        })?;
        let end = event.checked_add_months(span).ok_or_else(|| {
            ImpactError::invalid_input("eventDate", format!("{} is out of range", event))
        })?;
        Self::new(start, end.min(today))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// STAC-style `start/end` interval
    pub fn to_interval(&self) -> String {
        format!("{}/{}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }
}

/// Affine placement of the pixel grid (north-up)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up grids
    pub pixel_height: f64,
    pub epsg: u32,
}

impl GridGeometry {
    /// Coordinates of the center of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Center x coordinate of each column
    pub fn x_coords(&self, cols: usize) -> Vec<f64> {
        (0..cols).map(|c| self.pixel_center(0, c).0).collect()
    }

    /// Center y coordinate of each row
    pub fn y_coords(&self, rows: usize) -> Vec<f64> {
        (0..rows).map(|r| self.pixel_center(r, 0).1).collect()
    }
}

/// STAC catalog selection for a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StacOptions {
    pub sensor_collection: String,
    pub mask_collection: String,
    pub mask_band: String,
    pub bands: Vec<String>,
    pub max_cloud_cover_percentage: f64,
}

/// What to fetch for one invocation
#[derive(Debug, Clone)]
pub struct TimeSeriesRequest {
    pub area: AreaOfInterest,
    pub index: VegetationIndex,
    pub range: DateRange,
    pub sensors: Vec<String>,
    pub stac: Option<StacOptions>,
}

impl TimeSeriesRequest {
    pub fn new(area: AreaOfInterest, index: VegetationIndex, range: DateRange) -> Self {
        Self {
            area,
            index,
            range,
            sensors: default_sensors(),
            stac: None,
        }
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_stac(mut self, stac: StacOptions) -> Self {
        self.stac = Some(stac);
        self
    }
}

/// Sentinel-2 and Landsat 8/9, the platform's optical collections
pub fn default_sensors() -> Vec<String> {
    vec!["SENTINEL_2".to_string(), "LANDSAT_8".to_string(), "LANDSAT_9".to_string()]
}

/// One dated index image
#[derive(Debug, Clone)]
pub struct Observation {
    pub date: NaiveDate,
    pub values: Array2<f64>,
    /// Fraction of the area seen without clouds, when known
    pub clear_fraction: Option<f64>,
}

/// Labeled (time, y, x) cube of index values. NaN marks missing pixels.
#[derive(Debug, Clone)]
pub struct IndexTimeSeries {
    index: VegetationIndex,
    dates: Vec<NaiveDate>,
    values: Array3<f64>,
    clear_fraction: Option<Vec<f64>>,
    grid: Option<GridGeometry>,
}

impl IndexTimeSeries {
    /// Build from a cube whose first axis follows `dates`.
    ///
    /// Dates are sorted ascending and duplicated dates keep their first slice.
    pub fn new(index: VegetationIndex, dates: Vec<NaiveDate>, values: Array3<f64>) -> Result<Self> {
        Self::assemble(index, dates, values, None)
    }

    /// Build from individual observations of identical shape
    pub fn from_observations(index: VegetationIndex, observations: Vec<Observation>) -> Result<Self> {
        let first = observations
            .first()
            .ok_or_else(|| ImpactError::unavailable(format!("No {} images time series found", index)))?;
        let (rows, cols) = first.values.dim();

        let mut dates = Vec::with_capacity(observations.len());
        let mut fractions = Vec::with_capacity(observations.len());
        let mut flat = Vec::with_capacity(observations.len() * rows * cols);
        let track_clear = observations.iter().all(|o| o.clear_fraction.is_some());

        for observation in observations {
            if observation.values.dim() != (rows, cols) {
                let (r, c) = observation.values.dim();
                return Err(ImpactError::ShapeMismatch {
                    expected: vec![rows, cols],
                    actual: vec![r, c],
                });
            }
            dates.push(observation.date);
            fractions.push(observation.clear_fraction.unwrap_or(1.0));
            flat.extend(observation.values.iter().copied());
        }

        let values = Array3::from_shape_vec((dates.len(), rows, cols), flat).map_err(|e| {
            ImpactError::Serialization(format!("Failed to assemble time series: {}", e))
        })?;

        Self::assemble(index, dates, values, track_clear.then_some(fractions))
    }

    fn assemble(
        index: VegetationIndex,
        dates: Vec<NaiveDate>,
        values: Array3<f64>,
        clear_fraction: Option<Vec<f64>>,
    ) -> Result<Self> {
        let (t, rows, cols) = values.dim();
        if t != dates.len() {
            return Err(ImpactError::ShapeMismatch {
                expected: vec![dates.len(), rows, cols],
                actual: vec![t, rows, cols],
            });
        }
        if let Some(fractions) = &clear_fraction {
            if fractions.len() != t {
                return Err(ImpactError::ShapeMismatch {
                    expected: vec![t],
                    actual: vec![fractions.len()],
                });
            }
        }

        // Stable sort keeps the first slice of a duplicated date in front
        let mut order: Vec<usize> = (0..t).collect();
        order.sort_by_key(|&i| dates[i]);
        order.dedup_by_key(|i| dates[*i]);

        let sorted_dates = order.iter().map(|&i| dates[i]).collect();
        let sorted_values = values.select(Axis(0), &order);
        let sorted_fractions =
            clear_fraction.map(|f| order.iter().map(|&i| f[i]).collect::<Vec<_>>());

        Ok(Self {
            index,
            dates: sorted_dates,
            values: sorted_values,
            clear_fraction: sorted_fractions,
            grid: None,
        })
    }

    pub fn with_grid(mut self, grid: GridGeometry) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn index(&self) -> VegetationIndex {
        self.index
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    pub fn grid(&self) -> Option<&GridGeometry> {
        self.grid.as_ref()
    }

    /// (rows, cols) of each slice
    pub fn shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.values.dim();
        (rows, cols)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn slice(&self, position: usize) -> ArrayView2<'_, f64> {
        self.values.index_axis(Axis(0), position)
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn clear_fraction(&self, position: usize) -> Option<f64> {
        self.clear_fraction.as_ref().and_then(|f| f.get(position).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_capped_at_today() {
        let range = DateRange::around_event(date(2024, 5, 15), 6, date(2024, 8, 1)).unwrap();
        assert_eq!(range.start, date(2023, 11, 15));
        assert_eq!(range.end, date(2024, 8, 1));
        assert_eq!(range.to_interval(), "2023-11-15/2024-08-01");
    }

    #[test]
    fn test_window_full_when_in_past() {
        let range = DateRange::around_event(date(2022, 3, 31), 6, date(2024, 1, 1)).unwrap();
        assert_eq!(range.start, date(2021, 9, 30));
        assert_eq!(range.end, date(2022, 9, 30));
    }

    #[test]
    fn test_series_sorted_and_deduplicated() {
        let values = Array3::from_shape_vec(
            (3, 1, 1),
            vec![3.0, 1.0, 2.0],
        )
        .unwrap();
        let dates = vec![date(2024, 3, 1), date(2024, 1, 1), date(2024, 3, 1)];
        let series = IndexTimeSeries::new(VegetationIndex::NDVI, dates, values).unwrap();

        assert_eq!(series.dates(), &[date(2024, 1, 1), date(2024, 3, 1)]);
        assert_eq!(series.slice(0)[[0, 0]], 1.0);
        assert_eq!(series.slice(1)[[0, 0]], 3.0);
    }

    #[test]
    fn test_series_rejects_length_mismatch() {
        let values = Array3::<f64>::zeros((2, 2, 2));
        let err = IndexTimeSeries::new(VegetationIndex::NDVI, vec![date(2024, 1, 1)], values)
            .unwrap_err();
        assert!(matches!(err, ImpactError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_from_observations_tracks_clear_fraction() {
        let observations = vec![
            Observation {
                date: date(2024, 2, 1),
                values: array![[0.5]],
                clear_fraction: Some(0.4),
            },
            Observation {
                date: date(2024, 1, 1),
                values: array![[0.6]],
                clear_fraction: Some(0.9),
            },
        ];
        let series = IndexTimeSeries::from_observations(VegetationIndex::NDVI, observations).unwrap();
        assert_eq!(series.clear_fraction(0), Some(0.9));
        assert_eq!(series.clear_fraction(1), Some(0.4));
    }

    #[test]
    fn test_grid_pixel_centers() {
        let grid = GridGeometry {
            origin_x: 100.0,
            origin_y: 200.0,
            pixel_width: 10.0,
            pixel_height: -10.0,
            epsg: 32631,
        };
        assert_eq!(grid.pixel_center(0, 0), (105.0, 195.0));
        assert_eq!(grid.x_coords(2), vec![105.0, 115.0]);
        assert_eq!(grid.y_coords(2), vec![195.0, 185.0]);
    }
}
