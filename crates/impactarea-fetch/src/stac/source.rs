//! Index time series built from STAC GeoTIFF assets and a cloud mask collection

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use geo::MultiPolygon;
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::{
    GridGeometry, IndexTimeSeries, Observation, StacOptions, TimeSeriesRequest, VegetationIndex,
};
use impactarea_core::ports::TimeSeriesSource;
use impactarea_core::processing::{compute_index, SpectralBands};
use impactarea_geo::models::{BoundingBox, Crs, PixelWindow};
use impactarea_geo::spatial::{pixel_window, polygons_bbox, rasterize_mask, resample_nearest};
use impactarea_geo::transform::reproject_multipolygon;
use ndarray::{Array2, Zip};

use super::client::StacClient;
use super::models::{StacAsset, StacItem, StacSearchParams};
use super::raster::{RemoteRaster, TiffLayout};

/// Mask value of a clear pixel
const CLEAR: f64 = 1.0;

const PAGE_SIZE: u32 = 100;

pub struct StacTimeSeriesSource {
    client: StacClient,
}

impl StacTimeSeriesSource {
    pub fn new(client: StacClient) -> Self {
        Self { client }
    }

    async fn search(&self, request: &TimeSeriesRequest, collection: &str) -> Result<Vec<StacItem>> {
        let geometry = serde_json::to_value(request.area.to_geojson())?;
        let params = StacSearchParams::new()
            .collection(collection)
            .intersects(geometry)
            .datetime(request.range.to_interval())
            .limit(PAGE_SIZE);
        self.client.search_all(&params).await
    }

    async fn open_asset<'a>(&self, item: &'a StacItem, key: &str) -> Result<(&'a StacAsset, RemoteRaster)> {
        let asset = item.asset(key).ok_or_else(|| {
            ImpactError::unavailable(format!("item {} has no '{}' asset", item.id, key))
        })?;
        let raster = RemoteRaster::open(&self.client, &asset.href).await?;
        Ok((asset, raster))
    }

    /// Asset values under the area, sampled at the pixel centers of `target`
    async fn read_onto<'a>(
        &self,
        item: &'a StacItem,
        key: &str,
        clip: &AreaClip,
        target: &GridGeometry,
        shape: (usize, usize),
    ) -> Result<(&'a StacAsset, Array2<f64>)> {
        let (asset, mut raster) = self.open_asset(item, key).await?;
        let (window, grid) = clip.window(raster.layout())?;
        let values = raster.read_window(&self.client, &window).await?;
        if grid == *target && values.dim() == shape {
            return Ok((asset, values));
        }
        tracing::debug!(item = %item.id, key, "Resampling asset onto the observation grid");
        Ok((asset, resample_nearest(&values, &grid, target, shape)))
    }

    async fn observation(
        &self,
        request: &TimeSeriesRequest,
        options: &StacOptions,
        date: NaiveDate,
        item: &StacItem,
        mask_item: &StacItem,
    ) -> Result<(Observation, GridGeometry)> {
        let required = request.index.required_bands();
        let (reference_key, others) = required.split_first().ok_or_else(|| {
            ImpactError::UnsupportedIndex { index: request.index.to_string() }
        })?;

        // The first band fixes the CRS and the grid of the observation
        let (reference_asset, mut reference) = self.open_asset(item, reference_key).await?;
        let epsg = reference
            .layout()
            .epsg
            .or_else(|| item.epsg())
            .unwrap_or(Crs::WGS84.epsg);
        let polygons = reproject_multipolygon(request.area.polygons(), &Crs::WGS84, &Crs::new(epsg))?;
        let clip = AreaClip::new(polygons, epsg)?;

        let (window, grid) = clip.window(reference.layout())?;
        let shape = (window.rows, window.cols);
        let inside = clip.inside(&grid, shape);

        let mut bands = SpectralBands::new();
        let raw = reference.read_window(&self.client, &window).await?;
        bands.insert(*reference_key, to_physical(raw, reference_asset, &inside))?;
        for key in others {
            let (asset, raw) = self.read_onto(item, key, &clip, &grid, shape).await?;
            bands.insert(*key, to_physical(raw, asset, &inside))?;
        }
        let (_, mask_values) = self
            .read_onto(mask_item, &options.mask_band, &clip, &grid, shape)
            .await?;

        let clear_fraction = clear_fraction(bands.get(reference_key)?, &mask_values);

        let mut masked = SpectralBands::new();
        for name in required {
            let mut values = bands.get(name)?.clone();
            apply_cloud_mask(&mut values, &mask_values)?;
            masked.insert(*name, values)?;
        }

        let values = compute_index(request.index, &masked)?;
        Ok((Observation { date, values, clear_fraction: Some(clear_fraction) }, grid))
    }
}

#[async_trait]
impl TimeSeriesSource for StacTimeSeriesSource {
    async fn fetch(&self, request: &TimeSeriesRequest) -> Result<IndexTimeSeries> {
        let options = request
            .stac
            .as_ref()
            .ok_or_else(|| ImpactError::invalid_input("stac", "STAC parameters are required"))?;
        check_bands(request.index, options)?;

        let (items, mask_items) = futures::try_join!(
            self.search(request, &options.sensor_collection),
            self.search(request, &options.mask_collection)
        )?;
        tracing::info!(
            items = items.len(),
            masks = mask_items.len(),
            collection = %options.sensor_collection,
            "STAC items found"
        );

        let masks_by_date = index_by_date(&mask_items);
        let mut seen = HashSet::new();
        let mut observations = Vec::new();
        let mut grid: Option<GridGeometry> = None;

        for item in &items {
            let Some(date) = item.date().filter(|d| request.range.contains(*d)) else {
                continue;
            };
            if !seen.insert(date) {
                continue;
            }
            let Some(mask_item) = masks_by_date.get(&date) else {
                tracing::warn!(date = %date, item = %item.id, "No cloud mask for acquisition, skipping");
                continue;
            };

            let (observation, item_grid) =
                self.observation(request, options, date, item, mask_item).await?;
            if let Some(first) = observations.first().map(|o: &Observation| o.values.dim()) {
                if observation.values.dim() != first {
                    tracing::warn!(date = %date, "Acquisition grid differs from the first one, skipping");
                    continue;
                }
            }
            grid.get_or_insert(item_grid);
            observations.push(observation);
        }

        let series = IndexTimeSeries::from_observations(request.index, observations)?;
        tracing::info!(dates = series.len(), index = %request.index, "STAC time series assembled");
        Ok(match grid {
            Some(grid) => series.with_grid(grid),
            None => series,
        })
    }
}

/// Every band the index needs must be requested
fn check_bands(index: VegetationIndex, options: &StacOptions) -> Result<()> {
    let required = index.required_bands();
    if required.is_empty() {
        return Err(ImpactError::UnsupportedIndex { index: index.to_string() });
    }
    let requested: HashSet<String> = options.bands.iter().map(|b| b.to_lowercase()).collect();
    match required.iter().find(|b| !requested.contains(**b)) {
        Some(missing) => Err(ImpactError::invalid_input(
            "bands",
            format!("{} requires the '{}' band", index, missing),
        )),
        None => Ok(()),
    }
}

/// First item of each day
fn index_by_date(items: &[StacItem]) -> HashMap<NaiveDate, &StacItem> {
    let mut by_date = HashMap::new();
    for item in items {
        if let Some(date) = item.date() {
            by_date.entry(date).or_insert(item);
        }
    }
    by_date
}

/// Area polygons in the raster CRS with their bounds
struct AreaClip {
    polygons: MultiPolygon<f64>,
    bbox: BoundingBox,
    epsg: u32,
}

impl AreaClip {
    fn new(polygons: MultiPolygon<f64>, epsg: u32) -> Result<Self> {
        let bbox = polygons_bbox(&polygons)?;
        Ok(Self { polygons, bbox, epsg })
    }

    /// Pixels of a raster covering the area, and where they lie
    fn window(&self, layout: &TiffLayout) -> Result<(PixelWindow, GridGeometry)> {
        if let Some(epsg) = layout.epsg.filter(|e| *e != self.epsg) {
            return Err(ImpactError::unavailable(format!(
                "asset is in EPSG:{}, expected EPSG:{}",
                epsg, self.epsg
            )));
        }
        let grid = layout
            .grid(self.epsg)
            .ok_or_else(|| ImpactError::unavailable("asset has no georeferencing"))?;
        let window = pixel_window(&grid, &self.bbox, layout.height, layout.width)
            .ok_or_else(|| ImpactError::unavailable("asset does not cover the area"))?;
        Ok((window, window.grid(&grid)))
    }

    fn inside(&self, grid: &GridGeometry, (rows, cols): (usize, usize)) -> Array2<bool> {
        rasterize_mask(&self.polygons, grid, rows, cols)
    }
}

/// Stored band values to physical ones; outside, zero and nodata pixels become NaN
fn to_physical(mut values: Array2<f64>, asset: &StacAsset, inside: &Array2<bool>) -> Array2<f64> {
    let (scale, offset) = asset.scaling();
    let nodata = asset.nodata();
    Zip::from(&mut values).and(inside).for_each(|v, inside| {
        *v = if !*inside || *v == 0.0 || Some(*v) == nodata {
            f64::NAN
        } else {
            *v * scale + offset
        };
    });
    values
}

fn apply_cloud_mask(values: &mut Array2<f64>, mask: &Array2<f64>) -> Result<()> {
    if values.dim() != mask.dim() {
        let ((er, ec), (ar, ac)) = (values.dim(), mask.dim());
        return Err(ImpactError::ShapeMismatch { expected: vec![er, ec], actual: vec![ar, ac] });
    }
    values.zip_mut_with(mask, |v, m| {
        if *m != CLEAR {
            *v = f64::NAN;
        }
    });
    Ok(())
}

/// Share of the area's valid pixels that the mask marks clear
fn clear_fraction(raw: &Array2<f64>, mask: &Array2<f64>) -> f64 {
    let mut valid = 0usize;
    let mut clear = 0usize;
    for (value, m) in raw.iter().zip(mask.iter()) {
        if value.is_nan() {
            continue;
        }
        valid += 1;
        if *m == CLEAR {
            clear += 1;
        }
    }
    if valid == 0 {
        0.0
    } else {
        clear as f64 / valid as f64
    }
}
