use crate::models::{BoundingBox, GridGeometry, PixelWindow};
use geo::{Contains, GeodesicArea, MultiPolygon, Point};
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::AreaOfInterest;
use ndarray::Array2;

/// Area of the polygon set on the WGS 84 ellipsoid, in square meters
pub fn geodesic_area_m2(area: &AreaOfInterest) -> f64 {
    area.polygons().geodesic_area_unsigned()
}

/// Bounds of a polygon set in its own CRS
pub fn polygons_bbox(polygons: &MultiPolygon<f64>) -> Result<BoundingBox> {
    BoundingBox::of(polygons).ok_or_else(|| ImpactError::InvalidGeometry {
        reason: "area has no extent".to_string(),
    })
}

/// Pixels of a `rows` x `cols` grid that cover `bbox`, clamped to the grid
pub fn pixel_window(
    grid: &GridGeometry,
    bbox: &BoundingBox,
    rows: usize,
    cols: usize,
) -> Option<PixelWindow> {
    let col_a = (bbox.min_x - grid.origin_x) / grid.pixel_width;
    let col_b = (bbox.max_x - grid.origin_x) / grid.pixel_width;
    let row_a = (bbox.min_y - grid.origin_y) / grid.pixel_height;
    let row_b = (bbox.max_y - grid.origin_y) / grid.pixel_height;

    let (col_start, col_end) = clamp_span(col_a.min(col_b), col_a.max(col_b), cols)?;
    let (row_start, row_end) = clamp_span(row_a.min(row_b), row_a.max(row_b), rows)?;

    Some(PixelWindow {
        row_offset: row_start,
        col_offset: col_start,
        rows: row_end - row_start,
        cols: col_end - col_start,
    })
}

fn clamp_span(start: f64, end: f64, len: usize) -> Option<(usize, usize)> {
    if !start.is_finite() || !end.is_finite() {
        return None;
    }
    let start = start.floor().max(0.0) as usize;
    let end = (end.ceil().max(0.0) as usize).min(len);
    (start < end).then_some((start, end))
}

/// Pixels whose center falls inside `polygons`; both in the grid CRS
pub fn rasterize_mask(
    polygons: &MultiPolygon<f64>,
    grid: &GridGeometry,
    rows: usize,
    cols: usize,
) -> Array2<bool> {
    Array2::from_shape_fn((rows, cols), |(row, col)| {
        let (x, y) = grid.pixel_center(row, col);
        polygons.contains(&Point::new(x, y))
    })
}

/// Nearest-neighbour sample of `values` (on `from`) at each pixel center of
/// a `shape` grid placed by `to`; both grids in the same CRS.
/// Centers outside `values` are NaN.
pub fn resample_nearest(
    values: &Array2<f64>,
    from: &GridGeometry,
    to: &GridGeometry,
    shape: (usize, usize),
) -> Array2<f64> {
    let (rows, cols) = values.dim();
    Array2::from_shape_fn(shape, |(row, col)| {
        let (x, y) = to.pixel_center(row, col);
        let source_col = ((x - from.origin_x) / from.pixel_width).floor();
        let source_row = ((y - from.origin_y) / from.pixel_height).floor();
        if source_col < 0.0 || source_row < 0.0 {
            return f64::NAN;
        }
        let (r, c) = (source_row as usize, source_col as usize);
        if r < rows && c < cols {
            values[[r, c]]
        } else {
            f64::NAN
        }
    })
}
