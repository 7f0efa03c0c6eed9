//! Spatial value types shared by the geo operations.

use geo::{BoundingRect, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

pub use impactarea_core::models::{AreaOfInterest, GridGeometry};

/// Coordinate reference system identified by its EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
}

impl Crs {
    pub const WGS84: Crs = Crs { epsg: 4326 };

    pub fn new(epsg: u32) -> Self {
        Self { epsg }
    }

    /// `EPSG:<code>` as understood by PROJ
    pub fn authority_code(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

/// Axis-aligned bounds `(min_x, min_y, max_x, max_y)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    pub fn of(polygons: &MultiPolygon<f64>) -> Option<Self> {
        polygons.bounding_rect().map(Self::from)
    }

}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// Sub-window of a raster, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub row_offset: usize,
    pub col_offset: usize,
    pub rows: usize,
    pub cols: usize,
}

impl PixelWindow {
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Grid geometry of the window inside `grid`
    pub fn grid(&self, grid: &GridGeometry) -> GridGeometry {
        GridGeometry {
            origin_x: grid.origin_x + self.col_offset as f64 * grid.pixel_width,
            origin_y: grid.origin_y + self.row_offset as f64 * grid.pixel_height,
            ..*grid
        }
    }
}
