//! Integration tests for cropping and rasterizing an area onto a pixel grid

use impactarea_core::models::{AreaOfInterest, GridGeometry};
use impactarea_geo::models::BoundingBox;
use impactarea_geo::spatial::{geodesic_area_m2, pixel_window, polygons_bbox, rasterize_mask};
use impactarea_geo::validation::ensure_valid_area;
use proptest::prelude::*;

fn grid() -> GridGeometry {
    GridGeometry {
        origin_x: 10.0,
        origin_y: 50.0,
        pixel_width: 0.01,
        pixel_height: -0.01,
        epsg: 4326,
    }
}

#[test]
fn test_crop_then_rasterize_area() {
    let area =
        AreaOfInterest::parse("POLYGON((10.1 49.8, 10.3 49.8, 10.3 49.9, 10.1 49.9, 10.1 49.8))")
            .unwrap();
    ensure_valid_area(&area).unwrap();

    let bbox = polygons_bbox(area.polygons()).unwrap();
    let window = pixel_window(&grid(), &bbox, 100, 100).unwrap();
    // Bounds may land a hair either side of a pixel edge
    assert!((9..=10).contains(&window.col_offset));
    assert!((9..=10).contains(&window.row_offset));

    let sub_grid = window.grid(&grid());
    let mask = rasterize_mask(area.polygons(), &sub_grid, window.rows, window.cols);
    let inside = mask.iter().filter(|m| **m).count();
    // 20 x 10 pixels of 0.01 degree
    assert_eq!(inside, 200);

    assert!(geodesic_area_m2(&area) > 0.0);
}

proptest! {
    #[test]
    fn test_window_stays_inside_grid(
        x in 9.0f64..12.0,
        y in 48.0f64..51.0,
        w in 0.001f64..2.0,
        h in 0.001f64..2.0,
    ) {
        let bbox = BoundingBox::new(x, y, x + w, y + h);
        if let Some(window) = pixel_window(&grid(), &bbox, 100, 100) {
            prop_assert!(!window.is_empty());
            prop_assert!(window.row_offset + window.rows <= 100);
            prop_assert!(window.col_offset + window.cols <= 100);
        }
    }
}
