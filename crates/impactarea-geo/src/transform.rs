//! CRS transformation of the area of interest

use crate::models::Crs;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use impactarea_core::error::{ImpactError, Result};
use proj::Proj;

/// Check if two CRS are the same
pub fn crs_match(crs1: &Crs, crs2: &Crs) -> bool {
    crs1.epsg == crs2.epsg
}

fn projection(from_crs: &Crs, to_crs: &Crs) -> Result<Proj> {
    let from_proj = from_crs.authority_code();
    let to_proj = to_crs.authority_code();
    Proj::new_known_crs(&from_proj, &to_proj, None).map_err(|e| ImpactError::ConfigInvalid {
        key: "crs".to_string(),
        reason: format!("Failed to create projection from {} to {}: {}", from_proj, to_proj, e),
    })
}

fn convert(proj: &Proj, coord: &Coord<f64>) -> Result<Coord<f64>> {
    proj.convert((coord.x, coord.y)).map(|(x, y)| Coord { x, y }).map_err(|e| {
        ImpactError::InvalidGeometry {
            reason: format!("Projection failed for ({}, {}): {}", coord.x, coord.y, e),
        }
    })
}

fn convert_ring(proj: &Proj, ring: &LineString<f64>) -> Result<LineString<f64>> {
    let coords: Result<Vec<_>> = ring.0.iter().map(|c| convert(proj, c)).collect();
    Ok(LineString::from(coords?))
}

/// Reproject a polygon set from one CRS to another
pub fn reproject_multipolygon(
    polygons: &MultiPolygon<f64>,
    from_crs: &Crs,
    to_crs: &Crs,
) -> Result<MultiPolygon<f64>> {
    if crs_match(from_crs, to_crs) {
        return Ok(polygons.clone());
    }

    let proj = projection(from_crs, to_crs)?;
    let reprojected: Result<Vec<_>> = polygons
        .0
        .iter()
        .map(|poly| {
            let exterior = convert_ring(&proj, poly.exterior())?;
            let interiors: Result<Vec<_>> =
                poly.interiors().iter().map(|ring| convert_ring(&proj, ring)).collect();
            Ok(Polygon::new(exterior, interiors?))
        })
        .collect();

    Ok(MultiPolygon::new(reprojected?))
}
