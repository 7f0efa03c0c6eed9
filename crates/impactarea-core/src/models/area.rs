//! Area of interest submitted with a request.
//!
//! Accepts WKT or GeoJSON text and keeps both the parsed polygon set and a
//! canonical WKT rendering, which is what the remote platforms expect.

use std::fmt;

use geo::{Geometry as GeoGeometry, MultiPolygon};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use wkt::{ToWkt, TryFromWkt};

use crate::error::{ImpactError, Result};

/// Polygonal area of interest in WGS 84 (EPSG:4326)
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    polygons: MultiPolygon<f64>,
    wkt: String,
}

impl AreaOfInterest {
    /// Parse a WKT or GeoJSON polygon
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ImpactError::InvalidGeometry {
                reason: "empty geometry".to_string(),
            });
        }

        let geometry = if trimmed.starts_with('{') {
            parse_geojson(trimmed)?
        } else {
            GeoGeometry::<f64>::try_from_wkt_str(trimmed).map_err(|e| {
                ImpactError::InvalidGeometry {
                    reason: format!("Geometry is not a valid WKT or GeoJSON: {}", e),
                }
            })?
        };

        Self::from_geometry(geometry)
    }

    /// Build from an already parsed geometry
    pub fn from_geometry(geometry: GeoGeometry<f64>) -> Result<Self> {
        let polygons = match geometry {
            GeoGeometry::Polygon(p) => MultiPolygon::new(vec![p]),
            GeoGeometry::MultiPolygon(mp) => mp,
            GeoGeometry::Rect(r) => MultiPolygon::new(vec![r.to_polygon()]),
            other => {
                return Err(ImpactError::InvalidGeometry {
                    reason: format!("expected a polygon, found {}", geometry_kind(&other)),
                })
            }
        };

        if polygons.0.is_empty() {
            return Err(ImpactError::InvalidGeometry {
                reason: "multipolygon has no members".to_string(),
            });
        }

        let wkt = polygons.wkt_string();
        Ok(Self { polygons, wkt })
    }

    pub fn polygons(&self) -> &MultiPolygon<f64> {
        &self.polygons
    }

    /// Canonical WKT text
    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    /// GeoJSON geometry value
    pub fn to_geojson(&self) -> geojson::Geometry {
        geojson::Geometry::new(geojson::Value::from(&self.polygons))
    }
}

impl fmt::Display for AreaOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wkt)
    }
}

impl Serialize for AreaOfInterest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.wkt)
    }
}

impl<'de> Deserialize<'de> for AreaOfInterest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        AreaOfInterest::parse(&text).map_err(serde::de::Error::custom)
    }
}

fn parse_geojson(text: &str) -> Result<GeoGeometry<f64>> {
    let parsed: geojson::GeoJson = text.parse().map_err(|e| ImpactError::InvalidGeometry {
        reason: format!("Geometry is not a valid WKT or GeoJSON: {}", e),
    })?;

    let geometries: Vec<geojson::Geometry> = match parsed {
        geojson::GeoJson::Geometry(g) => vec![g],
        geojson::GeoJson::Feature(f) => f.geometry.into_iter().collect(),
        geojson::GeoJson::FeatureCollection(fc) => {
            fc.features.into_iter().filter_map(|f| f.geometry).collect()
        }
    };

    let mut polygons = Vec::new();
    for geometry in geometries {
        let converted = GeoGeometry::<f64>::try_from(geometry).map_err(|e| {
            ImpactError::InvalidGeometry {
                reason: format!("Unsupported GeoJSON geometry: {}", e),
            }
        })?;
        match converted {
            GeoGeometry::Polygon(p) => polygons.push(p),
            GeoGeometry::MultiPolygon(mp) => polygons.extend(mp.0),
            other => {
                return Err(ImpactError::InvalidGeometry {
                    reason: format!("expected a polygon, found {}", geometry_kind(&other)),
                })
            }
        }
    }

    match polygons.len() {
        0 => Err(ImpactError::InvalidGeometry {
            reason: "GeoJSON contains no geometry".to_string(),
        }),
        1 => Ok(GeoGeometry::Polygon(polygons.remove(0))),
        _ => Ok(GeoGeometry::MultiPolygon(MultiPolygon::new(polygons))),
    }
}

fn geometry_kind(geometry: &GeoGeometry<f64>) -> &'static str {
    match geometry {
        GeoGeometry::Point(_) => "Point",
        GeoGeometry::Line(_) => "Line",
        GeoGeometry::LineString(_) => "LineString",
        GeoGeometry::Polygon(_) => "Polygon",
        GeoGeometry::MultiPoint(_) => "MultiPoint",
        GeoGeometry::MultiLineString(_) => "MultiLineString",
        GeoGeometry::MultiPolygon(_) => "MultiPolygon",
        GeoGeometry::GeometryCollection(_) => "GeometryCollection",
        GeoGeometry::Rect(_) => "Rect",
        GeoGeometry::Triangle(_) => "Triangle",
    }
}
