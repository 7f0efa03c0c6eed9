use geo::{LineString, MultiPolygon, Polygon};
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::AreaOfInterest;

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }

    fn absorb(&mut self, prefix: &str, other: ValidationResult) {
        for error in other.errors {
            self.add_error(format!("{}.{}", prefix, error.location), error.reason);
        }
    }
}

/// Validate a WGS 84 polygon set
pub fn validate_multipolygon(multipolygon: &MultiPolygon<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();
    if multipolygon.0.is_empty() {
        result.add_error("MultiPolygon".to_string(), "No polygon given".to_string());
    }
    for (i, polygon) in multipolygon.0.iter().enumerate() {
        result.absorb(&format!("MultiPolygon[{}]", i), validate_polygon(polygon));
    }
    result
}

fn validate_polygon(polygon: &Polygon<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();
    result.absorb("exterior", validate_ring(polygon.exterior()));
    for (i, interior) in polygon.interiors().iter().enumerate() {
        result.absorb(&format!("interior[{}]", i), validate_ring(interior));
    }
    result
}

fn validate_ring(ring: &LineString<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();

    if ring.0.len() < 4 {
        result.add_error(
            "ring".to_string(),
            format!("Ring must have at least 4 points, found {}", ring.0.len()),
        );
    }

    if let (Some(first), Some(last)) = (ring.0.first(), ring.0.last()) {
        if first != last {
            result.add_error(
                "ring".to_string(),
                "Ring must be closed (first point == last point)".to_string(),
            );
        }
    }

    for (i, coord) in ring.0.iter().enumerate() {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            result.add_error(format!("ring[{}]", i), "Coordinates must be finite".to_string());
        } else if !(-180.0..=180.0).contains(&coord.x) || !(-90.0..=90.0).contains(&coord.y) {
            result.add_error(
                format!("ring[{}]", i),
                format!("({}, {}) is outside longitude/latitude bounds", coord.x, coord.y),
            );
        }
    }

    result
}

/// Fail with `InvalidGeometry` on the first problem found
pub fn ensure_valid_area(area: &AreaOfInterest) -> Result<()> {
    let validation = validate_multipolygon(area.polygons());
    if validation.is_valid {
        return Ok(());
    }
    let reason = validation
        .errors
        .first()
        .map(|e| format!("{}: {}", e.location, e.reason))
        .unwrap_or_else(|| "Invalid geometry".to_string());
    Err(ImpactError::InvalidGeometry { reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_square() {
        let area = AreaOfInterest::parse("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))").unwrap();
        assert!(ensure_valid_area(&area).is_ok());
    }

    #[test]
    fn test_projected_coordinates_rejected() {
        let area =
            AreaOfInterest::parse("POLYGON((500000 0, 500100 0, 500100 100, 500000 0))").unwrap();
        let err = ensure_valid_area(&area).unwrap_err();
        assert!(err.to_string().contains("longitude/latitude"));
    }

    #[test]
    fn test_degenerate_ring_rejected() {
        let area = AreaOfInterest::parse("POLYGON((0 0, 1 0, 0 0))").unwrap();
        let result = validate_multipolygon(area.polygons());
        assert!(!result.is_valid);
        assert!(result.errors[0].location.starts_with("MultiPolygon[0].exterior"));
    }
}
