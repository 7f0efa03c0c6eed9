//! Layout of an impact result inside a Zarr v2 group

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::{
    GridGeometry, ImpactResult, ImpactSummary, ThresholdComparison, VegetationIndex,
};
use ndarray::{Array1, ArrayD, Ix2};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::array::{decode_array, encode_array, ArrayMetadata, Element, ZARR_FORMAT};

pub const DIFFERENCE: &str = "difference";
pub const IMPACTED: &str = "impacted";
pub const X: &str = "x";
pub const Y: &str = "y";

pub const GROUP_FILE: &str = ".zgroup";
pub const ATTRS_FILE: &str = ".zattrs";
pub const ARRAY_FILE: &str = ".zarray";

/// Impact result read back from a store
#[derive(Debug, Clone)]
pub struct StoredImpact {
    pub result: ImpactResult,
    pub summary: ImpactSummary,
    pub entity_id: Option<String>,
}

/// Group-level `.zattrs`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GroupAttributes {
    index: VegetationIndex,
    threshold: f64,
    comparison: ThresholdComparison,
    event_date: NaiveDate,
    baseline_date: NaiveDate,
    post_event_date: NaiveDate,
    min_duration: Option<u32>,
    valid_pixel_count: usize,
    impacted_pixel_count: usize,
    entity_id: Option<String>,
    area_m2: f64,
    impacted_percentage: f64,
    impacted_area_m2: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    grid: Option<GridGeometry>,
}

/// Every object of the store, keyed relative to its root
pub fn encode_impact(
    result: &ImpactResult,
    summary: &ImpactSummary,
    entity_id: Option<&str>,
    chunk_size: usize,
) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut objects = BTreeMap::new();
    objects.insert(GROUP_FILE.to_string(), to_json(&json!({ "zarr_format": ZARR_FORMAT }))?);

    let attributes = GroupAttributes {
        index: result.index,
        threshold: result.threshold,
        comparison: result.comparison,
        event_date: result.event_date,
        baseline_date: result.baseline_date,
        post_event_date: result.post_event_date,
        min_duration: result.min_duration,
        valid_pixel_count: result.valid_pixel_count,
        impacted_pixel_count: result.impacted_pixel_count,
        entity_id: entity_id.map(str::to_string),
        area_m2: summary.area_m2,
        impacted_percentage: summary.impacted_percentage,
        impacted_area_m2: summary.impacted_area_m2,
        grid: result.grid,
    };
    objects.insert(ATTRS_FILE.to_string(), to_json(&attributes)?);

    let dims = [Y, X];
    put_array(&mut objects, DIFFERENCE, &result.difference.clone().into_dyn(), &dims, chunk_size)?;
    put_array(&mut objects, IMPACTED, &result.mask.clone().into_dyn(), &dims, chunk_size)?;

    if let Some(grid) = &result.grid {
        let (rows, cols) = result.shape();
        let x = Array1::from(grid.x_coords(cols)).into_dyn();
        let y = Array1::from(grid.y_coords(rows)).into_dyn();
        put_array(&mut objects, X, &x, &[X], chunk_size.max(cols))?;
        put_array(&mut objects, Y, &y, &[Y], chunk_size.max(rows))?;
    }

    Ok(objects)
}

fn put_array<T: Element>(
    objects: &mut BTreeMap<String, Vec<u8>>,
    name: &str,
    values: &ArrayD<T>,
    dims: &[&str],
    chunk_size: usize,
) -> Result<()> {
    let encoded = encode_array(values, chunk_size)?;
    objects.insert(format!("{}/{}", name, ARRAY_FILE), to_json(&encoded.metadata)?);
    objects.insert(
        format!("{}/{}", name, ATTRS_FILE),
        to_json(&json!({ "_ARRAY_DIMENSIONS": dims }))?,
    );
    for (key, bytes) in encoded.chunks {
        objects.insert(format!("{}/{}", name, key), bytes);
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(value)?)
}

/// Objects needed before the chunk keys are known
pub fn metadata_keys() -> Vec<String> {
    vec![
        ATTRS_FILE.to_string(),
        format!("{}/{}", DIFFERENCE, ARRAY_FILE),
        format!("{}/{}", IMPACTED, ARRAY_FILE),
    ]
}

/// Chunk keys of the two data arrays, given their `.zarray` documents
pub fn chunk_keys(objects: &HashMap<String, Vec<u8>>) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    for name in [DIFFERENCE, IMPACTED] {
        let metadata = array_metadata(objects, name)?;
        keys.extend(metadata.chunk_keys().into_iter().map(|k| format!("{}/{}", name, k)));
    }
    Ok(keys)
}

fn array_metadata(objects: &HashMap<String, Vec<u8>>, name: &str) -> Result<ArrayMetadata> {
    let key = format!("{}/{}", name, ARRAY_FILE);
    let bytes = objects
        .get(&key)
        .ok_or_else(|| ImpactError::Serialization(format!("store has no {}", key)))?;
    Ok(serde_json::from_slice(bytes)?)
}

fn array_chunks(objects: &HashMap<String, Vec<u8>>, name: &str) -> HashMap<String, Vec<u8>> {
    let prefix = format!("{}/", name);
    objects
        .iter()
        .filter_map(|(k, v)| {
            let key = k.strip_prefix(&prefix)?;
            (!key.starts_with('.')).then(|| (key.to_string(), v.clone()))
        })
        .collect()
}

fn read_2d<T: Element>(objects: &HashMap<String, Vec<u8>>, name: &str) -> Result<ndarray::Array2<T>> {
    let metadata = array_metadata(objects, name)?;
    let values: ArrayD<T> = decode_array(&metadata, &array_chunks(objects, name))?;
    values
        .into_dimensionality::<Ix2>()
        .map_err(|e| ImpactError::Serialization(format!("{} is not 2-D: {}", name, e)))
}

/// Rebuild the impact result from the store objects
pub fn decode_impact(objects: &HashMap<String, Vec<u8>>) -> Result<StoredImpact> {
    let attrs_bytes = objects
        .get(ATTRS_FILE)
        .ok_or_else(|| ImpactError::Serialization(format!("store has no {}", ATTRS_FILE)))?;
    let attributes: GroupAttributes = serde_json::from_slice(attrs_bytes)?;

    let difference = read_2d::<f64>(objects, DIFFERENCE)?;
    let mask = read_2d::<bool>(objects, IMPACTED)?;
    if difference.dim() != mask.dim() {
        let ((er, ec), (ar, ac)) = (difference.dim(), mask.dim());
        return Err(ImpactError::ShapeMismatch { expected: vec![er, ec], actual: vec![ar, ac] });
    }

    let result = ImpactResult {
        index: attributes.index,
        difference,
        mask,
        threshold: attributes.threshold,
        comparison: attributes.comparison,
        event_date: attributes.event_date,
        baseline_date: attributes.baseline_date,
        post_event_date: attributes.post_event_date,
        min_duration: attributes.min_duration,
        valid_pixel_count: attributes.valid_pixel_count,
        impacted_pixel_count: attributes.impacted_pixel_count,
        grid: attributes.grid,
    };
    let summary = ImpactSummary {
        area_m2: attributes.area_m2,
        impacted_percentage: attributes.impacted_percentage,
        impacted_area_m2: attributes.impacted_area_m2,
    };

    Ok(StoredImpact { result, summary, entity_id: attributes.entity_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn result() -> ImpactResult {
        let difference =
            Array2::from_shape_vec((2, 3), vec![-0.2, 0.1, f64::NAN, -0.3, 0.0, -0.15]).unwrap();
        let mask = difference.mapv(|d| d <= -0.15);
        ImpactResult {
            index: VegetationIndex::NDVI,
            difference,
            mask,
            threshold: -0.15,
            comparison: ThresholdComparison::Below,
            event_date: NaiveDate::from_ymd_opt(2023, 5, 15).unwrap(),
            baseline_date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            post_event_date: NaiveDate::from_ymd_opt(2023, 5, 20).unwrap(),
            min_duration: None,
            valid_pixel_count: 5,
            impacted_pixel_count: 3,
            grid: Some(GridGeometry {
                origin_x: 10.0,
                origin_y: 50.0,
                pixel_width: 0.5,
                pixel_height: -0.5,
                epsg: 4326,
            }),
        }
    }

    #[test]
    fn test_layout() {
        let objects = encode_impact(&result(), &ImpactSummary::new(1000.0, 60.0), Some("e1"), 2).unwrap();
        for key in [".zgroup", ".zattrs", "difference/.zarray", "difference/.zattrs", "difference/0.0", "difference/0.1", "impacted/.zarray", "x/0", "y/.zattrs"] {
            assert!(objects.contains_key(key), "missing {}", key);
        }

        let dims: serde_json::Value = serde_json::from_slice(&objects["impacted/.zattrs"]).unwrap();
        assert_eq!(dims["_ARRAY_DIMENSIONS"], json!(["y", "x"]));

        let attrs: serde_json::Value = serde_json::from_slice(&objects[".zattrs"]).unwrap();
        assert_eq!(attrs["threshold"], -0.15);
        assert_eq!(attrs["comparison"], "below");
        assert_eq!(attrs["entity_id"], "e1");
        assert_eq!(attrs["baseline_date"], "2023-05-01");
    }

    #[test]
    fn test_round_trip() {
        let original = result();
        let objects: HashMap<_, _> = encode_impact(&original, &ImpactSummary::new(1000.0, 60.0), None, 2)
            .unwrap()
            .into_iter()
            .collect();
        let stored = decode_impact(&objects).unwrap();

        assert_eq!(stored.result.mask, original.mask);
        for (a, b) in stored.result.difference.iter().zip(original.difference.iter()) {
            assert!(a.to_bits() == b.to_bits());
        }
        assert_eq!(stored.result.threshold, -0.15);
        assert_eq!(stored.result.post_event_date, original.post_event_date);
        assert_eq!(stored.result.grid, original.grid);
        assert_eq!(stored.summary.impacted_area_m2, 600.0);
        assert!(stored.entity_id.is_none());
    }

    #[test]
    fn test_chunk_keys_from_metadata() {
        let objects: HashMap<_, _> = encode_impact(&result(), &ImpactSummary::new(1.0, 0.0), None, 2)
            .unwrap()
            .into_iter()
            .collect();
        let keys = chunk_keys(&objects).unwrap();
        assert_eq!(keys.len(), 4);
        assert!(keys.contains(&"impacted/0.1".to_string()));
    }
}
