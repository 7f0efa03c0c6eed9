//! Vegetation indices from spectral bands
//!
//! Bands are reflectance rasters keyed by name (`red`, `nir`, `green`, `blue`).
//! NaN in any input band, or a zero denominator, gives NaN.

use std::collections::HashMap;

use ndarray::{Array2, Zip};

use crate::error::{ImpactError, Result};
use crate::models::VegetationIndex;

/// Named reflectance bands of one acquisition
#[derive(Debug, Clone, Default)]
pub struct SpectralBands {
    bands: HashMap<String, Array2<f64>>,
}

impl SpectralBands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a band; every band must share the shape of the first one
    pub fn insert(&mut self, name: impl Into<String>, band: Array2<f64>) -> Result<()> {
        if let Some(existing) = self.bands.values().next() {
            if existing.dim() != band.dim() {
                let ((er, ec), (ar, ac)) = (existing.dim(), band.dim());
                return Err(ImpactError::ShapeMismatch {
                    expected: vec![er, ec],
                    actual: vec![ar, ac],
                });
            }
        }
        self.bands.insert(name.into().to_lowercase(), band);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Array2<f64>> {
        self.bands.get(name).ok_or_else(|| {
            ImpactError::invalid_input("bands", format!("band '{}' is required", name))
        })
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// Compute `index` from the bands it needs
pub fn compute_index(index: VegetationIndex, bands: &SpectralBands) -> Result<Array2<f64>> {
    match index {
        VegetationIndex::NDVI => Ok(normalized_difference(bands.get("nir")?, bands.get("red")?)),
        VegetationIndex::GNDVI => {
            Ok(normalized_difference(bands.get("nir")?, bands.get("green")?))
        }
        VegetationIndex::NDWI => {
            Ok(normalized_difference(bands.get("green")?, bands.get("nir")?))
        }
        VegetationIndex::EVI => Ok(evi(bands.get("nir")?, bands.get("red")?, bands.get("blue")?)),
        VegetationIndex::CVI => Ok(cvi(bands.get("nir")?, bands.get("red")?, bands.get("green")?)),
        VegetationIndex::CVIn | VegetationIndex::LAI => Err(ImpactError::UnsupportedIndex {
            index: index.code().to_string(),
        }),
    }
}

/// `(a - b) / (a + b)`
pub fn normalized_difference(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    Zip::from(a).and(b).map_collect(|&a, &b| safe_ratio(a - b, a + b))
}

/// `EVI = 2.5 * (NIR - Red) / (NIR + 6 Red - 7.5 Blue + 1)`
pub fn evi(nir: &Array2<f64>, red: &Array2<f64>, blue: &Array2<f64>) -> Array2<f64> {
    Zip::from(nir)
        .and(red)
        .and(blue)
        .map_collect(|&n, &r, &b| 2.5 * safe_ratio(n - r, n + 6.0 * r - 7.5 * b + 1.0))
}

/// `CVI = NIR * Red / Green²`
pub fn cvi(nir: &Array2<f64>, red: &Array2<f64>, green: &Array2<f64>) -> Array2<f64> {
    Zip::from(nir)
        .and(red)
        .and(green)
        .map_collect(|&n, &r, &g| safe_ratio(n * r, g * g))
}

fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if numerator.is_nan() || denominator.is_nan() || denominator.abs() < 1e-10 {
        f64::NAN
    } else {
        numerator / denominator
    }
}
