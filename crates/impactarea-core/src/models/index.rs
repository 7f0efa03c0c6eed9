use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ImpactError;

/// Vegetation indices available on the imagery platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VegetationIndex {
    /// Normalized Difference Vegetation Index
    NDVI,
    /// Enhanced Vegetation Index
    EVI,
    /// Green Normalized Difference Vegetation Index
    GNDVI,
    /// Normalized Difference Water Index
    NDWI,
    /// Chlorophyll Vegetation Index
    CVI,
    /// Normalized Chlorophyll Vegetation Index
    CVIn,
    /// Leaf Area Index
    LAI,
}

impl VegetationIndex {
    pub const ALL: [VegetationIndex; 7] = [
        VegetationIndex::NDVI,
        VegetationIndex::EVI,
        VegetationIndex::GNDVI,
        VegetationIndex::NDWI,
        VegetationIndex::CVI,
        VegetationIndex::CVIn,
        VegetationIndex::LAI,
    ];

    /// Code used on the wire (e.g. `NDVI`)
    pub fn code(&self) -> &'static str {
        match self {
            VegetationIndex::NDVI => "NDVI",
            VegetationIndex::EVI => "EVI",
            VegetationIndex::GNDVI => "GNDVI",
            VegetationIndex::NDWI => "NDWI",
            VegetationIndex::CVI => "CVI",
            VegetationIndex::CVIn => "CVIn",
            VegetationIndex::LAI => "LAI",
        }
    }

    /// Indicator name expected by the imagery platform (e.g. `ndvi`)
    pub fn indicator(&self) -> &'static str {
        match self {
            VegetationIndex::NDVI => "ndvi",
            VegetationIndex::EVI => "evi",
            VegetationIndex::GNDVI => "gndvi",
            VegetationIndex::NDWI => "ndwi",
            VegetationIndex::CVI => "cvi",
            VegetationIndex::CVIn => "cvin",
            VegetationIndex::LAI => "lai",
        }
    }

    /// Spectral bands needed to compute the index locally
    pub fn required_bands(&self) -> &'static [&'static str] {
        match self {
            VegetationIndex::NDVI => &["red", "nir"],
            VegetationIndex::GNDVI => &["green", "nir"],
            VegetationIndex::NDWI => &["green", "nir"],
            VegetationIndex::EVI => &["blue", "red", "nir"],
            VegetationIndex::CVI => &["green", "red", "nir"],
            VegetationIndex::CVIn | VegetationIndex::LAI => &[],
        }
    }
}

impl fmt::Display for VegetationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for VegetationIndex {
    type Err = ImpactError;

    /// Matches the member name exactly (`CVIn`, not `CVIN`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VegetationIndex::ALL
            .iter()
            .copied()
            .find(|index| index.code() == s.trim())
            .ok_or_else(|| ImpactError::UnknownIndex { name: s.to_string() })
    }
}
