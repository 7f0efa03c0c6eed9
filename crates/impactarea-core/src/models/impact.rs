use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{ImpactError, Result};
use crate::models::{GridGeometry, VegetationIndex};

/// How a per-pixel difference is compared with the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdComparison {
    /// `<=` for negative thresholds, `>=` otherwise
    #[default]
    Auto,
    Below,
    Above,
}

impl ThresholdComparison {
    /// Comparison actually applied for `threshold`
    pub fn resolve(self, threshold: f64) -> ThresholdComparison {
        match self {
            ThresholdComparison::Auto if threshold < 0.0 => ThresholdComparison::Below,
            ThresholdComparison::Auto => ThresholdComparison::Above,
            other => other,
        }
    }

    /// NaN values are never impacted
    pub fn is_impacted(self, value: f64, threshold: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        match self.resolve(threshold) {
            ThresholdComparison::Below => value <= threshold,
            _ => value >= threshold,
        }
    }
}

impl fmt::Display for ThresholdComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdComparison::Auto => write!(f, "auto"),
            ThresholdComparison::Below => write!(f, "below"),
            ThresholdComparison::Above => write!(f, "above"),
        }
    }
}

impl FromStr for ThresholdComparison {
    type Err = ImpactError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(ThresholdComparison::Auto),
            "below" => Ok(ThresholdComparison::Below),
            "above" => Ok(ThresholdComparison::Above),
            other => Err(ImpactError::invalid_input(
                "comparison",
                format!("'{}' is not one of auto, below, above", other),
            )),
        }
    }
}

/// Which pre-event observation is the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum BaselineRule {
    /// Latest observation strictly before the event
    #[default]
    Nearest,
    /// Latest observation at least `days` before the post-event observation,
    /// falling back to `Nearest`
    MinimumGap { days: u32 },
    /// This exact observation
    Fixed { date: NaiveDate },
}

/// Parameters of one impact computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactParams {
    pub event_date: NaiveDate,
    pub threshold: f64,
    #[serde(default)]
    pub comparison: ThresholdComparison,
    #[serde(default)]
    pub min_duration: Option<u32>,
    #[serde(default)]
    pub baseline: BaselineRule,
    #[serde(default)]
    pub tolerance_days: Option<u32>,
    #[serde(default)]
    pub max_cloud_cover_percentage: Option<f64>,
}

impl ImpactParams {
    pub fn new(event_date: NaiveDate, threshold: f64) -> Self {
        Self {
            event_date,
            threshold,
            comparison: ThresholdComparison::Auto,
            min_duration: None,
            baseline: BaselineRule::Nearest,
            tolerance_days: None,
            max_cloud_cover_percentage: None,
        }
    }

    pub fn with_comparison(mut self, comparison: ThresholdComparison) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn with_min_duration(mut self, min_duration: Option<u32>) -> Self {
        self.min_duration = min_duration;
        self
    }

    pub fn with_baseline(mut self, baseline: BaselineRule) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_tolerance_days(mut self, tolerance_days: Option<u32>) -> Self {
        self.tolerance_days = tolerance_days;
        self
    }

    pub fn with_max_cloud_cover(mut self, percentage: Option<f64>) -> Self {
        self.max_cloud_cover_percentage = percentage;
        self
    }

    /// Required run length, `None` in single-pair mode
    pub fn run_length(&self) -> Option<u32> {
        self.min_duration.filter(|n| *n > 0)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(ImpactError::invalid_input("threshold", "must be a finite number"));
        }
        if let Some(pct) = self.max_cloud_cover_percentage {
            if !(0.0..=100.0).contains(&pct) {
                return Err(ImpactError::invalid_input(
                    "max_cloud_cover_percentage",
                    format!("{} is not within 0..=100", pct),
                ));
            }
        }
        if let BaselineRule::Fixed { date } = self.baseline {
            if date >= self.event_date {
                return Err(ImpactError::invalid_input(
                    "baseline",
                    format!("fixed baseline {} does not precede event {}", date, self.event_date),
                ));
            }
        }
        Ok(())
    }
}

/// Per-pixel outcome of an impact computation
#[derive(Debug, Clone)]
pub struct ImpactResult {
    pub index: VegetationIndex,
    /// post - baseline, NaN where either is missing
    pub difference: Array2<f64>,
    pub mask: Array2<bool>,
    pub threshold: f64,
    /// Resolved comparison (never `Auto`)
    pub comparison: ThresholdComparison,
    pub event_date: NaiveDate,
    pub baseline_date: NaiveDate,
    pub post_event_date: NaiveDate,
    pub min_duration: Option<u32>,
    pub valid_pixel_count: usize,
    pub impacted_pixel_count: usize,
    pub grid: Option<GridGeometry>,
}

impl ImpactResult {
    /// Share of valid pixels that are impacted, in percent
    pub fn impacted_percentage(&self) -> f64 {
        if self.valid_pixel_count == 0 {
            return 0.0;
        }
        self.impacted_pixel_count as f64 / self.valid_pixel_count as f64 * 100.0
    }

    pub fn shape(&self) -> (usize, usize) {
        self.difference.dim()
    }
}

/// Area figures derived from an impact result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub area_m2: f64,
    pub impacted_percentage: f64,
    pub impacted_area_m2: f64,
}

impl ImpactSummary {
    pub fn new(area_m2: f64, impacted_percentage: f64) -> Self {
        Self {
            area_m2,
            impacted_percentage,
            impacted_area_m2: area_m2 * impacted_percentage / 100.0,
        }
    }

    /// e.g. `12.34 %`
    pub fn formatted_percentage(&self) -> String {
        format!("{:.2} %", self.impacted_percentage)
    }

    /// Right-aligned on 12 characters, e.g. `   12345.679 m²`
    pub fn formatted_area(&self) -> String {
        format!("{:12.3} m²", self.impacted_area_m2)
    }
}
