//! Impacted-area calculator
//!
//! Compares a post-event observation with a baseline observation pixel by
//! pixel and flags the pixels whose change crosses the threshold. With a
//! required run length, a pixel is flagged only when the change holds for
//! that many consecutive post-event observations.

use ndarray::{Array2, ArrayView2, Zip};

use crate::error::{ImpactError, Result};
use crate::models::{ImpactParams, ImpactResult, IndexTimeSeries, ThresholdComparison};
use crate::processing::dates::{post_event_positions, select_observation_pair};

/// Compute the impact of the event described by `params` on `series`
pub fn compute_impact(series: &IndexTimeSeries, params: &ImpactParams) -> Result<ImpactResult> {
    params.validate()?;
    if series.is_empty() {
        return Err(ImpactError::insufficient("time series has no observation"));
    }

    let pair = select_observation_pair(series, params)?;
    let baseline_date = series.dates()[pair.baseline];
    let post_event_date = series.dates()[pair.post_event];
    let baseline = series.slice(pair.baseline);

    let difference = pixel_difference(series.slice(pair.post_event), baseline);
    if difference.iter().all(|v| v.is_nan()) {
        return Err(ImpactError::insufficient(format!(
            "no pixel has data on both {} and {}",
            baseline_date, post_event_date
        )));
    }

    let comparison = params.comparison.resolve(params.threshold);
    let mask = match params.run_length() {
        None => difference.mapv(|d| comparison.is_impacted(d, params.threshold)),
        Some(n) => {
            let positions = post_event_positions(series, params);
            run_length_mask(series, baseline, &positions, n, comparison, params.threshold)?
        }
    };
    // A run may start after a cloudy first post-event observation
    let valid_pixel_count = Zip::from(&difference)
        .and(&mask)
        .fold(0usize, |count, d, m| if *m || !d.is_nan() { count + 1 } else { count });
    let impacted_pixel_count = mask.iter().filter(|m| **m).count();

    tracing::info!(
        index = %series.index(),
        %baseline_date,
        %post_event_date,
        threshold = params.threshold,
        comparison = %comparison,
        valid_pixel_count,
        impacted_pixel_count,
        "Impact computed"
    );

    Ok(ImpactResult {
        index: series.index(),
        difference,
        mask,
        threshold: params.threshold,
        comparison,
        event_date: params.event_date,
        baseline_date,
        post_event_date,
        min_duration: params.run_length(),
        valid_pixel_count,
        impacted_pixel_count,
        grid: series.grid().copied(),
    })
}

/// `post - baseline`; NaN wherever either side is NaN
pub fn pixel_difference(post: ArrayView2<'_, f64>, baseline: ArrayView2<'_, f64>) -> Array2<f64> {
    Zip::from(post).and(baseline).map_collect(|&p, &b| {
        if p.is_nan() || b.is_nan() {
            f64::NAN
        } else {
            p - b
        }
    })
}

fn run_length_mask(
    series: &IndexTimeSeries,
    baseline: ArrayView2<'_, f64>,
    positions: &[usize],
    run_length: u32,
    comparison: ThresholdComparison,
    threshold: f64,
) -> Result<Array2<bool>> {
    let run_length = run_length as usize;
    if positions.len() < run_length {
        return Err(ImpactError::insufficient(format!(
            "{} post-event observations, run length {} required",
            positions.len(),
            run_length
        )));
    }

    let slices: Vec<ArrayView2<'_, f64>> = positions.iter().map(|&t| series.slice(t)).collect();
    let mut mask = Array2::from_elem(baseline.dim(), false);

    for ((row, col), flagged) in mask.indexed_iter_mut() {
        let base = baseline[[row, col]];
        if base.is_nan() {
            continue;
        }
        let mut run = 0usize;
        for slice in &slices {
            // NaN breaks a run
            if comparison.is_impacted(slice[[row, col]] - base, threshold) {
                run += 1;
                if run >= run_length {
                    *flagged = true;
                    break;
                }
            } else {
                run = 0;
            }
        }
    }

    Ok(mask)
}
