//! Choosing the baseline and post-event observations

use chrono::{Duration, NaiveDate};

use crate::error::{ImpactError, Result};
use crate::models::{BaselineRule, ImpactParams, IndexTimeSeries};

/// Dates picked from a catalog listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearestDates {
    pub before: NaiveDate,
    pub after: NaiveDate,
}

/// Pick the acquisitions to request around `event`.
///
/// `after` is the earliest date strictly after the event. `before` is the
/// latest date before the event lying at least `min_gap_days` before `after`,
/// or the latest date before the event when none does.
pub fn find_nearest_dates(
    event: NaiveDate,
    min_gap_days: u32,
    dates: &[NaiveDate],
) -> Result<NearestDates> {
    let after = dates.iter().copied().filter(|d| *d > event).min().ok_or_else(|| {
        ImpactError::insufficient(format!("no image acquired after event date {}", event))
    })?;

    let before_event = || dates.iter().copied().filter(|d| *d < event);
    let before = before_event()
        .filter(|d| (after - *d).num_days() >= i64::from(min_gap_days))
        .max()
        .or_else(|| before_event().max())
        .ok_or_else(|| {
            ImpactError::insufficient(format!("no image acquired before event date {}", event))
        })?;

    tracing::debug!(%before, %after, min_gap_days, "Nearest acquisitions selected");
    Ok(NearestDates { before, after })
}

/// Positions of the two slices compared by the calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationPair {
    pub baseline: usize,
    pub post_event: usize,
}

/// Select baseline and post-event positions in `series` according to `params`
pub fn select_observation_pair(
    series: &IndexTimeSeries,
    params: &ImpactParams,
) -> Result<ObservationPair> {
    let event = params.event_date;

    let post_event = post_event_positions(series, params)
        .first()
        .copied()
        .ok_or_else(|| {
            ImpactError::insufficient(format!(
                "no usable observation on or after event date {}",
                event
            ))
        })?;
    let post_date = series.dates()[post_event];

    let baseline = match params.baseline {
        BaselineRule::Nearest => baseline_positions(series, params).last().copied(),
        BaselineRule::MinimumGap { days } => {
            let candidates = baseline_positions(series, params);
            candidates
                .iter()
                .rev()
                .copied()
                .find(|&i| (post_date - series.dates()[i]).num_days() >= i64::from(days))
                .or_else(|| candidates.last().copied())
        }
        BaselineRule::Fixed { date } => series
            .position(date)
            .filter(|i| baseline_positions(series, params).contains(i)),
    }
    .ok_or_else(|| {
        ImpactError::insufficient(format!("no usable observation before event date {}", event))
    })?;

    Ok(ObservationPair { baseline, post_event })
}

/// Usable positions at or after the event, ascending
pub fn post_event_positions(series: &IndexTimeSeries, params: &ImpactParams) -> Vec<usize> {
    let event = params.event_date;
    let latest = params.tolerance_days.map(|t| event + Duration::days(i64::from(t)));

    series
        .dates()
        .iter()
        .enumerate()
        .filter(|(_, d)| **d >= event && latest.map_or(true, |l| **d <= l))
        .map(|(i, _)| i)
        .filter(|&i| is_clear_enough(series, params, i))
        .collect()
}

/// Usable positions strictly before the event, ascending
fn baseline_positions(series: &IndexTimeSeries, params: &ImpactParams) -> Vec<usize> {
    let event = params.event_date;
    let earliest = params.tolerance_days.map(|t| event - Duration::days(i64::from(t)));

    series
        .dates()
        .iter()
        .enumerate()
        .filter(|(_, d)| **d < event && earliest.map_or(true, |e| **d >= e))
        .map(|(i, _)| i)
        .filter(|&i| is_clear_enough(series, params, i))
        .collect()
}

fn is_clear_enough(series: &IndexTimeSeries, params: &ImpactParams, position: usize) -> bool {
    match (params.max_cloud_cover_percentage, series.clear_fraction(position)) {
        (Some(max), Some(clear)) => clear >= 1.0 - max / 100.0,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Observation, VegetationIndex};
    use ndarray::array;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series(points: &[(NaiveDate, Option<f64>)]) -> IndexTimeSeries {
        let observations = points
            .iter()
            .map(|(d, clear)| Observation {
                date: *d,
                values: array![[0.5]],
                clear_fraction: *clear,
            })
            .collect();
        IndexTimeSeries::from_observations(VegetationIndex::NDVI, observations).unwrap()
    }

    #[test]
    fn test_find_nearest_honours_gap() {
        let dates = [date(2024, 4, 1), date(2024, 4, 25), date(2024, 5, 10), date(2024, 5, 20)];
        let found = find_nearest_dates(date(2024, 5, 1), 20, &dates).unwrap();
        assert_eq!(found.after, date(2024, 5, 10));
        assert_eq!(found.before, date(2024, 4, 1));
    }

    #[test]
    fn test_find_nearest_falls_back_to_nearest() {
        let dates = [date(2024, 4, 28), date(2024, 5, 2)];
        let found = find_nearest_dates(date(2024, 5, 1), 30, &dates).unwrap();
        assert_eq!(found.before, date(2024, 4, 28));
        assert_eq!(found.after, date(2024, 5, 2));
    }

    #[test]
    fn test_find_nearest_requires_both_sides() {
        let dates = [date(2024, 5, 2)];
        assert!(matches!(
            find_nearest_dates(date(2024, 5, 1), 0, &dates),
            Err(ImpactError::InsufficientData { .. })
        ));
        // The event date itself counts on neither side
        let dates = [date(2024, 4, 1), date(2024, 5, 1)];
        assert!(find_nearest_dates(date(2024, 5, 1), 0, &dates).is_err());
    }

    #[test]
    fn test_pair_nearest_and_event_day_is_post() {
        let s = series(&[
            (date(2024, 4, 1), None),
            (date(2024, 4, 20), None),
            (date(2024, 5, 1), None),
            (date(2024, 5, 9), None),
        ]);
        let pair = select_observation_pair(&s, &ImpactParams::new(date(2024, 5, 1), -0.1)).unwrap();
        assert_eq!(pair, ObservationPair { baseline: 1, post_event: 2 });
    }

    #[test]
    fn test_pair_skips_cloudy_observations() {
        let s = series(&[
            (date(2024, 4, 1), Some(0.95)),
            (date(2024, 4, 20), Some(0.3)),
            (date(2024, 5, 3), Some(0.5)),
            (date(2024, 5, 9), Some(1.0)),
        ]);
        let params = ImpactParams::new(date(2024, 5, 1), -0.1).with_max_cloud_cover(Some(20.0));
        let pair = select_observation_pair(&s, &params).unwrap();
        assert_eq!(pair, ObservationPair { baseline: 0, post_event: 3 });
    }

    #[test]
    fn test_pair_tolerance_rejects_old_baseline() {
        let s = series(&[(date(2024, 1, 1), None), (date(2024, 5, 3), None)]);
        let params = ImpactParams::new(date(2024, 5, 1), -0.1).with_tolerance_days(Some(30));
        assert!(matches!(
            select_observation_pair(&s, &params),
            Err(ImpactError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_pair_minimum_gap_and_fixed() {
        let s = series(&[
            (date(2024, 3, 1), None),
            (date(2024, 4, 25), None),
            (date(2024, 5, 5), None),
        ]);
        let gap = ImpactParams::new(date(2024, 5, 1), -0.1)
            .with_baseline(BaselineRule::MinimumGap { days: 15 });
        assert_eq!(select_observation_pair(&s, &gap).unwrap().baseline, 0);

        let fixed = ImpactParams::new(date(2024, 5, 1), -0.1)
            .with_baseline(BaselineRule::Fixed { date: date(2024, 4, 25) });
        assert_eq!(select_observation_pair(&s, &fixed).unwrap().baseline, 1);

        let missing = ImpactParams::new(date(2024, 5, 1), -0.1)
            .with_baseline(BaselineRule::Fixed { date: date(2024, 4, 24) });
        assert!(select_observation_pair(&s, &missing).is_err());
    }

    #[test]
    fn test_fixed_baseline_honours_filters() {
        let s = series(&[
            (date(2024, 3, 1), Some(0.95)),
            (date(2024, 4, 25), Some(0.2)),
            (date(2024, 5, 5), Some(0.9)),
        ]);
        let cloudy = ImpactParams::new(date(2024, 5, 1), -0.1)
            .with_baseline(BaselineRule::Fixed { date: date(2024, 4, 25) })
            .with_max_cloud_cover(Some(20.0));
        assert!(matches!(
            select_observation_pair(&s, &cloudy),
            Err(ImpactError::InsufficientData { .. })
        ));

        let too_old = ImpactParams::new(date(2024, 5, 1), -0.1)
            .with_baseline(BaselineRule::Fixed { date: date(2024, 3, 1) })
            .with_tolerance_days(Some(30));
        assert!(select_observation_pair(&s, &too_old).is_err());

        let within = ImpactParams::new(date(2024, 5, 1), -0.1)
            .with_baseline(BaselineRule::Fixed { date: date(2024, 3, 1) })
            .with_max_cloud_cover(Some(20.0));
        assert_eq!(select_observation_pair(&s, &within).unwrap().baseline, 0);
    }
}
