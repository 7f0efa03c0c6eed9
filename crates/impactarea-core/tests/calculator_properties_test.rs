//! Property-based tests for the impacted-area calculator

use chrono::NaiveDate;
use impactarea_core::models::{ImpactParams, IndexTimeSeries, ThresholdComparison, VegetationIndex};
use impactarea_core::processing::compute_impact;
use impactarea_core::ImpactError;
use ndarray::Array3;
use proptest::prelude::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Index value, occasionally missing
fn pixel_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        9 => -1.0f64..1.0,
        1 => Just(f64::NAN),
    ]
}

fn two_slice_series(before: &[f64], after: &[f64], width: usize) -> IndexTimeSeries {
    let rows = before.len() / width;
    let mut values = before.to_vec();
    values.extend_from_slice(after);
    let cube = Array3::from_shape_vec((2, rows, width), values).unwrap();
    IndexTimeSeries::new(
        VegetationIndex::NDVI,
        vec![date(2024, 4, 20), date(2024, 5, 5)],
        cube,
    )
    .unwrap()
}

proptest! {
    #[test]
    fn test_difference_and_mask_follow_inputs(
        (before, after) in (1usize..6).prop_flat_map(|n| (
            prop::collection::vec(pixel_strategy(), n * 3),
            prop::collection::vec(pixel_strategy(), n * 3),
        )),
        threshold in -0.5f64..0.5,
    ) {
        let series = two_slice_series(&before, &after, 3);
        let params = ImpactParams::new(date(2024, 5, 1), threshold);
        let any_valid = before.iter().zip(&after).any(|(b, a)| !b.is_nan() && !a.is_nan());

        match compute_impact(&series, &params) {
            Ok(result) => {
                prop_assert!(any_valid);
                let comparison = ThresholdComparison::Auto.resolve(threshold);
                for (k, (b, a)) in before.iter().zip(&after).enumerate() {
                    let d = result.difference[[k / 3, k % 3]];
                    if b.is_nan() || a.is_nan() {
                        prop_assert!(d.is_nan());
                        prop_assert!(!result.mask[[k / 3, k % 3]]);
                    } else {
                        prop_assert_eq!(d, a - b);
                        prop_assert_eq!(result.mask[[k / 3, k % 3]], comparison.is_impacted(d, threshold));
                    }
                }
                let pct = result.impacted_percentage();
                prop_assert!((0.0..=100.0).contains(&pct));
                prop_assert!(result.impacted_pixel_count <= result.valid_pixel_count);
            }
            Err(ImpactError::InsufficientData { .. }) => prop_assert!(!any_valid),
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn test_longer_run_never_flags_more(
        series_values in prop::collection::vec(-1.0f64..1.0, 5),
        threshold in -0.5f64..-0.01,
        n in 1u32..4,
    ) {
        let dates = vec![
            date(2024, 4, 20),
            date(2024, 5, 2),
            date(2024, 5, 9),
            date(2024, 5, 16),
            date(2024, 5, 23),
        ];
        let cube = Array3::from_shape_vec((5, 1, 1), series_values).unwrap();
        let series = IndexTimeSeries::new(VegetationIndex::NDVI, dates, cube).unwrap();

        let shorter = ImpactParams::new(date(2024, 5, 1), threshold).with_min_duration(Some(n));
        let longer = ImpactParams::new(date(2024, 5, 1), threshold).with_min_duration(Some(n + 1));

        let shorter = compute_impact(&series, &shorter).unwrap();
        let longer = compute_impact(&series, &longer).unwrap();
        prop_assert!(longer.impacted_pixel_count <= shorter.impacted_pixel_count);
    }
}
