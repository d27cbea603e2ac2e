//! Reference "fresh tire" lap time for a stint.

use crate::config::BaselinePolicy;
use crate::data::Lap;
use std::cmp::Ordering;

pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample standard deviation (n - 1). NaN for fewer than two values.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

/// Baseline from the first few valid lap times of a stint.
///
/// If the first time sits more than `outlier_sigma` standard deviations from
/// the median it is treated as an outlier, and the fastest of the times within
/// tolerance is used instead (the median when none are). With fewer than two
/// times the deviation is undefined and the first time is used as-is. An empty
/// slice gives NaN.
pub fn baseline_from_times(times: &[f64], policy: &BaselinePolicy) -> f64 {
    let reference = &times[..times.len().min(policy.reference_laps)];
    let Some(&first) = reference.first() else {
        return f64::NAN;
    };

    let median = median(reference);
    let tolerance = policy.outlier_sigma * sample_std(reference);

    // NaN tolerance compares false, so short references keep the first lap
    if (first - median).abs() > tolerance {
        reference
            .iter()
            .copied()
            .filter(|t| (t - median).abs() <= tolerance)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .unwrap_or(median)
    } else {
        first
    }
}

/// Baseline for a stint given the positions of its valid laps.
pub fn baseline(stint_laps: &[&Lap], valid_indices: &[usize], policy: &BaselinePolicy) -> f64 {
    let times: Vec<f64> = valid_indices
        .iter()
        .take(policy.reference_laps)
        .filter_map(|&i| stint_laps.get(i).and_then(|l| l.lap_time))
        .collect();
    baseline_from_times(&times, policy)
}
