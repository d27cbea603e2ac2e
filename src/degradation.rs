use crate::data::Lap;

/// Per-valid-lap degradation for one stint, all vectors in valid-lap order.
#[derive(Debug, Clone, PartialEq)]
pub struct DegradationCurve {
    pub degradation_pcts: Vec<f64>,
    pub smoothed: Vec<f64>,
    pub position_deltas: Vec<Option<i32>>,
}

/// Percentage slowdown of each time against `baseline`. A NaN baseline gives NaN throughout.
pub fn degradation_pcts(times: &[f64], baseline: f64) -> Vec<f64> {
    times.iter().map(|t| (t - baseline) / baseline * 100.0).collect()
}

/// Trailing moving average; the window shrinks to what is available at the start.
pub fn trailing_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let from = (i + 1).saturating_sub(window);
            let slice = &values[from..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Position change since the previous valid lap (positive = positions lost).
/// The first valid lap has no predecessor and gets zero; a missing position gives `None`.
pub fn position_deltas(stint_laps: &[&Lap], valid_indices: &[usize]) -> Vec<Option<i32>> {
    valid_indices
        .iter()
        .enumerate()
        .map(|(k, &idx)| {
            if k == 0 {
                return Some(0);
            }
            let prev = stint_laps[valid_indices[k - 1]].position?;
            let curr = stint_laps[idx].position?;
            Some(curr as i32 - prev as i32)
        })
        .collect()
}

pub fn degradation_curve(
    stint_laps: &[&Lap],
    valid_indices: &[usize],
    baseline: f64,
    smoothing_window: usize,
) -> DegradationCurve {
    let times: Vec<f64> = valid_indices
        .iter()
        .map(|&i| stint_laps[i].lap_time.unwrap_or(f64::NAN))
        .collect();
    let degradation_pcts = degradation_pcts(&times, baseline);
    let smoothed = trailing_mean(&degradation_pcts, smoothing_window);

    DegradationCurve {
        degradation_pcts,
        smoothed,
        position_deltas: position_deltas(stint_laps, valid_indices),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn lap(n: u32, time: f64, position: Option<u32>) -> Lap {
        Lap {
            driver: "ALO".into(),
            lap_number: n,
            lap_time: Some(time),
            compound: "HARD".into(),
            stint: 1,
            pit_in_time: None,
            pit_out_time: None,
            position,
            deleted: false,
            lap_start_time: None,
            lap_end_time: None,
        }
    }

    #[test]
    fn baseline_lap_has_zero_degradation() {
        let pcts = degradation_pcts(&[90.0, 90.9, 91.8], 90.0);
        assert!(pcts[0].abs() < EPS);
        assert!((pcts[1] - 1.0).abs() < EPS);
        assert!((pcts[2] - 2.0).abs() < EPS);
    }

    #[test]
    fn nan_baseline_propagates() {
        let pcts = degradation_pcts(&[90.0, 91.0], f64::NAN);
        assert!(pcts.iter().all(|p| p.is_nan()));
        assert!(trailing_mean(&pcts, 3).iter().all(|p| p.is_nan()));
    }

    #[test]
    fn smoothing_window_grows_then_trails() {
        let raw = [1.0, 3.0, 5.0, 10.0, -2.0];
        let smooth = trailing_mean(&raw, 3);
        assert_eq!(smooth.len(), raw.len());
        assert!((smooth[0] - 1.0).abs() < EPS);
        assert!((smooth[1] - 2.0).abs() < EPS);
        assert!((smooth[2] - 3.0).abs() < EPS);
        assert!((smooth[3] - 6.0).abs() < EPS);
        assert!((smooth[4] - 13.0 / 3.0).abs() < EPS);
    }

    #[test]
    fn position_deltas_follow_valid_laps_only() {
        let laps = vec![
            lap(5, 99.0, Some(8)),
            lap(6, 91.0, Some(7)),
            lap(7, 91.2, Some(3)),
            lap(8, 91.4, Some(6)),
            lap(9, 91.5, None),
        ];
        let refs: Vec<&Lap> = laps.iter().collect();
        // lap 7 skipped: delta for lap 8 is measured against lap 6
        assert_eq!(position_deltas(&refs, &[1, 3, 4]), vec![Some(0), Some(-1), None]);
    }

    #[test]
    fn curve_vectors_have_equal_length() {
        let laps: Vec<Lap> = (1..=8).map(|n| lap(n, 90.0 + n as f64 * 0.1, Some(n))).collect();
        let refs: Vec<&Lap> = laps.iter().collect();
        let valid = vec![1, 2, 4, 6, 7];
        let curve = degradation_curve(&refs, &valid, 90.2, 3);
        assert_eq!(curve.degradation_pcts.len(), valid.len());
        assert_eq!(curve.smoothed.len(), valid.len());
        assert_eq!(curve.position_deltas.len(), valid.len());
        assert!(curve.degradation_pcts[0].abs() < EPS);
        assert_eq!(curve.position_deltas[1], Some(1));
    }
}
