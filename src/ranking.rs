//! Driver ranking from the season tire-metrics table.
//!
//! Per-driver aggregates are min-max normalized across the eligible drivers
//! and combined with configurable weights into a composite score. The ranking
//! is a heuristic, not a validated model.

use crate::aggregator::TireMetricRow;
use crate::config::{CompositeWeights, RankingConfig};
use crate::error::Result;
use csv::Writer;
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Raw per-driver aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverAggregate {
    pub driver: String,
    pub races_participated: usize,
    pub stints: usize,
    pub laps_analyzed: usize,
    pub total_points: f64,
    pub avg_finish_position: f64,
    pub avg_starting_position: f64,
    pub mean_smoothed_deg: f64,
    pub mean_degradation_pct: f64,
}

impl DriverAggregate {
    pub fn points_per_race(&self) -> f64 {
        self.total_points / self.races_participated as f64
    }

    pub fn avg_positions_gained(&self) -> f64 {
        self.avg_starting_position - self.avg_finish_position
    }

    pub fn tire_management_score(&self) -> f64 {
        -self.mean_smoothed_deg
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DriverRanking {
    pub rank: usize,
    pub driver: String,
    pub composite_score: f64,
    pub races_participated: usize,
    pub stints: usize,
    pub race_points: f64,
    pub points_per_race: f64,
    pub finish_position: f64,
    pub starting_position: f64,
    pub avg_positions_gained: f64,
    pub smoothed_deg: f64,
    pub degradation_pct: f64,
    pub tire_management_score: f64,
    pub points_per_race_normalized: f64,
    pub tire_management_score_normalized: f64,
    pub starting_position_normalized: f64,
    pub finish_position_normalized: f64,
    pub avg_positions_gained_normalized: f64,
}

#[derive(Default)]
struct Accumulator {
    races: Vec<(u16, String)>,
    stints: HashSet<(u16, String, u32)>,
    points: f64,
    finish: Vec<f64>,
    start: Vec<f64>,
    smoothed: Vec<f64>,
    degradation: Vec<f64>,
    rows: usize,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

// NaN-skipping mean, the way the metric columns are averaged
fn nan_mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    mean(&finite)
}

/// Aggregates every driver in the table, in order of first appearance.
///
/// Race-level fields (points, finish, start) are taken once per (year, race)
/// from that race's first row; lap metrics average over all rows.
pub fn aggregate_drivers(rows: &[TireMetricRow]) -> Vec<DriverAggregate> {
    let mut order: Vec<String> = Vec::new();
    let mut acc: HashMap<String, Accumulator> = HashMap::new();

    for row in rows {
        let entry = acc.entry(row.driver.clone()).or_insert_with(|| {
            order.push(row.driver.clone());
            Accumulator::default()
        });

        let race_key = (row.year, row.race.clone());
        if !entry.races.contains(&race_key) {
            entry.races.push(race_key);
            entry.points += row.race_points;
            entry.finish.push(row.finish_position);
            if let Some(start) = row.starting_position {
                entry.start.push(start);
            }
        }
        entry.stints.insert((row.year, row.race.clone(), row.stint));
        entry.smoothed.push(row.smoothed_deg);
        entry.degradation.push(row.degradation_pct);
        entry.rows += 1;
    }

    order
        .into_iter()
        .filter_map(|driver| {
            let a = acc.remove(&driver)?;
            Some(DriverAggregate {
                races_participated: a.races.len(),
                stints: a.stints.len(),
                laps_analyzed: a.rows,
                total_points: a.points,
                avg_finish_position: nan_mean(&a.finish),
                avg_starting_position: nan_mean(&a.start),
                mean_smoothed_deg: nan_mean(&a.smoothed),
                mean_degradation_pct: nan_mean(&a.degradation),
                driver,
            })
        })
        .collect()
}

/// Scales each column to [0, 1], fitting min and max on the non-NaN values.
/// A constant column maps to 0; NaN stays NaN.
pub fn min_max_normalize(mut data: Array2<f64>) -> Array2<f64> {
    for mut column in data.axis_iter_mut(Axis(1)) {
        let (lo, hi) = column
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = if hi > lo { hi - lo } else { 1.0 };
        column.mapv_inplace(|v| (v - lo) / range);
    }
    data
}

// component column order: points/race, tire management, start, finish, positions gained
fn component_matrix(drivers: &[DriverAggregate]) -> Array2<f64> {
    let mut raw = Array2::<f64>::zeros((drivers.len(), 5));
    for (i, d) in drivers.iter().enumerate() {
        raw[[i, 0]] = d.points_per_race();
        raw[[i, 1]] = d.tire_management_score();
        raw[[i, 2]] = d.avg_starting_position;
        raw[[i, 3]] = d.avg_finish_position;
        raw[[i, 4]] = d.avg_positions_gained();
    }

    let mut normalized = min_max_normalize(raw);
    // lower grid and finish positions are better
    for col in [2, 3] {
        normalized.column_mut(col).mapv_inplace(|v| 1.0 - v);
    }
    normalized
}

pub fn composite_scores(normalized: &Array2<f64>, weights: &CompositeWeights) -> Array1<f64> {
    normalized.dot(&Array1::from_vec(weights.as_array().to_vec()))
}

/// Ranks drivers with at least `min_races` races by descending composite score.
/// Ties keep first-appearance order; NaN scores sort last.
pub fn rank_drivers(rows: &[TireMetricRow], config: &RankingConfig) -> Vec<DriverRanking> {
    let eligible: Vec<DriverAggregate> = aggregate_drivers(rows)
        .into_iter()
        .filter(|d| d.races_participated >= config.min_races)
        .collect();
    if eligible.is_empty() {
        return Vec::new();
    }

    let normalized = component_matrix(&eligible);
    let scores = composite_scores(&normalized, &config.effective_weights());

    let mut order: Vec<usize> = (0..eligible.len()).collect();
    order.sort_by(|&a, &b| match (scores[a].is_nan(), scores[b].is_nan()) {
        (false, false) => scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });

    order
        .into_iter()
        .enumerate()
        .map(|(pos, i)| {
            let d = &eligible[i];
            let n = normalized.row(i);
            DriverRanking {
                rank: pos + 1,
                driver: d.driver.clone(),
                composite_score: scores[i],
                races_participated: d.races_participated,
                stints: d.stints,
                race_points: d.total_points,
                points_per_race: d.points_per_race(),
                finish_position: d.avg_finish_position,
                starting_position: d.avg_starting_position,
                avg_positions_gained: d.avg_positions_gained(),
                smoothed_deg: d.mean_smoothed_deg,
                degradation_pct: d.mean_degradation_pct,
                tire_management_score: d.tire_management_score(),
                points_per_race_normalized: n[0],
                tire_management_score_normalized: n[1],
                starting_position_normalized: n[2],
                finish_position_normalized: n[3],
                avg_positions_gained_normalized: n[4],
            }
        })
        .collect()
}

pub fn write_rankings<P: AsRef<Path>>(path: P, rankings: &[DriverRanking]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    for r in rankings {
        writer.serialize(r)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const EPS: f64 = 1e-9;

    fn row(driver: &str, race: usize, stint: u32, smoothed: f64, points: f64, start: f64, finish: f64) -> TireMetricRow {
        TireMetricRow {
            driver: driver.into(),
            race: format!("Race {race}"),
            year: 2023,
            lap_number: 10,
            stint,
            stint_lap_number: 3,
            lap_time: 91_000.0,
            compound: "MEDIUM".into(),
            baseline_time: 90_000.0,
            degradation_pct: smoothed,
            smoothed_deg: smoothed,
            positions_gained: Some(0),
            race_points: points,
            stint_length: 20,
            finish_position: finish,
            starting_position: Some(start),
        }
    }

    // one driver over `races` races, two rows per race over two stints
    fn season(driver: &str, races: usize, smoothed: f64, points: f64, start: f64, finish: f64) -> Vec<TireMetricRow> {
        (0..races)
            .flat_map(|r| {
                vec![
                    row(driver, r, 1, smoothed, points, start, finish),
                    row(driver, r, 2, smoothed, points, start, finish),
                ]
            })
            .collect()
    }

    #[test]
    fn aggregates_count_distinct_races_and_stints() {
        let mut rows = season("VER", 3, 1.0, 25.0, 1.0, 1.0);
        rows.push(row("VER", 0, 2, 4.0, 25.0, 1.0, 1.0));
        let agg = aggregate_drivers(&rows);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].races_participated, 3);
        assert_eq!(agg[0].stints, 6);
        assert_eq!(agg[0].laps_analyzed, 7);
        assert_eq!(agg[0].total_points, 75.0);
        assert!((agg[0].mean_smoothed_deg - 10.0 / 7.0).abs() < EPS);
    }

    #[test]
    fn missing_starting_position_is_skipped_in_mean() {
        let mut rows = season("PER", 2, 1.0, 10.0, 4.0, 5.0);
        for r in rows.iter_mut().filter(|r| r.race == "Race 1") {
            r.starting_position = None;
        }
        let agg = aggregate_drivers(&rows);
        assert_eq!(agg[0].avg_starting_position, 4.0);
    }

    #[test]
    fn drivers_below_race_threshold_are_excluded() {
        let mut rows = season("HAM", 10, 1.0, 18.0, 2.0, 2.0);
        rows.extend(season("DEV", 5, 0.5, 0.0, 15.0, 14.0));
        let ranked = rank_drivers(&rows, &RankingConfig::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].driver, "HAM");
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn normalization_handles_constant_and_nan_columns() {
        let data = array![[1.0, 5.0, f64::NAN], [3.0, 5.0, 2.0], [2.0, 5.0, 4.0]];
        let n = min_max_normalize(data);
        assert_eq!(n.column(0).to_vec(), vec![0.0, 1.0, 0.5]);
        assert_eq!(n.column(1).to_vec(), vec![0.0, 0.0, 0.0]);
        assert!(n[[0, 2]].is_nan());
        assert_eq!(n[[2, 2]], 1.0);
    }

    #[test]
    fn composite_orders_drivers_and_inverts_positions() {
        let config = RankingConfig { min_races: 1, ..RankingConfig::default() };
        let mut rows = season("SAI", 2, 2.0, 6.0, 8.0, 6.0);
        rows.extend(season("VER", 2, 1.0, 25.0, 1.0, 1.0));
        rows.extend(season("ALB", 2, 3.0, 0.0, 15.0, 16.0));
        let ranked = rank_drivers(&rows, &config);

        let names: Vec<&str> = ranked.iter().map(|r| r.driver.as_str()).collect();
        assert_eq!(names, vec!["VER", "SAI", "ALB"]);
        assert_eq!(ranked.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);

        let ver = &ranked[0];
        assert_eq!(ver.finish_position_normalized, 1.0);
        assert_eq!(ver.starting_position_normalized, 1.0);
        assert_eq!(ver.points_per_race_normalized, 1.0);
        assert_eq!(ver.tire_management_score_normalized, 1.0);
        // 0.3 + 0.3 + 0.2 + 0.2, positions gained weighted 0
        assert!((ver.composite_score - 1.0).abs() < EPS);

        let alb = &ranked[2];
        assert!(alb.composite_score.abs() < EPS);
        assert_eq!(alb.avg_positions_gained, -1.0);
    }

    #[test]
    fn ties_keep_input_order() {
        let config = RankingConfig { min_races: 1, ..RankingConfig::default() };
        let mut rows = season("OCO", 1, 1.0, 4.0, 10.0, 7.0);
        rows.extend(season("GAS", 1, 1.0, 4.0, 10.0, 7.0));
        let ranked = rank_drivers(&rows, &config);
        assert_eq!(ranked[0].driver, "OCO");
        assert_eq!(ranked[1].driver, "GAS");
        assert_eq!(ranked[0].composite_score, ranked[1].composite_score);
    }

    #[test]
    fn custom_weights_change_the_order() {
        let mut config = RankingConfig { min_races: 1, ..RankingConfig::default() };
        config.weights = CompositeWeights {
            points_per_race: 0.0,
            tire_management: 0.0,
            starting_position: 0.0,
            finish_position: 0.0,
            positions_gained: 1.0,
        };
        let mut rows = season("VER", 1, 1.0, 25.0, 1.0, 1.0);
        rows.extend(season("HUL", 1, 3.0, 1.0, 20.0, 10.0));
        let ranked = rank_drivers(&rows, &config);
        assert_eq!(ranked[0].driver, "HUL");
        assert_eq!(ranked[0].composite_score, 1.0);
    }
}
