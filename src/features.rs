use crate::aggregator::TireMetricRow;
use crate::baseline::{median, sample_std};
use crate::error::Result;
use csv::Writer;
use ndarray::Array2;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Per driver × race summary of the tire-metrics table, the input of the
/// downstream prediction models.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverRaceFeatures {
    #[serde(rename = "Driver")] pub driver: String,
    #[serde(rename = "Race")] pub race: String,
    #[serde(rename = "Year")] pub year: u16,
    #[serde(rename = "Laps")] pub laps: usize,
    #[serde(rename = "SmoothedDeg_mean")] pub smoothed_deg_mean: f64,
    #[serde(rename = "SmoothedDeg_max")] pub smoothed_deg_max: f64,
    #[serde(rename = "SmoothedDeg_std")] pub smoothed_deg_std: f64,
    #[serde(rename = "LapTime_mean")] pub lap_time_mean: f64,
    #[serde(rename = "LapTime_std")] pub lap_time_std: f64,
    #[serde(rename = "LapTime_min")] pub lap_time_min: f64,
    #[serde(rename = "DegradationPct_mean")] pub degradation_pct_mean: f64,
    #[serde(rename = "DegradationPct_max")] pub degradation_pct_max: f64,
    #[serde(rename = "DegradationPct_median")] pub degradation_pct_median: f64,
    #[serde(rename = "RacePoints")] pub race_points: f64,
    #[serde(rename = "StintLength")] pub stint_length: f64,
}

/// Numeric columns that can be exported into a design matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureColumn {
    SmoothedDegMean,
    SmoothedDegMax,
    SmoothedDegStd,
    LapTimeMean,
    LapTimeStd,
    LapTimeMin,
    DegradationPctMean,
    DegradationPctMax,
    DegradationPctMedian,
    RacePoints,
    StintLength,
}

impl DriverRaceFeatures {
    pub fn value(&self, column: FeatureColumn) -> f64 {
        match column {
            FeatureColumn::SmoothedDegMean => self.smoothed_deg_mean,
            FeatureColumn::SmoothedDegMax => self.smoothed_deg_max,
            FeatureColumn::SmoothedDegStd => self.smoothed_deg_std,
            FeatureColumn::LapTimeMean => self.lap_time_mean,
            FeatureColumn::LapTimeStd => self.lap_time_std,
            FeatureColumn::LapTimeMin => self.lap_time_min,
            FeatureColumn::DegradationPctMean => self.degradation_pct_mean,
            FeatureColumn::DegradationPctMax => self.degradation_pct_max,
            FeatureColumn::DegradationPctMedian => self.degradation_pct_median,
            FeatureColumn::RacePoints => self.race_points,
            FeatureColumn::StintLength => self.stint_length,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Groups rows by (driver, year, race) in order of first appearance.
pub fn prepare_features(rows: &[TireMetricRow]) -> Vec<DriverRaceFeatures> {
    let mut order: Vec<(String, u16, String)> = Vec::new();
    let mut groups: HashMap<(String, u16, String), Vec<&TireMetricRow>> = HashMap::new();
    for row in rows {
        let key = (row.driver.clone(), row.year, row.race.clone());
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(row);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let group = groups.remove(&key)?;
            let (driver, year, race) = key;

            let smoothed: Vec<f64> = group.iter().map(|r| r.smoothed_deg).collect();
            let times: Vec<f64> = group.iter().map(|r| r.lap_time).collect();
            let deg: Vec<f64> = group.iter().map(|r| r.degradation_pct).collect();
            let stint_lengths: Vec<f64> = group.iter().map(|r| r.stint_length as f64).collect();

            Some(DriverRaceFeatures {
                driver,
                race,
                year,
                laps: group.len(),
                smoothed_deg_mean: mean(&smoothed),
                smoothed_deg_max: max(&smoothed),
                smoothed_deg_std: sample_std(&smoothed),
                lap_time_mean: mean(&times),
                lap_time_std: sample_std(&times),
                lap_time_min: times.iter().copied().fold(f64::INFINITY, f64::min),
                degradation_pct_mean: mean(&deg),
                degradation_pct_max: max(&deg),
                degradation_pct_median: median(&deg),
                race_points: group.iter().map(|r| r.race_points).fold(f64::NEG_INFINITY, f64::max),
                stint_length: mean(&stint_lengths),
            })
        })
        .collect()
}

/// Splits features into (train, test) by season; other seasons are dropped.
pub fn split_by_year(
    features: &[DriverRaceFeatures],
    train_years: &[u16],
    test_years: &[u16],
) -> (Vec<DriverRaceFeatures>, Vec<DriverRaceFeatures>) {
    let pick = |years: &[u16]| {
        features
            .iter()
            .filter(|f| years.contains(&f.year))
            .cloned()
            .collect::<Vec<_>>()
    };
    (pick(train_years), pick(test_years))
}

/// Design matrix with one row per feature record and one column per requested feature.
pub fn design_matrix(features: &[DriverRaceFeatures], columns: &[FeatureColumn]) -> Array2<f64> {
    Array2::from_shape_fn((features.len(), columns.len()), |(i, j)| features[i].value(columns[j]))
}

pub fn write_features<P: AsRef<Path>>(path: P, features: &[DriverRaceFeatures]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    for f in features {
        writer.serialize(f)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn row(driver: &str, year: u16, race: &str, time: f64, deg: f64, smoothed: f64, stint_length: usize) -> TireMetricRow {
        TireMetricRow {
            driver: driver.into(),
            race: race.into(),
            year,
            lap_number: 5,
            stint: 1,
            stint_lap_number: 2,
            lap_time: time,
            compound: "HARD".into(),
            baseline_time: 90_000.0,
            degradation_pct: deg,
            smoothed_deg: smoothed,
            positions_gained: Some(0),
            race_points: 8.0,
            stint_length,
            finish_position: 6.0,
            starting_position: Some(7.0),
        }
    }

    fn sample() -> Vec<TireMetricRow> {
        vec![
            row("RUS", 2023, "Monza", 90_000.0, 0.0, 0.0, 20),
            row("RUS", 2023, "Monza", 90_900.0, 1.0, 0.5, 20),
            row("NOR", 2023, "Monza", 91_000.0, 0.0, 0.0, 30),
            row("RUS", 2023, "Monza", 91_800.0, 2.0, 1.0, 10),
            row("RUS", 2024, "Monza", 89_000.0, 0.0, 0.0, 25),
        ]
    }

    #[test]
    fn groups_by_driver_year_and_race() {
        let features = prepare_features(&sample());
        assert_eq!(features.len(), 3);
        assert_eq!((features[0].driver.as_str(), features[0].year), ("RUS", 2023));
        assert_eq!(features[1].driver, "NOR");
        assert_eq!(features[2].year, 2024);

        let rus = &features[0];
        assert_eq!(rus.laps, 3);
        assert!((rus.lap_time_mean - 90_900.0).abs() < EPS);
        assert!((rus.lap_time_std - 900.0).abs() < EPS);
        assert_eq!(rus.lap_time_min, 90_000.0);
        assert_eq!(rus.degradation_pct_max, 2.0);
        assert_eq!(rus.degradation_pct_median, 1.0);
        assert!((rus.smoothed_deg_mean - 0.5).abs() < EPS);
        assert!((rus.stint_length - 50.0 / 3.0).abs() < EPS);
        assert_eq!(rus.race_points, 8.0);
    }

    #[test]
    fn single_lap_group_has_undefined_spread() {
        let features = prepare_features(&sample());
        assert!(features[1].lap_time_std.is_nan());
        assert!(features[1].smoothed_deg_std.is_nan());
    }

    #[test]
    fn split_and_matrix() {
        let features = prepare_features(&sample());
        let (train, test) = split_by_year(&features, &[2023], &[2024]);
        assert_eq!(train.len(), 2);
        assert_eq!(test.len(), 1);

        let x = design_matrix(&train, &[FeatureColumn::LapTimeMin, FeatureColumn::StintLength]);
        assert_eq!(x.dim(), (2, 2));
        assert_eq!(x[[1, 0]], 91_000.0);
        assert_eq!(x[[1, 1]], 30.0);
    }
}
