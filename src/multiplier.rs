//! Legacy end-of-stint / start-of-stint pace ratio ("tire multiplier").

use crate::config::MultiplierPolicy;
use crate::data::{Lap, RaceEvent, RaceSession, SessionProvider};
use crate::error::Result;
use crate::impute::DriverRaceMatrix;
use crate::stint::segment_stints;
use csv::Writer;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Ratio of the mean final lap time to the mean initial lap time of a stint.
/// `laps` holds `(lap_time, lap_number)` pairs. Returns 0 (no signal) for a
/// short stint, an empty edge group or a zero initial mean.
pub fn stint_multiplier(laps: &[(f64, u32)], policy: &MultiplierPolicy) -> f64 {
    if laps.len() < policy.min_stint_laps || laps.is_empty() {
        return 0.0;
    }
    let first = laps[0].1 as f64;
    let last = laps[laps.len() - 1].1 as f64;
    let span = (last - first) * policy.edge_fraction;

    let mut initial = Vec::new();
    let mut last_laps = Vec::new();
    for &(time, n) in laps {
        let n = n as f64;
        if n <= first + span {
            initial.push(time);
        } else if n >= last - span {
            last_laps.push(time);
        }
    }

    if initial.is_empty() || last_laps.is_empty() {
        return 0.0;
    }
    let initial_avg = initial.iter().sum::<f64>() / initial.len() as f64;
    let final_avg = last_laps.iter().sum::<f64>() / last_laps.len() as f64;
    if initial_avg == 0.0 {
        return 0.0;
    }
    final_avg / initial_avg
}

// race opening lap, pit laps and untimed laps are left out
fn multiplier_lap(lap: &Lap) -> Option<(f64, u32)> {
    if lap.lap_number == 1 || lap.is_pit_lap() {
        return None;
    }
    lap.lap_time.map(|t| (t, lap.lap_number))
}

/// Mean non-zero stint multiplier per classified driver in one race.
pub fn race_multipliers(session: &RaceSession, policy: &MultiplierPolicy) -> Vec<(String, f64)> {
    let required = policy.min_completion * session.total_laps() as f64;
    let mut out = Vec::new();

    for result in &session.results {
        let driver = result.abbreviation.as_str();
        let laps = session.driver_laps(driver);
        if (laps.len() as f64) < required {
            debug!("{driver}: {} laps, below completion threshold", laps.len());
            continue;
        }

        let multipliers: Vec<f64> = segment_stints(&laps)
            .iter()
            .map(|stint| {
                let timed: Vec<(f64, u32)> = stint.laps.iter().filter_map(|l| multiplier_lap(l)).collect();
                stint_multiplier(&timed, policy)
            })
            .filter(|m| *m != 0.0)
            .collect();

        if !multipliers.is_empty() {
            out.push((driver.to_string(), multipliers.iter().sum::<f64>() / multipliers.len() as f64));
        }
    }
    out
}

/// Column label for a race in a multi-season matrix.
pub fn race_label(year: u16, event: &RaceEvent) -> String {
    format!("{year} {}", event.name)
}

/// Builds the driver × race multiplier matrix for the given seasons.
pub fn multiplier_matrix<P: SessionProvider>(
    provider: &P,
    seasons: &[u16],
    policy: &MultiplierPolicy,
) -> Result<DriverRaceMatrix> {
    let mut matrix = DriverRaceMatrix::new();
    for &year in seasons {
        let races = provider.race_events(year)?;
        for (i, event) in races.iter().enumerate() {
            info!("Loading race {} / {} ({year})", i + 1, races.len());
            info!("Loading {}", event.name);
            let session = provider.load_race(year, event)?;
            let label = race_label(year, event);
            matrix.add_race(&label);
            for result in &session.results {
                matrix.add_driver(&result.abbreviation);
            }
            for (driver, value) in race_multipliers(&session, policy) {
                matrix.set(&driver, &label, value);
            }
        }
    }
    Ok(matrix)
}

/// Per-driver mean multiplier alongside final championship points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiplierSummary {
    #[serde(rename = "Driver")]
    pub driver: String,
    #[serde(rename = "Average Tire Score")]
    pub average_multiplier: Option<f64>,
    #[serde(rename = "Points")]
    pub points: f64,
}

pub fn summarize(matrix: &DriverRaceMatrix, standings: &HashMap<String, f64>) -> Vec<MultiplierSummary> {
    matrix
        .drivers()
        .iter()
        .map(|driver| MultiplierSummary {
            driver: driver.clone(),
            average_multiplier: matrix.row_mean(driver),
            points: standings.get(driver).copied().unwrap_or(0.0),
        })
        .collect()
}

pub fn write_summary<P: AsRef<Path>>(path: P, rows: &[MultiplierSummary]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RaceResult;

    const EPS: f64 = 1e-9;

    fn policy() -> MultiplierPolicy {
        MultiplierPolicy::default()
    }

    #[test]
    fn short_stint_gives_no_signal() {
        let laps = [(90.0, 2), (90.5, 3), (91.0, 4), (91.5, 5)];
        assert_eq!(stint_multiplier(&laps, &policy()), 0.0);
    }

    #[test]
    fn ratio_of_final_to_initial_edges() {
        // span 10 laps -> 3-lap edges: initial laps 2..=5, final laps 9..=12
        let laps: Vec<(f64, u32)> = (2..=12).map(|n| (88.0 + n as f64, n)).collect();
        let initial = (90.0 + 91.0 + 92.0 + 93.0) / 4.0;
        let last = (97.0 + 98.0 + 99.0 + 100.0) / 4.0;
        assert!((stint_multiplier(&laps, &policy()) - last / initial).abs() < EPS);
    }

    #[test]
    fn zero_initial_pace_is_guarded() {
        let laps: Vec<(f64, u32)> = (2..=8).map(|n| (if n < 4 { 0.0 } else { 90.0 }, n)).collect();
        assert_eq!(stint_multiplier(&laps, &policy()), 0.0);
    }

    fn lap(driver: &str, n: u32, stint: u32, time: f64) -> Lap {
        Lap {
            driver: driver.into(),
            lap_number: n,
            lap_time: Some(time),
            compound: "MEDIUM".into(),
            stint,
            pit_in_time: None,
            pit_out_time: None,
            position: Some(1),
            deleted: false,
            lap_start_time: None,
            lap_end_time: None,
        }
    }

    fn result(code: &str, number: u32) -> RaceResult {
        RaceResult { abbreviation: code.into(), driver_number: number, points: 0.0, grid_position: None, position: None }
    }

    #[test]
    fn drivers_below_completion_are_skipped() {
        let mut laps: Vec<Lap> = (1..=20).map(|n| lap("VER", n, 1, 90.0 + n as f64 * 0.1)).collect();
        // retired after 10 laps: below 75 %
        laps.extend((1..=10).map(|n| lap("GAS", n, 1, 91.0)));
        let session = RaceSession {
            laps,
            results: vec![result("VER", 1), result("GAS", 10)],
            track_status: vec![],
        };
        let out = race_multipliers(&session, &policy());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "VER");
        assert!(out[0].1 > 1.0);
    }

    #[test]
    fn summary_joins_standings() {
        let mut m = DriverRaceMatrix::new();
        m.set("VER", "2021 A", 1.02);
        m.set("VER", "2021 B", 1.04);
        m.add_driver("MAZ");
        let standings: HashMap<String, f64> = [("VER".to_string(), 395.5)].into_iter().collect();
        let rows = summarize(&m, &standings);
        assert!((rows[0].average_multiplier.unwrap() - 1.03).abs() < EPS);
        assert_eq!(rows[0].points, 395.5);
        assert_eq!(rows[1].average_multiplier, None);
        assert_eq!(rows[1].points, 0.0);
    }
}
