//! Season-wide degradation table.
//!
//! For every (year, race) the aggregator loads the session once, derives the
//! SC/VSC periods and the per-driver outcome lookups once, then runs each
//! driver's stints through validity filtering, baseline estimation and the
//! degradation calculator. Stints that can't produce a trend are skipped and
//! counted; only data-integrity problems abort the run.

use crate::baseline::baseline;
use crate::config::PipelineConfig;
use crate::data::{RaceEvent, RaceSession, SessionProvider};
use crate::degradation::degradation_curve;
use crate::error::{Result, StintSkip};
use crate::registry::DriverRegistry;
use crate::stint::{segment_stints, Stint};
use crate::track::{extract_sc_vsc_periods, NeutralizedPeriod};
use crate::validity::valid_lap_indices;
use csv::{ReaderBuilder, Writer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// One valid lap of a stint record.
#[derive(Debug, Clone, PartialEq)]
pub struct StintLap {
    pub lap_number: u32,
    pub stint_lap_number: u32,
    pub lap_time_ms: f64,
    pub compound: String,
    pub degradation_pct: f64,
    pub smoothed_deg: f64,
    pub positions_gained: Option<i32>,
}

/// Degradation output for one stint. Built once, never changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct StintRecord {
    pub driver: String,
    pub race: String,
    pub year: u16,
    pub stint: u32,
    pub baseline_ms: f64,
    pub laps: Vec<StintLap>,
    pub stint_length: usize,
    pub starting_position: Option<f64>,
    pub finish_position: f64,
    pub race_points: f64,
}

/// Flat row of the tire-metrics table, one per valid lap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TireMetricRow {
    pub driver: String,
    pub race: String,
    pub year: u16,
    pub lap_number: u32,
    pub stint: u32,
    pub stint_lap_number: u32,
    pub lap_time: f64,
    pub compound: String,
    pub baseline_time: f64,
    pub degradation_pct: f64,
    pub smoothed_deg: f64,
    pub positions_gained: Option<i32>,
    pub race_points: f64,
    pub stint_length: usize,
    pub finish_position: f64,
    pub starting_position: Option<f64>,
}

/// Every stint record of a run, in race × driver × stint discovery order.
#[derive(Debug, Clone, Default)]
pub struct SeasonTable {
    pub records: Vec<StintRecord>,
}

impl SeasonTable {
    pub fn rows(&self) -> Vec<TireMetricRow> {
        self.records
            .iter()
            .flat_map(|rec| {
                rec.laps.iter().map(move |lap| TireMetricRow {
                    driver: rec.driver.clone(),
                    race: rec.race.clone(),
                    year: rec.year,
                    lap_number: lap.lap_number,
                    stint: rec.stint,
                    stint_lap_number: lap.stint_lap_number,
                    lap_time: lap.lap_time_ms,
                    compound: lap.compound.clone(),
                    baseline_time: rec.baseline_ms,
                    degradation_pct: lap.degradation_pct,
                    smoothed_deg: lap.smoothed_deg,
                    positions_gained: lap.positions_gained,
                    race_points: rec.race_points,
                    stint_length: rec.stint_length,
                    finish_position: rec.finish_position,
                    starting_position: rec.starting_position,
                })
            })
            .collect()
    }
}

pub fn write_tire_metrics<P: AsRef<Path>>(path: P, rows: &[TireMetricRow]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_tire_metrics<P: AsRef<Path>>(path: P) -> Result<Vec<TireMetricRow>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut rows = Vec::new();
    for res in reader.deserialize() {
        rows.push(res?);
    }
    Ok(rows)
}

/// Race-level outcome lookups shared by every stint of the race.
struct RaceOutcomes {
    points: HashMap<String, f64>,
    grid: HashMap<String, f64>,
    finish: HashMap<String, f64>,
    fallback_finish: f64,
}

impl RaceOutcomes {
    fn from_session(session: &RaceSession) -> Self {
        let mut points = HashMap::new();
        let mut grid = HashMap::new();
        let mut finish = HashMap::new();
        for r in &session.results {
            points.insert(r.abbreviation.clone(), r.points);
            if let Some(g) = r.grid_position {
                grid.insert(r.abbreviation.clone(), g);
            }
            if let Some(p) = r.position {
                finish.insert(r.abbreviation.clone(), p);
            }
        }
        // unclassified drivers count as finishing behind everyone who was
        let fallback_finish = finish.values().copied().fold(0.0, f64::max) + 1.0;
        Self { points, grid, finish, fallback_finish }
    }

    fn finish_of(&self, driver: &str) -> f64 {
        self.finish.get(driver).copied().unwrap_or(self.fallback_finish)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub races: usize,
    pub stints_kept: usize,
    pub stints_skipped: usize,
}

pub struct SeasonAggregator<'a, P: SessionProvider> {
    provider: &'a P,
    config: &'a PipelineConfig,
    registry: DriverRegistry,
    stats: RunStats,
}

impl<'a, P: SessionProvider> SeasonAggregator<'a, P> {
    pub fn new(provider: &'a P, config: &'a PipelineConfig) -> Self {
        Self {
            provider,
            config,
            registry: DriverRegistry::new(),
            stats: RunStats::default(),
        }
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Processes every configured season, race by race.
    pub fn collect(&mut self) -> Result<SeasonTable> {
        let (provider, config) = (self.provider, self.config);
        let mut table = SeasonTable::default();
        for &year in &config.seasons {
            let races = provider.race_events(year)?;
            for (i, event) in races.iter().enumerate() {
                info!("Loading race {} / {} ({year})", i + 1, races.len());
                info!("Loading {}", event.name);
                let session = provider.load_race(year, event)?;
                let records = self.process_race(year, event, &session)?;
                table.records.extend(records);
            }
        }
        info!(
            "collected {} stints from {} races ({} skipped)",
            self.stats.stints_kept, self.stats.races, self.stats.stints_skipped
        );
        Ok(table)
    }

    /// Stint records for one race, in results order then stint discovery order.
    pub fn process_race(
        &mut self,
        year: u16,
        event: &RaceEvent,
        session: &RaceSession,
    ) -> Result<Vec<StintRecord>> {
        for result in &session.results {
            self.registry.register(year, &event.name, result)?;
        }

        let periods = extract_sc_vsc_periods(&session.track_status);
        let periods = self.config.validity.exclude_neutralized.then_some(periods.as_slice());
        let outcomes = RaceOutcomes::from_session(session);

        let mut records = Vec::new();
        for result in &session.results {
            let driver = result.abbreviation.as_str();
            let laps = session.driver_laps(driver);
            if laps.is_empty() {
                debug!("{driver}: no laps in {}", event.name);
                continue;
            }

            for stint in segment_stints(&laps) {
                match self.process_stint(&stint, periods) {
                    Ok((baseline_ms, stint_laps)) => {
                        self.stats.stints_kept += 1;
                        records.push(StintRecord {
                            driver: driver.to_string(),
                            race: event.name.clone(),
                            year,
                            stint: stint.id,
                            baseline_ms,
                            laps: stint_laps,
                            stint_length: stint.len(),
                            starting_position: outcomes.grid.get(driver).copied(),
                            finish_position: outcomes.finish_of(driver),
                            race_points: outcomes.points.get(driver).copied().unwrap_or(0.0),
                        });
                    }
                    Err(skip @ StintSkip::TooFewValidLaps(_)) => {
                        self.stats.stints_skipped += 1;
                        debug!("{driver} stint {} in {}: {skip}", stint.id, event.name);
                    }
                    Err(skip) => {
                        self.stats.stints_skipped += 1;
                        warn!("{driver} stint {} in {}: {skip}", stint.id, event.name);
                    }
                }
            }
        }
        self.stats.races += 1;
        Ok(records)
    }

    fn process_stint(
        &self,
        stint: &Stint<'_>,
        periods: Option<&[NeutralizedPeriod]>,
    ) -> std::result::Result<(f64, Vec<StintLap>), StintSkip> {
        let valid = valid_lap_indices(&stint.laps, periods, &self.config.validity);
        if valid.len() < 2 {
            return Err(StintSkip::TooFewValidLaps(valid.len()));
        }

        let base = baseline(&stint.laps, &valid, &self.config.baseline);
        if !base.is_finite() || base <= 0.0 {
            return Err(StintSkip::DegenerateBaseline(base));
        }

        let curve = degradation_curve(&stint.laps, &valid, base, self.config.degradation.smoothing_window);
        let first_lap = stint.first_lap_number().unwrap_or(0);

        let laps = valid
            .iter()
            .enumerate()
            .map(|(k, &idx)| {
                let lap = stint.laps[idx];
                StintLap {
                    lap_number: lap.lap_number,
                    stint_lap_number: lap.lap_number - first_lap + 1,
                    lap_time_ms: lap.lap_time.unwrap_or(f64::NAN) * 1000.0,
                    compound: lap.compound.clone(),
                    degradation_pct: curve.degradation_pcts[k],
                    smoothed_deg: curve.smoothed[k],
                    positions_gained: curve.position_deltas[k],
                }
            })
            .collect();

        Ok((base * 1000.0, laps))
    }
}
