use crate::error::{Result, TireDegError};
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One timed lap by one driver, as loaded from the session. Times are seconds
/// from the session start; `lap_time` is the lap duration in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Lap {
    pub driver: String,
    pub lap_number: u32,
    pub lap_time: Option<f64>,
    pub compound: String,
    pub stint: u32,
    pub pit_in_time: Option<f64>,
    pub pit_out_time: Option<f64>,
    pub position: Option<u32>,
    pub deleted: bool,
    pub lap_start_time: Option<f64>,
    pub lap_end_time: Option<f64>,
}

impl Lap {
    pub fn is_pit_lap(&self) -> bool {
        self.pit_in_time.is_some() || self.pit_out_time.is_some()
    }
}

/// One row of the race classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceResult {
    pub abbreviation: String,
    pub driver_number: u32,
    pub points: f64,
    pub grid_position: Option<f64>,
    pub position: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackStatusEvent {
    pub time: f64,
    pub message: String,
}

/// An event on the season schedule whose race session is to be processed.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceEvent {
    pub round: u32,
    pub country: String,
    pub name: String,
}

/// Everything the pipeline needs from a single race session.
#[derive(Debug, Clone, Default)]
pub struct RaceSession {
    pub laps: Vec<Lap>,
    pub results: Vec<RaceResult>,
    pub track_status: Vec<TrackStatusEvent>,
}

impl RaceSession {
    /// A driver's laps in ascending lap order.
    pub fn driver_laps(&self, driver: &str) -> Vec<&Lap> {
        let mut laps: Vec<&Lap> = self.laps.iter().filter(|l| l.driver == driver).collect();
        laps.sort_by_key(|l| l.lap_number);
        laps
    }

    /// Race distance, taken as the highest lap number anyone completed.
    pub fn total_laps(&self) -> u32 {
        self.laps.iter().map(|l| l.lap_number).max().unwrap_or(0)
    }
}

/// Source of session, schedule and standings data.
pub trait SessionProvider {
    fn race_events(&self, year: u16) -> Result<Vec<RaceEvent>>;
    fn load_race(&self, year: u16, event: &RaceEvent) -> Result<RaceSession>;
    /// Final championship points by driver code.
    fn driver_standings(&self, year: u16) -> Result<HashMap<String, f64>>;
}

// renaming all the columns we need from the exported session tables
#[derive(Debug, Deserialize)]
struct RawLap {
    #[serde(rename = "Driver")] driver: String,
    #[serde(rename = "LapNumber")] lap_number: f64,
    #[serde(rename = "LapTime")] lap_time: Option<f64>,
    #[serde(rename = "Compound", default)] compound: Option<String>,
    #[serde(rename = "Stint")] stint: Option<f64>,
    #[serde(rename = "PitInTime")] pit_in_time: Option<f64>,
    #[serde(rename = "PitOutTime")] pit_out_time: Option<f64>,
    #[serde(rename = "Position")] position: Option<f64>,
    #[serde(rename = "Deleted", default)] deleted: Option<String>,
    #[serde(rename = "LapStartTime")] lap_start_time: Option<f64>,
    #[serde(rename = "Time")] time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(rename = "Abbreviation")] abbreviation: String,
    #[serde(rename = "DriverNumber")] driver_number: u32,
    #[serde(rename = "Points")] points: Option<f64>,
    #[serde(rename = "GridPosition")] grid_position: Option<f64>,
    #[serde(rename = "Position")] position: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawTrackStatus {
    #[serde(rename = "Time")] time: f64,
    #[serde(rename = "Message")] message: String,
}

#[derive(Debug, Deserialize)]
struct RawScheduleRow {
    #[serde(rename = "RoundNumber")] round: u32,
    #[serde(rename = "Country")] country: String,
    #[serde(rename = "OfficialEventName")] name: String,
    #[serde(rename = "Session5", default)] session5: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStanding {
    #[serde(rename = "Code")] code: String,
    #[serde(rename = "Points")] points: Option<f64>,
}

impl RawLap {
    // laps without a stint id can't be placed in any stint, so they are dropped here
    fn into_lap(self) -> Option<Lap> {
        let stint = self.stint.filter(|s| s.is_finite() && *s >= 0.0)?;
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Some(Lap {
            driver: self.driver,
            lap_number: self.lap_number.round() as u32,
            lap_time: finite(self.lap_time),
            compound: self.compound.unwrap_or_default().to_uppercase(),
            stint: stint.round() as u32,
            pit_in_time: finite(self.pit_in_time),
            pit_out_time: finite(self.pit_out_time),
            position: finite(self.position).map(|p| p.round() as u32),
            deleted: self.deleted.map_or(false, |d| d.trim().eq_ignore_ascii_case("true")),
            lap_start_time: finite(self.lap_start_time),
            lap_end_time: finite(self.time),
        })
    }
}

/// Reads sessions exported as CSV files under `<root>/<year>/`.
pub struct CsvSessionProvider {
    root: PathBuf,
}

impl CsvSessionProvider {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn season_dir(&self, year: u16) -> PathBuf {
        self.root.join(year.to_string())
    }

    fn race_dir(&self, year: u16, event: &RaceEvent) -> PathBuf {
        self.season_dir(year).join(format!("{:02}", event.round))
    }
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(TireDegError::MissingSession(path.to_path_buf()));
    }
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut rows = Vec::new();
    for res in reader.deserialize() {
        rows.push(res?);
    }
    Ok(rows)
}

impl SessionProvider for CsvSessionProvider {
    fn race_events(&self, year: u16) -> Result<Vec<RaceEvent>> {
        let rows: Vec<RawScheduleRow> = read_rows(&self.season_dir(year).join("schedule.csv"))?;
        Ok(rows
            .into_iter()
            .filter(|r| r.session5.as_deref() == Some("Race"))
            .map(|r| RaceEvent { round: r.round, country: r.country, name: r.name })
            .collect())
    }

    fn load_race(&self, year: u16, event: &RaceEvent) -> Result<RaceSession> {
        let dir = self.race_dir(year, event);

        let raw_laps: Vec<RawLap> = read_rows(&dir.join("laps.csv"))?;
        let total = raw_laps.len();
        let laps: Vec<Lap> = raw_laps.into_iter().filter_map(RawLap::into_lap).collect();
        if laps.len() < total {
            tracing::debug!("{}: dropped {} laps without a stint id", event.name, total - laps.len());
        }

        let results = read_rows::<RawResult>(&dir.join("results.csv"))?
            .into_iter()
            .map(|r| RaceResult {
                abbreviation: r.abbreviation,
                driver_number: r.driver_number,
                points: r.points.unwrap_or(0.0),
                grid_position: r.grid_position.filter(|p| p.is_finite()),
                position: r.position.filter(|p| p.is_finite()),
            })
            .collect();

        // a race without a track status log simply had no neutralizations recorded
        let status_path = dir.join("track_status.csv");
        let track_status = if status_path.exists() {
            read_rows::<RawTrackStatus>(&status_path)?
                .into_iter()
                .map(|r| TrackStatusEvent { time: r.time, message: r.message })
                .collect()
        } else {
            Vec::new()
        };

        Ok(RaceSession { laps, results, track_status })
    }

    fn driver_standings(&self, year: u16) -> Result<HashMap<String, f64>> {
        let rows: Vec<RawStanding> = read_rows(&self.season_dir(year).join("standings.csv"))?;
        Ok(rows.into_iter().map(|r| (r.code, r.points.unwrap_or(0.0))).collect())
    }
}
