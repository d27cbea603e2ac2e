use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TireDegError>;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum TireDegError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("session data not found: {}", .0.display())]
    MissingSession(PathBuf),

    #[error(
        "conflicting identity for driver #{driver_number} in {season} ({race}): \
         already mapped to {existing}, results now say {incoming}"
    )]
    IdentityConflict {
        season: u16,
        driver_number: u32,
        existing: String,
        incoming: String,
        race: String,
    },
}

/// Reasons a single stint is dropped from the output. These never abort the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StintSkip {
    #[error("only {0} valid laps, need at least 2")]
    TooFewValidLaps(usize),

    #[error("baseline {0} is not a usable reference time")]
    DegenerateBaseline(f64),
}
