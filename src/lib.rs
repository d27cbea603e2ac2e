//! Tire-degradation metrics for lap-based racing.
//!
//! Per-lap session data is split into stints, each stint gets a robust
//! baseline lap time and a smoothed degradation curve, and the season-wide
//! table feeds driver rankings, feature preparation and the imputed
//! driver × race multiplier matrix.

pub mod aggregator;
pub mod baseline;
pub mod config;
pub mod data;
pub mod degradation;
pub mod error;
pub mod features;
pub mod impute;
pub mod multiplier;
pub mod ranking;
pub mod registry;
pub mod stint;
pub mod track;
pub mod validity;

pub use aggregator::{SeasonAggregator, SeasonTable, StintRecord, TireMetricRow};
pub use config::PipelineConfig;
pub use data::{CsvSessionProvider, SessionProvider};
pub use error::{Result, TireDegError};
