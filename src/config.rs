//! Pipeline configuration, read from a TOML file.
//!
//! Every section has defaults so an empty (or missing) file gives a usable
//! pipeline. Unknown keys are rejected so a typo in a weight name fails loudly
//! instead of silently falling back to zero.

use crate::error::{Result, TireDegError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub seasons: Vec<u16>,
    pub validity: ValidityRules,
    pub baseline: BaselinePolicy,
    pub degradation: DegradationPolicy,
    pub ranking: RankingConfig,
    pub features: FeatureSplit,
    pub multiplier: MultiplierPolicy,
}

/// Which rules the lap validity filter applies. The stint's first lap and
/// untimed laps are always excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidityRules {
    pub exclude_pit_laps: bool,
    pub exclude_deleted: bool,
    pub exclude_neutralized: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaselinePolicy {
    pub reference_laps: usize,
    pub outlier_sigma: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DegradationPolicy {
    pub smoothing_window: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankingConfig {
    pub min_races: usize,
    pub weighted: bool,
    pub weights: CompositeWeights,
}

/// Weights applied to the five normalized ranking components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompositeWeights {
    pub points_per_race: f64,
    pub tire_management: f64,
    pub starting_position: f64,
    pub finish_position: f64,
    pub positions_gained: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureSplit {
    pub train_years: Vec<u16>,
    pub test_years: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MultiplierPolicy {
    pub min_stint_laps: usize,
    pub edge_fraction: f64,
    pub min_completion: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/raw"),
            output_dir: PathBuf::from("data/processed"),
            seasons: vec![2020, 2021, 2022, 2023, 2024],
            validity: ValidityRules::default(),
            baseline: BaselinePolicy::default(),
            degradation: DegradationPolicy::default(),
            ranking: RankingConfig::default(),
            features: FeatureSplit::default(),
            multiplier: MultiplierPolicy::default(),
        }
    }
}

impl Default for ValidityRules {
    fn default() -> Self {
        Self {
            exclude_pit_laps: true,
            exclude_deleted: true,
            exclude_neutralized: true,
        }
    }
}

impl Default for BaselinePolicy {
    fn default() -> Self {
        Self {
            reference_laps: 3,
            outlier_sigma: 1.5,
        }
    }
}

impl Default for DegradationPolicy {
    fn default() -> Self {
        Self { smoothing_window: 3 }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_races: 10,
            weighted: true,
            weights: CompositeWeights::default(),
        }
    }
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            points_per_race: 0.3,
            tire_management: 0.3,
            starting_position: 0.2,
            finish_position: 0.2,
            positions_gained: 0.0,
        }
    }
}

impl Default for FeatureSplit {
    fn default() -> Self {
        Self {
            train_years: vec![2020, 2021, 2022, 2023],
            test_years: vec![2024],
        }
    }
}

impl Default for MultiplierPolicy {
    fn default() -> Self {
        Self {
            min_stint_laps: 5,
            edge_fraction: 0.3,
            min_completion: 0.75,
        }
    }
}

impl CompositeWeights {
    pub fn equal() -> Self {
        Self {
            points_per_race: 0.2,
            tire_management: 0.2,
            starting_position: 0.2,
            finish_position: 0.2,
            positions_gained: 0.2,
        }
    }

    // same order as the ranking engine's component columns
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.points_per_race,
            self.tire_management,
            self.starting_position,
            self.finish_position,
            self.positions_gained,
        ]
    }
}

impl RankingConfig {
    /// Weights actually used for the composite score.
    pub fn effective_weights(&self) -> CompositeWeights {
        if self.weighted {
            self.weights
        } else {
            CompositeWeights::equal()
        }
    }
}

impl PipelineConfig {
    /// Reads the config at `path`, falling back to defaults when the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content = fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            tracing::info!("no config at {}, using defaults", path.display());
            Self::default()
        };
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(TireDegError::InvalidConfig(msg.to_string()));

        if self.baseline.reference_laps == 0 {
            return invalid("baseline.reference_laps must be at least 1");
        }
        if !(self.baseline.outlier_sigma >= 0.0) {
            return invalid("baseline.outlier_sigma must be non-negative");
        }
        if self.degradation.smoothing_window == 0 {
            return invalid("degradation.smoothing_window must be at least 1");
        }
        if self.ranking.weights.as_array().iter().any(|w| !(*w >= 0.0)) {
            return invalid("ranking.weights must all be non-negative");
        }
        let in_unit = |f: f64| f > 0.0 && f <= 1.0;
        if !in_unit(self.multiplier.edge_fraction) || !in_unit(self.multiplier.min_completion) {
            return invalid("multiplier fractions must lie in (0, 1]");
        }
        Ok(())
    }
}
