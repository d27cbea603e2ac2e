use crate::data::RaceResult;
use crate::error::{Result, TireDegError};
use std::collections::HashMap;

/// Driver number to display code, per season. A number that changes code
/// mid-season means the feed is inconsistent, and the run stops.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    codes: HashMap<(u16, u32), String>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, season: u16, race: &str, result: &RaceResult) -> Result<()> {
        let key = (season, result.driver_number);
        match self.codes.get(&key) {
            Some(existing) if *existing != result.abbreviation => Err(TireDegError::IdentityConflict {
                season,
                driver_number: result.driver_number,
                existing: existing.clone(),
                incoming: result.abbreviation.clone(),
                race: race.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.codes.insert(key, result.abbreviation.clone());
                Ok(())
            }
        }
    }

    pub fn code(&self, season: u16, driver_number: u32) -> Option<&str> {
        self.codes.get(&(season, driver_number)).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(code: &str, number: u32) -> RaceResult {
        RaceResult {
            abbreviation: code.into(),
            driver_number: number,
            points: 0.0,
            grid_position: None,
            position: None,
        }
    }

    #[test]
    fn repeated_consistent_mapping_is_fine() {
        let mut reg = DriverRegistry::new();
        reg.register(2021, "Bahrain", &result("VER", 33)).unwrap();
        reg.register(2021, "Imola", &result("VER", 33)).unwrap();
        // numbers are per season
        reg.register(2022, "Bahrain", &result("VER", 1)).unwrap();
        reg.register(2022, "Jeddah", &result("RIC", 3)).unwrap();
        reg.register(2023, "Bahrain", &result("DEV", 3)).unwrap();
        assert_eq!(reg.code(2021, 33), Some("VER"));
        assert_eq!(reg.code(2023, 3), Some("DEV"));
    }

    #[test]
    fn conflicting_mapping_names_both_codes() {
        let mut reg = DriverRegistry::new();
        reg.register(2023, "Bahrain", &result("DEV", 21)).unwrap();
        let err = reg.register(2023, "Hungary", &result("RIC", 21)).unwrap_err();
        match err {
            TireDegError::IdentityConflict { existing, incoming, race, .. } => {
                assert_eq!(existing, "DEV");
                assert_eq!(incoming, "RIC");
                assert_eq!(race, "Hungary");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
