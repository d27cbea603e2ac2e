//! Driver × race matrix with explicit empty cells, and cross-sectional imputation.

use crate::error::Result;
use csv::Writer;
use std::collections::HashMap;
use std::path::Path;

/// Sparse driver × race matrix. Rows and columns keep insertion order; a cell
/// that was never set is empty, which is distinct from a stored zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverRaceMatrix {
    drivers: Vec<String>,
    races: Vec<String>,
    cells: HashMap<(usize, usize), f64>,
}

impl DriverRaceMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drivers(&self) -> &[String] {
        &self.drivers
    }

    pub fn races(&self) -> &[String] {
        &self.races
    }

    pub fn add_driver(&mut self, driver: &str) -> usize {
        index_of(&mut self.drivers, driver)
    }

    pub fn add_race(&mut self, race: &str) -> usize {
        index_of(&mut self.races, race)
    }

    pub fn set(&mut self, driver: &str, race: &str, value: f64) {
        let d = self.add_driver(driver);
        let r = self.add_race(race);
        self.cells.insert((d, r), value);
    }

    pub fn get(&self, driver: &str, race: &str) -> Option<f64> {
        let d = self.drivers.iter().position(|x| x == driver)?;
        let r = self.races.iter().position(|x| x == race)?;
        self.cells.get(&(d, r)).copied()
    }

    pub fn filled_cells(&self) -> usize {
        self.cells.len()
    }

    fn row(&self, d: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        (0..self.races.len()).filter_map(move |r| self.cells.get(&(d, r)).map(|v| (r, *v)))
    }

    fn column(&self, r: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.drivers.len()).filter_map(move |d| self.cells.get(&(d, r)).copied())
    }

    fn column_mean(&self, r: usize) -> Option<f64> {
        let (sum, n) = self.column(r).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    fn column_min(&self, r: usize) -> Option<f64> {
        self.column(r).reduce(f64::min)
    }

    /// Mean of a row's filled cells, if it has any.
    pub fn row_mean(&self, driver: &str) -> Option<f64> {
        let d = self.drivers.iter().position(|x| x == driver)?;
        let (sum, n) = self.row(d).fold((0.0, 0usize), |(s, n), (_, v)| (s + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Writes the matrix with drivers as rows and races as columns; empty cells stay blank.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = Writer::from_path(path)?;
        let mut header = vec!["Driver".to_string()];
        header.extend(self.races.iter().cloned());
        writer.write_record(&header)?;

        for (d, driver) in self.drivers.iter().enumerate() {
            let mut record = vec![driver.clone()];
            record.extend((0..self.races.len()).map(|r| {
                self.cells.get(&(d, r)).map_or_else(String::new, |v| v.to_string())
            }));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn index_of(labels: &mut Vec<String>, label: &str) -> usize {
    match labels.iter().position(|x| x == label) {
        Some(i) => i,
        None => {
            labels.push(label.to_string());
            labels.len() - 1
        }
    }
}

/// Fills empty cells from each driver's typical deviation from the field.
///
/// A driver's deviation is the mean of `cell / column mean` over their filled
/// cells; each empty cell becomes `deviation × column minimum`. All column
/// statistics come from the original cells, never from imputed ones. Rows with
/// no filled cells, columns with no filled cells, and cells whose column mean
/// is zero contribute nothing.
pub fn impute(matrix: &DriverRaceMatrix) -> DriverRaceMatrix {
    let means: Vec<Option<f64>> = (0..matrix.races.len()).map(|r| matrix.column_mean(r)).collect();
    let mins: Vec<Option<f64>> = (0..matrix.races.len()).map(|r| matrix.column_min(r)).collect();

    let mut filled = matrix.clone();
    for d in 0..matrix.drivers.len() {
        let ratios: Vec<f64> = matrix
            .row(d)
            .filter_map(|(r, v)| means[r].filter(|m| *m != 0.0).map(|m| v / m))
            .collect();
        if ratios.is_empty() {
            continue;
        }
        let deviation = ratios.iter().sum::<f64>() / ratios.len() as f64;

        for (r, min) in mins.iter().enumerate() {
            if matrix.cells.contains_key(&(d, r)) {
                continue;
            }
            if let Some(min) = min {
                filled.cells.insert((d, r), deviation * min);
            }
        }
    }
    filled
}
