//! Data sources for the raw equipment history matrix
//!
//! The sweep only needs a pull function returning the raw `[N, 7]` matrix.
//! Two sources are provided:
//! - `CsvSource` reads a headered CSV export
//! - `SyntheticSource` generates a seeded maintenance history for offline runs

use std::path::{Path, PathBuf};

use csv::{Reader, Writer};
use ndarray::Array2;
use ndarray_rand::rand_distr::{Distribution, Normal, Poisson};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::types::{records_to_matrix, RawRecord};
use crate::error::{Error, Result};

/// Anything that can supply the raw training matrix
pub trait DataSource {
    /// Pull the full raw matrix, rows in time order
    fn pull(&self) -> Result<Array2<f64>>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Reads raw records from a CSV file with a header row
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the records without stacking them into a matrix
    pub fn load_records(&self) -> Result<Vec<RawRecord>> {
        let mut reader = Reader::from_path(&self.path)?;
        let mut records = Vec::new();

        for result in reader.deserialize() {
            let record: RawRecord = result?;
            records.push(record);
        }

        debug!("Read {} records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

impl DataSource for CsvSource {
    fn pull(&self) -> Result<Array2<f64>> {
        let records = self.load_records()?;
        if records.is_empty() {
            return Err(Error::EmptyDataset(format!(
                "{} contains no records",
                self.path.display()
            )));
        }
        Ok(records_to_matrix(&records))
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Save raw records to CSV in the layout `CsvSource` reads back
pub fn save_records_csv<P: AsRef<Path>>(records: &[RawRecord], path: P) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Seeded generator of a plausible daily maintenance history
///
/// Production drifts down and downtime climbs as equipment wears between
/// maintenance events, which gives the model something to learn from.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    /// Number of days to generate
    pub rows: usize,
    /// Shortest gap between maintenance events, in days
    pub min_interval: usize,
    /// Longest gap between maintenance events, in days
    pub max_interval: usize,
    /// Units produced on a fresh weekday
    pub base_production: f64,
    /// RNG seed
    pub seed: u64,
}

impl SyntheticSource {
    pub fn new(rows: usize, seed: u64) -> Self {
        Self {
            rows,
            min_interval: 20,
            max_interval: 45,
            base_production: 1000.0,
            seed,
        }
    }

    /// Set the range of days between maintenance events
    pub fn with_interval(mut self, min_interval: usize, max_interval: usize) -> Self {
        self.min_interval = min_interval;
        self.max_interval = max_interval;
        self
    }

    /// Generate the records
    pub fn generate(&self) -> Result<Vec<RawRecord>> {
        if self.rows == 0 {
            return Err(Error::EmptyDataset("synthetic source asked for 0 rows".into()));
        }
        if self.min_interval == 0 || self.min_interval > self.max_interval {
            return Err(Error::InvalidConfig(format!(
                "maintenance interval range [{}, {}] is invalid",
                self.min_interval, self.max_interval
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let noise = Normal::new(0.0, 0.05 * self.base_production)
            .map_err(|e| Error::InvalidConfig(format!("production noise: {}", e)))?;

        // Maintenance days covering the whole horizon plus one event past the end,
        // so every generated day has a defined countdown.
        let mut maintenance_days = vec![0usize];
        while *maintenance_days.last().unwrap_or(&0) < self.rows {
            let last = *maintenance_days.last().unwrap_or(&0);
            maintenance_days.push(last + rng.gen_range(self.min_interval..=self.max_interval));
        }

        let mut records = Vec::with_capacity(self.rows);
        let mut event = 0;

        for day in 0..self.rows {
            while maintenance_days[event + 1] <= day {
                event += 1;
            }
            let since = day - maintenance_days[event];
            let until = maintenance_days[event + 1] - day;
            let cycle = (maintenance_days[event + 1] - maintenance_days[event]) as f64;
            let wear = since as f64 / cycle;

            let day_of_week = (day % 7) as f64;
            let weekend = day_of_week >= 5.0;

            let expected_stops = 0.3 + 3.0 * wear * wear;
            let times_down = Poisson::new(expected_stops)
                .map(|p| p.sample(&mut rng))
                .map_err(|e| Error::InvalidConfig(format!("downtime rate: {}", e)))?;
            let amount_down = if times_down > 0.0 {
                (0..times_down as usize)
                    .map(|_| rng.gen_range(5.0..(20.0 + 40.0 * wear)))
                    .sum::<f64>()
            } else {
                0.0
            };

            let mut produced = self.base_production * (1.0 - 0.25 * wear) + noise.sample(&mut rng);
            if weekend {
                produced *= 0.4;
            }
            produced -= amount_down * self.base_production / 1440.0;

            records.push(RawRecord {
                id: day as f64,
                day_of_week,
                maintenance_day: since as f64,
                produced_today: produced.max(0.0).round(),
                times_down_today: times_down,
                amount_down_today: amount_down.round(),
                days_to_maintenance: until as f64,
            });
        }

        info!(
            "Generated {} synthetic days with {} maintenance events (seed {})",
            records.len(),
            event + 1,
            self.seed
        );
        Ok(records)
    }
}

impl DataSource for SyntheticSource {
    fn pull(&self) -> Result<Array2<f64>> {
        Ok(records_to_matrix(&self.generate()?))
    }

    fn describe(&self) -> String {
        format!("synthetic:{} rows (seed {})", self.rows, self.seed)
    }
}
