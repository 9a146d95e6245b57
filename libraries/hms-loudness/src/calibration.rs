//! Calibration sweep
//!
//! Builds the table that maps raw hearing-model output onto the reference
//! sone scale. Each probe is a pure tone at a known phon level; the mean of
//! the model's total loudness for that tone becomes one table entry.
//!
//! ```text
//! probe phon ──► StimulusSource ──► HearingModel ──► mean(total) ──► round(6)
//! ```
//!
//! The table is built once per hearing-model configuration and shared
//! read-only afterwards.

use crate::config::CalibrationConfig;
use crate::error::{CalibrationError, Result};
use crate::model::{HearingModel, StimulusSource};
use crate::remap::LoudnessRemapper;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{info, warn};

/// Decimal digits kept for each mean loudness value
pub const TABLE_DECIMALS: i32 = 6;

/// One measurement of the calibration sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Level of the probe tone in phon
    pub nominal_phon: f64,
    /// Mean total loudness reported by the model, in sones
    pub mean_loudness: f64,
}

/// Mean model loudness at each probe level, in probe order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredTable", into = "StoredTable")]
pub struct CalibrationTable {
    points: Vec<CalibrationPoint>,
    /// `points[i].mean_loudness`, kept contiguous for the remap search
    values: Vec<f64>,
}

/// On-disk form of a table; the loudness column is rebuilt on load
#[derive(Serialize, Deserialize)]
struct StoredTable {
    points: Vec<CalibrationPoint>,
}

impl From<StoredTable> for CalibrationTable {
    fn from(stored: StoredTable) -> Self {
        Self::from_points(stored.points)
    }
}

impl From<CalibrationTable> for StoredTable {
    fn from(table: CalibrationTable) -> Self {
        Self {
            points: table.points,
        }
    }
}

impl CalibrationTable {
    /// Build a table from sweep measurements, kept in the given order
    pub fn from_points(points: Vec<CalibrationPoint>) -> Self {
        let values = points.iter().map(|p| p.mean_loudness).collect();
        Self { points, values }
    }

    /// Build a table from bare loudness values
    ///
    /// Nominal levels are set to the entry index; use this for fixtures and
    /// tables whose probe levels are irrelevant.
    pub fn from_loudness(values: &[f64]) -> Self {
        Self::from_points(
            values
                .iter()
                .enumerate()
                .map(|(i, &mean_loudness)| CalibrationPoint {
                    nominal_phon: i as f64,
                    mean_loudness,
                })
                .collect(),
        )
    }

    /// Sweep measurements
    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Mean loudness values in probe order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mean loudness at `index`
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the values never decrease with index
    ///
    /// Not checked on build; the sweep trusts the model to be monotonic.
    pub fn is_monotonic(&self) -> bool {
        self.values.windows(2).all(|w| w[0] <= w[1])
    }

    /// Write the table as JSON
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read a table written by [`save_json`](Self::save_json)
    pub fn load_json(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Runs the calibration sweep against a stimulus source and hearing model
///
/// # Example
///
/// ```ignore
/// use hms_loudness::{CalibrationConfig, CalibrationTableBuilder, PureToneGenerator};
///
/// let builder = CalibrationTableBuilder::new(PureToneGenerator::new(), my_model);
/// let table = builder.build()?;
/// assert_eq!(table.len(), 20);
/// ```
pub struct CalibrationTableBuilder<S, M> {
    stimulus: S,
    model: M,
    config: CalibrationConfig,
}

impl<S: StimulusSource, M: HearingModel> CalibrationTableBuilder<S, M> {
    /// Create a builder with the standard sweep (20 probes, 1 kHz, 2 s, 48 kHz)
    pub fn new(stimulus: S, model: M) -> Self {
        Self::with_config(stimulus, model, CalibrationConfig::default())
    }

    /// Create a builder with a custom sweep
    pub fn with_config(stimulus: S, model: M, config: CalibrationConfig) -> Self {
        Self {
            stimulus,
            model,
            config,
        }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Remapper targeting this sweep's reference scale
    pub fn remapper(&self) -> LoudnessRemapper {
        LoudnessRemapper::from_config(&self.config)
    }

    /// Run the sweep
    ///
    /// Probes are evaluated in parallel when enabled; the table is always in
    /// probe order.
    ///
    /// # Errors
    /// Returns the configuration error, or a collaborator failure. Sequential
    /// sweeps stop at the lowest failing probe; in parallel mode any failing
    /// probe may be the one reported. No partial table is produced.
    pub fn build(&self) -> Result<CalibrationTable> {
        self.config.validate()?;

        let points = if self.config.parallel {
            self.config
                .probe_phons
                .par_iter()
                .map(|&phon| self.measure(phon))
                .collect::<Result<Vec<_>>>()?
        } else {
            self.config
                .probe_phons
                .iter()
                .map(|&phon| self.measure(phon))
                .collect::<Result<Vec<_>>>()?
        };

        let table = CalibrationTable::from_points(points);
        if !table.is_monotonic() {
            warn!("Calibration table is not monotonic: {:?}", table.values());
        }
        Ok(table)
    }

    /// Measure the rounded mean model loudness for one probe level
    pub fn measure(&self, phon: f64) -> Result<CalibrationPoint> {
        let signal = self
            .stimulus
            .pure_tone(
                self.config.sample_rate,
                self.config.duration_secs,
                phon,
                self.config.probe_frequency_hz,
            )
            .map_err(|e| CalibrationError::stimulus(Some(phon), e))?;

        let output = self
            .model
            .score(&signal, self.config.sample_rate)
            .map_err(|e| CalibrationError::hearing_model(Some(phon), e))?;

        let mean = output
            .mean_total_loudness()
            .ok_or(CalibrationError::EmptyModelOutput {
                probe_phon: Some(phon),
            })?;
        let mean_loudness = round_to_decimals(mean, TABLE_DECIMALS);

        info!("Input {} dB, Output {} sones", phon, mean_loudness);

        Ok(CalibrationPoint {
            nominal_phon: phon,
            mean_loudness,
        })
    }
}

/// Round half away from zero to `decimals` digits
pub fn round_to_decimals(value: f64, decimals: i32) -> f64 {
    let scale = 10.0_f64.powi(decimals);
    (value * scale).round() / scale
}
