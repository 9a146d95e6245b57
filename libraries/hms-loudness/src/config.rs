//! Calibration configuration
//!
//! Probe levels, reference scale and stimulus parameters are plain data so a
//! calibration can be rebuilt (or tested) against alternate scales. Values can
//! be loaded from a TOML file and overridden by `HMS_`-prefixed environment
//! variables.

use crate::error::{CalibrationError, Result};
use crate::{
    CALIBRATION_DURATION_SECS, CALIBRATION_FREQUENCY_HZ, CALIBRATION_SAMPLE_RATE, PROBE_PHONS,
    REFERENCE_SONES,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Parameters of a calibration sweep and of the target sone scale
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,

    #[serde(default = "default_probe_frequency_hz")]
    pub probe_frequency_hz: f64,

    /// Nominal phon level of each probe, strictly increasing
    #[serde(default = "default_probe_phons")]
    pub probe_phons: Vec<f64>,

    /// Standards-correct sone value at each probe level
    #[serde(default = "default_reference_sones")]
    pub reference_sones: Vec<f64>,

    /// Evaluate probes on the rayon thread pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            duration_secs: default_duration_secs(),
            probe_frequency_hz: default_probe_frequency_hz(),
            probe_phons: default_probe_phons(),
            reference_sones: default_reference_sones(),
            parallel: default_parallel(),
        }
    }
}

impl CalibrationConfig {
    /// Load configuration from an optional TOML file and the environment
    ///
    /// Environment variables use the `HMS_` prefix, e.g. `HMS_PARALLEL=false`.
    /// Probe levels and the reference scale take comma-separated lists, e.g.
    /// `HMS_PROBE_PHONS=0,40,80`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            debug!("Loading calibration config from {:?}", path);
            settings = settings.add_source(config::File::from(path));
        }

        settings = settings.add_source(environment());

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before any stimulus is synthesized
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate != CALIBRATION_SAMPLE_RATE {
            return Err(CalibrationError::UnsupportedSampleRate(self.sample_rate));
        }

        if self.probe_phons.len() != self.reference_sones.len() {
            return Err(CalibrationError::ConfigurationMismatch {
                expected: self.reference_sones.len(),
                actual: self.probe_phons.len(),
            });
        }

        if self.probe_phons.len() < 2 {
            return Err(CalibrationError::InvalidConfig(format!(
                "at least 2 probe levels required, got {}",
                self.probe_phons.len()
            )));
        }

        if self.probe_phons.iter().any(|p| !p.is_finite()) {
            return Err(CalibrationError::InvalidConfig(
                "probe levels must be finite".to_string(),
            ));
        }

        if let Some(pair) = self.probe_phons.windows(2).find(|w| w[1] <= w[0]) {
            return Err(CalibrationError::InvalidConfig(format!(
                "probe levels must be strictly increasing ({} then {})",
                pair[0], pair[1]
            )));
        }

        if !(self.duration_secs.is_finite() && self.duration_secs > 0.0) {
            return Err(CalibrationError::InvalidConfig(format!(
                "duration must be positive, got {} s",
                self.duration_secs
            )));
        }

        if !(self.probe_frequency_hz.is_finite() && self.probe_frequency_hz > 0.0) {
            return Err(CalibrationError::InvalidConfig(format!(
                "probe frequency must be positive, got {} Hz",
                self.probe_frequency_hz
            )));
        }

        Ok(())
    }
}

/// `HMS_`-prefixed environment source
fn environment() -> config::Environment {
    config::Environment::with_prefix("HMS")
        .prefix_separator("_")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("probe_phons")
        .with_list_parse_key("reference_sones")
}

// Default values
fn default_sample_rate() -> u32 {
    CALIBRATION_SAMPLE_RATE
}

fn default_duration_secs() -> f64 {
    CALIBRATION_DURATION_SECS
}

fn default_probe_frequency_hz() -> f64 {
    CALIBRATION_FREQUENCY_HZ
}

fn default_probe_phons() -> Vec<f64> {
    PROBE_PHONS.to_vec()
}

fn default_reference_sones() -> Vec<f64> {
    REFERENCE_SONES.to_vec()
}

fn default_parallel() -> bool {
    true
}
