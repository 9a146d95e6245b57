//! Pure-tone stimulus synthesis
//!
//! Generates calibrated sine waves in pascals for the calibration sweep.
//! The RMS pressure of a tone at `L` dB SPL is `p_ref * 10^(L / 20)` with
//! `p_ref = 20 µPa`; the peak amplitude is `√2` times that.

use crate::error::{CalibrationError, PortError};
use crate::model::StimulusSource;
use std::f64::consts::{PI, SQRT_2};

/// Reference sound pressure in pascals (0 dB SPL)
pub const REFERENCE_PRESSURE_PA: f64 = 2e-5;

/// Sine generator calibrated in dB SPL
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PureToneGenerator {
    /// Starting phase in radians
    phase: f64,
}

impl PureToneGenerator {
    /// Create a generator starting at zero phase
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator with a custom starting phase
    pub fn with_phase(phase: f64) -> Self {
        Self { phase }
    }

    /// Peak amplitude in pascals for a level in dB SPL
    pub fn peak_amplitude(level_db_spl: f64) -> f64 {
        SQRT_2 * REFERENCE_PRESSURE_PA * 10.0_f64.powf(level_db_spl / 20.0)
    }

    /// Generate a tone, validating the parameters
    ///
    /// # Errors
    /// Returns [`CalibrationError::InvalidStimulus`] for a zero sample rate,
    /// a non-positive duration, or a frequency at or above Nyquist
    pub fn generate(
        &self,
        sample_rate: u32,
        duration_secs: f64,
        level_db_spl: f64,
        frequency_hz: f64,
    ) -> Result<Vec<f64>, CalibrationError> {
        if sample_rate == 0 {
            return Err(CalibrationError::InvalidStimulus(
                "sample rate must be positive".to_string(),
            ));
        }
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            return Err(CalibrationError::InvalidStimulus(format!(
                "duration must be positive, got {duration_secs} s"
            )));
        }
        let nyquist = f64::from(sample_rate) / 2.0;
        if frequency_hz <= 0.0 || !(..nyquist).contains(&frequency_hz) {
            return Err(CalibrationError::InvalidStimulus(format!(
                "frequency {frequency_hz} Hz outside (0, {nyquist}) Hz"
            )));
        }
        if !level_db_spl.is_finite() {
            return Err(CalibrationError::InvalidStimulus(format!(
                "level must be finite, got {level_db_spl} dB SPL"
            )));
        }

        let amplitude = Self::peak_amplitude(level_db_spl);
        let num_samples = (f64::from(sample_rate) * duration_secs) as usize;
        let omega = 2.0 * PI * frequency_hz / f64::from(sample_rate);

        Ok((0..num_samples)
            .map(|i| amplitude * (omega * i as f64 + self.phase).sin())
            .collect())
    }
}

impl StimulusSource for PureToneGenerator {
    fn pure_tone(
        &self,
        sample_rate: u32,
        duration_secs: f64,
        level_db_spl: f64,
        frequency_hz: f64,
    ) -> Result<Vec<f64>, PortError> {
        Ok(self.generate(sample_rate, duration_secs, level_db_spl, frequency_hz)?)
    }
}
