//! Collaborator ports
//!
//! The hearing model (outer/middle ear filter, auditory filter bank, specific
//! loudness, temporal integration) and the stimulus synthesis live outside
//! this crate. Calibration and remapping only see them through these traits.

use crate::error::PortError;

/// Output of one hearing-model run on a single channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOutput {
    /// Specific loudness indexed by `[block][band]`
    pub specific_loudness: Vec<Vec<f64>>,
    /// Total loudness per block in sones
    pub total_loudness: Vec<f64>,
}

impl ModelOutput {
    /// Create an output from its two series
    pub fn new(specific_loudness: Vec<Vec<f64>>, total_loudness: Vec<f64>) -> Self {
        Self {
            specific_loudness,
            total_loudness,
        }
    }

    /// Number of analysis blocks
    pub fn block_count(&self) -> usize {
        self.total_loudness.len()
    }

    /// Arithmetic mean of the total-loudness series
    ///
    /// Returns `None` when the model produced no blocks.
    pub fn mean_total_loudness(&self) -> Option<f64> {
        if self.total_loudness.is_empty() {
            return None;
        }
        let sum: f64 = self.total_loudness.iter().sum();
        Some(sum / self.total_loudness.len() as f64)
    }
}

/// Loudness-scoring pipeline
///
/// Implementers take a time signal in pascals for one channel and return the
/// per-block specific and total loudness.
pub trait HearingModel: Send + Sync {
    /// Score a single channel
    ///
    /// # Errors
    /// Any failure inside the model, passed through unchanged
    fn score(&self, signal: &[f64], sample_rate: u32) -> Result<ModelOutput, PortError>;

    /// Score every channel independently
    ///
    /// Channels are never mixed; output `i` belongs to input channel `i`.
    fn score_channels(
        &self,
        channels: &[Vec<f64>],
        sample_rate: u32,
    ) -> Result<Vec<ModelOutput>, PortError> {
        channels
            .iter()
            .map(|channel| self.score(channel, sample_rate))
            .collect()
    }
}

/// Source of calibration stimuli
pub trait StimulusSource: Send + Sync {
    /// Synthesize a pure tone
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `duration_secs` - Duration in seconds
    /// * `level_db_spl` - Sound pressure level in dB SPL (equal to phon at 1 kHz)
    /// * `frequency_hz` - Tone frequency in Hz
    fn pure_tone(
        &self,
        sample_rate: u32,
        duration_secs: f64,
        level_db_spl: f64,
        frequency_hz: f64,
    ) -> Result<Vec<f64>, PortError>;
}

impl<T: HearingModel + ?Sized> HearingModel for &T {
    fn score(&self, signal: &[f64], sample_rate: u32) -> Result<ModelOutput, PortError> {
        (**self).score(signal, sample_rate)
    }
}

impl<T: HearingModel + ?Sized> HearingModel for Box<T> {
    fn score(&self, signal: &[f64], sample_rate: u32) -> Result<ModelOutput, PortError> {
        (**self).score(signal, sample_rate)
    }
}

impl<T: HearingModel + ?Sized> HearingModel for std::sync::Arc<T> {
    fn score(&self, signal: &[f64], sample_rate: u32) -> Result<ModelOutput, PortError> {
        (**self).score(signal, sample_rate)
    }
}

impl<T: StimulusSource + ?Sized> StimulusSource for &T {
    fn pure_tone(
        &self,
        sample_rate: u32,
        duration_secs: f64,
        level_db_spl: f64,
        frequency_hz: f64,
    ) -> Result<Vec<f64>, PortError> {
        (**self).pure_tone(sample_rate, duration_secs, level_db_spl, frequency_hz)
    }
}

impl<T: StimulusSource + ?Sized> StimulusSource for Box<T> {
    fn pure_tone(
        &self,
        sample_rate: u32,
        duration_secs: f64,
        level_db_spl: f64,
        frequency_hz: f64,
    ) -> Result<Vec<f64>, PortError> {
        (**self).pure_tone(sample_rate, duration_secs, level_db_spl, frequency_hz)
    }
}

impl<T: StimulusSource + ?Sized> StimulusSource for std::sync::Arc<T> {
    fn pure_tone(
        &self,
        sample_rate: u32,
        duration_secs: f64,
        level_db_spl: f64,
        frequency_hz: f64,
    ) -> Result<Vec<f64>, PortError> {
        (**self).pure_tone(sample_rate, duration_secs, level_db_spl, frequency_hz)
    }
}
