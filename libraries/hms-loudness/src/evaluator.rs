//! Corrected loudness of arbitrary signals
//!
//! Scores each channel with the hearing model, averages its total loudness
//! and remaps the mean against a shared calibration table.

use crate::calibration::CalibrationTable;
use crate::conversion::sone_to_phon;
use crate::error::{CalibrationError, Result};
use crate::model::HearingModel;
use crate::remap::LoudnessRemapper;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Loudness of one channel before and after correction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelLoudness {
    /// Channel index in the input
    pub channel: usize,
    /// Mean total loudness reported by the model, in sones
    pub raw_sones: f64,
    /// Loudness remapped onto the reference scale, in sones
    pub corrected_sones: f64,
    /// Corrected loudness expressed as a loudness level
    pub corrected_phons: f64,
}

impl ChannelLoudness {
    /// Uncorrected loudness expressed as a loudness level
    pub fn raw_phons(&self) -> f64 {
        sone_to_phon(self.raw_sones)
    }
}

impl fmt::Display for ChannelLoudness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Channel {}: {:.3} sones HMS ({:.1} phon), uncorrected {:.3} sones",
            self.channel, self.corrected_sones, self.corrected_phons, self.raw_sones
        )
    }
}

/// Evaluates signals against a calibrated hearing model
///
/// The calibration table is shared; any number of evaluators can read it
/// concurrently.
pub struct LoudnessEvaluator<M> {
    model: M,
    table: Arc<CalibrationTable>,
    remapper: LoudnessRemapper,
}

impl<M: HearingModel> LoudnessEvaluator<M> {
    /// Create an evaluator targeting the standard reference scale
    pub fn new(model: M, table: Arc<CalibrationTable>) -> Result<Self> {
        Self::with_remapper(model, table, LoudnessRemapper::new())
    }

    /// Create an evaluator with a custom remapper
    ///
    /// # Errors
    /// Fails when the table length does not match the remapper's scale.
    pub fn with_remapper(
        model: M,
        table: Arc<CalibrationTable>,
        remapper: LoudnessRemapper,
    ) -> Result<Self> {
        if table.len() != remapper.reference_sones().len() {
            return Err(CalibrationError::ConfigurationMismatch {
                expected: remapper.reference_sones().len(),
                actual: table.len(),
            });
        }
        Ok(Self {
            model,
            table,
            remapper,
        })
    }

    pub fn table(&self) -> &Arc<CalibrationTable> {
        &self.table
    }

    /// Evaluate channels given as separate sample vectors
    pub fn evaluate(&self, channels: &[Vec<f64>], sample_rate: u32) -> Result<Vec<ChannelLoudness>> {
        let outputs = self
            .model
            .score_channels(channels, sample_rate)
            .map_err(|e| CalibrationError::hearing_model(None, e))?;

        outputs
            .iter()
            .enumerate()
            .map(|(channel, output)| {
                let raw_sones = output
                    .mean_total_loudness()
                    .ok_or(CalibrationError::EmptyModelOutput { probe_phon: None })?;
                let corrected_sones = self.remapper.remap(raw_sones, &self.table)?;
                let loudness = ChannelLoudness {
                    channel,
                    raw_sones,
                    corrected_sones,
                    corrected_phons: sone_to_phon(corrected_sones),
                };
                debug!("{}", loudness);
                Ok(loudness)
            })
            .collect()
    }

    /// Evaluate interleaved samples (L R L R... for stereo)
    pub fn evaluate_interleaved(
        &self,
        samples: &[f64],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Vec<ChannelLoudness>> {
        let channels = deinterleave(samples, channel_count)?;
        self.evaluate(&channels, sample_rate)
    }
}

/// Split interleaved samples into one vector per channel
pub fn deinterleave(samples: &[f64], channel_count: usize) -> Result<Vec<Vec<f64>>> {
    if channel_count == 0 || samples.len() % channel_count != 0 {
        return Err(CalibrationError::InvalidChannelLayout {
            samples: samples.len(),
            channels: channel_count,
        });
    }

    let frames = samples.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in samples.chunks_exact(channel_count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    Ok(channels)
}
