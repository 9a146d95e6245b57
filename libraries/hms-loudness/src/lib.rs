//! Loudness calibration for the Hearing Model of Sottek (ECMA-418-2)
//!
//! This crate provides:
//! - phon ↔ sone conversion
//! - Calibration sweeps of a hearing model with pure tones of known level
//! - Remapping of raw model loudness onto the reference sone scale
//! - Per-channel corrected loudness of arbitrary signals
//!
//! The hearing model itself (ear filtering, auditory filter bank, specific
//! loudness, temporal integration) is an external collaborator behind the
//! [`HearingModel`] trait.
//!
//! # Architecture
//!
//! ```text
//! Offline, once per model configuration:
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ Pure tones   │ ──► │ HearingModel │ ──► │ CalibrationTable │
//! │ 0..100 phon  │     └──────────────┘     └──────────────────┘
//! └──────────────┘                                   │
//!                                                    ▼
//! Per signal:                                ┌──────────────────┐
//! ┌──────────────┐     ┌──────────────┐     │ LoudnessRemapper │ ──► sones HMS
//! │ Signal       │ ──► │ HearingModel │ ──► └──────────────────┘
//! └──────────────┘     └──────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use hms_loudness::{CalibrationTableBuilder, LoudnessEvaluator, PureToneGenerator};
//! use std::sync::Arc;
//!
//! // Calibrate once
//! let table = CalibrationTableBuilder::new(PureToneGenerator::new(), &model).build()?;
//!
//! // Evaluate any number of signals
//! let evaluator = LoudnessEvaluator::new(&model, Arc::new(table))?;
//! for channel in evaluator.evaluate(&[signal], 48000)? {
//!     println!("{channel}");
//! }
//! ```

#![deny(unsafe_code)]

mod calibration;
mod config;
mod conversion;
mod error;
mod evaluator;
mod model;
mod remap;
mod stimulus;

pub use calibration::{
    round_to_decimals, CalibrationPoint, CalibrationTable, CalibrationTableBuilder,
    TABLE_DECIMALS,
};
pub use config::CalibrationConfig;
pub use conversion::{phon_to_sone, sone_to_phon, REFERENCE_PHON};
pub use error::{CalibrationError, PortError, Result};
pub use evaluator::{deinterleave, ChannelLoudness, LoudnessEvaluator};
pub use model::{HearingModel, ModelOutput, StimulusSource};
pub use remap::{upper_bound, LoudnessRemapper};
pub use stimulus::{PureToneGenerator, REFERENCE_PRESSURE_PA};

/// Sample rate the calibration is defined for
pub const CALIBRATION_SAMPLE_RATE: u32 = 48_000;

/// Frequency of the calibration tones (phon equals dB SPL here)
pub const CALIBRATION_FREQUENCY_HZ: f64 = 1000.0;

/// Duration of each calibration tone
pub const CALIBRATION_DURATION_SECS: f64 = 2.0;

/// Nominal phon level of each calibration probe
///
/// Extends 10 phon past the 10-90 phon range of ECMA-418-2 on both ends.
pub const PROBE_PHONS: [f64; 20] = [
    0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 65.0, 70.0, 75.0,
    80.0, 85.0, 90.0, 100.0,
];

/// Standards-correct loudness at each probe level, in sones
pub const REFERENCE_SONES: [f64; 20] = [
    0.000, 0.003, 0.019, 0.060, 0.138, 0.261, 0.439, 0.683, 1.000, 1.414, 2.000, 2.828, 4.000,
    5.657, 8.000, 11.314, 16.000, 22.627, 32.000, 64.000,
];
