//! Error types for loudness calibration and remapping

use thiserror::Error;

/// Result type for calibration operations
pub type Result<T> = std::result::Result<T, CalibrationError>;

/// Error raised by an external collaborator (stimulus source or hearing model)
pub type PortError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while building or applying a calibration
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// A stimulus source or hearing model failed
    #[error("{collaborator} failed{}: {source}", probe_suffix(.probe_phon))]
    CollaboratorFailure {
        /// Which collaborator raised the error
        collaborator: &'static str,
        /// Probe level being evaluated, if any
        probe_phon: Option<f64>,
        /// Originating cause
        #[source]
        source: PortError,
    },

    /// The hearing model returned no total-loudness blocks
    #[error("Hearing model produced an empty total loudness series{}", probe_suffix(.probe_phon))]
    EmptyModelOutput {
        /// Probe level being evaluated, if any
        probe_phon: Option<f64>,
    },

    /// Calibration table and reference scale lengths differ
    #[error("Calibration table has {actual} entries, reference scale expects {expected}")]
    ConfigurationMismatch {
        /// Length of the reference sone scale
        expected: usize,
        /// Length of the calibration table
        actual: usize,
    },

    /// Calibration is only defined at 48 kHz
    #[error("Unsupported sample rate: {0} Hz (calibration requires 48000 Hz)")]
    UnsupportedSampleRate(u32),

    /// Configuration values are out of range
    #[error("Invalid calibration config: {0}")]
    InvalidConfig(String),

    /// Stimulus parameters cannot be synthesized
    #[error("Invalid stimulus: {0}")]
    InvalidStimulus(String),

    /// Interleaved samples do not divide into whole frames
    #[error("Sample count {samples} is not divisible by channel count {channels}")]
    InvalidChannelLayout {
        /// Number of interleaved samples
        samples: usize,
        /// Requested channel count
        channels: usize,
    },

    /// Config source could not be read or deserialized
    #[error("Config error: {0}")]
    Config(String),

    /// Table (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CalibrationError {
    /// Wrap a stimulus source failure
    pub fn stimulus(probe_phon: Option<f64>, source: PortError) -> Self {
        Self::CollaboratorFailure {
            collaborator: "stimulus source",
            probe_phon,
            source,
        }
    }

    /// Wrap a hearing model failure
    pub fn hearing_model(probe_phon: Option<f64>, source: PortError) -> Self {
        Self::CollaboratorFailure {
            collaborator: "hearing model",
            probe_phon,
            source,
        }
    }
}

impl From<config::ConfigError> for CalibrationError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

fn probe_suffix(probe_phon: &Option<f64>) -> String {
    probe_phon
        .map(|phon| format!(" at {phon} phon"))
        .unwrap_or_default()
}
