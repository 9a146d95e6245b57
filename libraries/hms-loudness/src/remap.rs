//! Remapping onto the reference sone scale
//!
//! A raw model loudness is located in the calibration table with an
//! upper-bound search and linearly interpolated between the matching pair of
//! reference sone values.
//!
//! # Boundary policy
//!
//! | raw loudness                | result                              |
//! |-----------------------------|-------------------------------------|
//! | `<= table[0]`               | `0.0`                               |
//! | `>= table[n - 1]`           | `table[n - 1]` (uncorrected)        |
//! | inside `[lo, hi)`           | interpolated on the reference scale |
//!
//! The top clamp returns the uncorrected calibration value, unlike every
//! other branch, and is kept that way for compatibility with published
//! results.

use crate::calibration::CalibrationTable;
use crate::config::CalibrationConfig;
use crate::conversion::sone_to_phon;
use crate::error::{CalibrationError, Result};
use crate::REFERENCE_SONES;
use tracing::debug;

/// Index of the first element strictly greater than `value`
///
/// Elements equal to `value` sort before it, so for a non-decreasing slice
/// every element at an index below the result is `<= value`.
pub fn upper_bound(sorted: &[f64], value: f64) -> usize {
    let mut low = 0;
    let mut high = sorted.len();
    while low < high {
        let mid = low + (high - low) / 2;
        if value < sorted[mid] {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    low
}

/// Corrects raw hearing-model loudness against a calibration table
#[derive(Debug, Clone, PartialEq)]
pub struct LoudnessRemapper {
    reference_sones: Vec<f64>,
}

impl LoudnessRemapper {
    /// Create a remapper targeting the standard 20-point reference scale
    pub fn new() -> Self {
        Self::with_reference(REFERENCE_SONES.to_vec())
    }

    /// Create a remapper targeting a custom reference scale
    pub fn with_reference(reference_sones: Vec<f64>) -> Self {
        Self { reference_sones }
    }

    /// Create a remapper targeting the reference scale of a calibration
    /// config, matching tables built from the same config
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self::with_reference(config.reference_sones.clone())
    }

    pub fn reference_sones(&self) -> &[f64] {
        &self.reference_sones
    }

    /// Map a raw loudness onto the reference scale
    ///
    /// # Errors
    /// Returns [`CalibrationError::ConfigurationMismatch`] when the table and
    /// the reference scale differ in length.
    pub fn remap(&self, raw_loudness: f64, table: &CalibrationTable) -> Result<f64> {
        self.remap_values(raw_loudness, table.values())
    }

    /// Map a raw loudness and express the result in phon
    pub fn remap_phon(&self, raw_loudness: f64, table: &CalibrationTable) -> Result<f64> {
        self.remap(raw_loudness, table).map(sone_to_phon)
    }

    /// [`remap`](Self::remap) over bare table values
    pub fn remap_values(&self, raw_loudness: f64, table: &[f64]) -> Result<f64> {
        let n = table.len();
        if n != self.reference_sones.len() {
            return Err(CalibrationError::ConfigurationMismatch {
                expected: self.reference_sones.len(),
                actual: n,
            });
        }

        let position = upper_bound(table, raw_loudness);

        if position >= n {
            // Also covers an empty table and reference
            let top = table.last().copied().unwrap_or(0.0);
            debug!("{} sones at or above calibration top, clamped to {}", raw_loudness, top);
            return Ok(top);
        }
        if position == 0 || raw_loudness <= table[0] {
            debug!("{} sones at or below calibration floor", raw_loudness);
            return Ok(0.0);
        }

        Ok(interpolate(
            raw_loudness,
            (table[position - 1], table[position]),
            (
                self.reference_sones[position - 1],
                self.reference_sones[position],
            ),
        ))
    }
}

/// Linear map of `raw` from the uncorrected bracket onto the reference bracket
///
/// The offset is measured from the upper uncorrected bound and anchored to the
/// upper reference bound. A bracket without positive width returns the
/// reference bound whose uncorrected bound is nearer to `raw` (ties go low).
fn interpolate(raw: f64, (lo, hi): (f64, f64), (ref_lo, ref_hi): (f64, f64)) -> f64 {
    let old_range = hi - lo;
    // Also false for NaN
    if !(old_range > 0.0) {
        let nearer = if (raw - lo).abs() <= (hi - raw).abs() {
            ref_lo
        } else {
            ref_hi
        };
        debug!(
            "Degenerate bracket [{}, {}], using reference bound {}",
            lo, hi, nearer
        );
        return nearer;
    }

    let new_range = ref_hi - ref_lo;
    new_range * (raw - hi) / old_range + ref_hi
}

impl Default for LoudnessRemapper {
    fn default() -> Self {
        Self::new()
    }
}
