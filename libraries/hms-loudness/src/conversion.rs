//! Phon / sone conversion
//!
//! Loudness level (phon) and loudness (sone) after Fastl & Zwicker,
//! "Psychoacoustics: Facts and Models". Above 40 phon loudness doubles every
//! 10 phon; below it follows a power law with a small offset so that
//! 0 phon lands slightly under zero.
//!
//! # Regimes
//!
//! | phon      | sone                          |
//! |-----------|-------------------------------|
//! | `>= 40`   | `2^((phon - 40) / 10)`        |
//! | `< 40`    | `(phon / 40)^2.86 - 0.005`    |

/// Loudness level where both regimes meet (1 sone)
pub const REFERENCE_PHON: f64 = 40.0;

/// Exponent of the low-level power law
const LOW_LEVEL_EXPONENT: f64 = 2.86;

/// Offset subtracted in the low-level regime
const LOW_LEVEL_OFFSET: f64 = 0.005;

/// Convert a loudness level in phon to loudness in sone
///
/// `phon_to_sone(0.0)` evaluates to `-0.005`. Negative levels use a
/// sign-preserving power so the curve stays real and monotonic.
///
/// # Example
///
/// ```
/// use hms_loudness::phon_to_sone;
///
/// assert_eq!(phon_to_sone(40.0), 1.0);
/// assert_eq!(phon_to_sone(50.0), 2.0);
/// ```
pub fn phon_to_sone(phon: f64) -> f64 {
    if phon >= REFERENCE_PHON {
        2.0_f64.powf((phon - REFERENCE_PHON) / 10.0)
    } else {
        signed_powf(phon / REFERENCE_PHON, LOW_LEVEL_EXPONENT) - LOW_LEVEL_OFFSET
    }
}

/// Convert loudness in sone back to a loudness level in phon
///
/// Inverse of [`phon_to_sone`], split at 1 sone.
pub fn sone_to_phon(sone: f64) -> f64 {
    if sone >= 1.0 {
        REFERENCE_PHON + 10.0 * sone.log2()
    } else {
        REFERENCE_PHON * signed_powf(sone + LOW_LEVEL_OFFSET, LOW_LEVEL_EXPONENT.recip())
    }
}

fn signed_powf(base: f64, exponent: f64) -> f64 {
    base.signum() * base.abs().powf(exponent)
}
