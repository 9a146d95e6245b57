//! Integration tests for hms-loudness
//!
//! Tests include:
//! - Property-based tests with proptest
//! - Calibration sweeps with deterministic stub models
//! - End-to-end calibration and evaluation of pure tones

use hms_loudness::{
    phon_to_sone, sone_to_phon, CalibrationConfig, CalibrationError, CalibrationTable,
    CalibrationTableBuilder, HearingModel, LoudnessEvaluator, LoudnessRemapper, ModelOutput,
    PortError, PureToneGenerator, StimulusSource, PROBE_PHONS, REFERENCE_PRESSURE_PA,
    REFERENCE_SONES,
};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

// ========== Stub Collaborators ==========

/// Returns the same total-loudness series for every input
struct ConstantModel {
    total_loudness: Vec<f64>,
}

impl HearingModel for ConstantModel {
    fn score(&self, _signal: &[f64], _sample_rate: u32) -> Result<ModelOutput, PortError> {
        Ok(ModelOutput::new(
            vec![vec![0.0; 53]; self.total_loudness.len()],
            self.total_loudness.clone(),
        ))
    }
}

/// Measures the RMS level of the signal and reports a deliberately
/// over-estimated loudness, split into short blocks
struct LevelMeterModel {
    /// Multiplier applied to the ideal loudness
    gain: f64,
}

impl LevelMeterModel {
    fn level_db_spl(signal: &[f64]) -> f64 {
        let rms = (signal.iter().map(|s| s * s).sum::<f64>() / signal.len() as f64).sqrt();
        20.0 * (rms / REFERENCE_PRESSURE_PA).log10()
    }
}

impl HearingModel for LevelMeterModel {
    fn score(&self, signal: &[f64], _sample_rate: u32) -> Result<ModelOutput, PortError> {
        if signal.is_empty() {
            return Err("empty signal".into());
        }
        let level = Self::level_db_spl(signal);
        let loudness = (phon_to_sone(level) * self.gain).max(0.0);
        let blocks = (signal.len() / 4096).max(1);
        Ok(ModelOutput::new(vec![], vec![loudness; blocks]))
    }
}

/// Fails once a given probe level is requested
struct FailingStimulus {
    fail_at: f64,
}

impl StimulusSource for FailingStimulus {
    fn pure_tone(
        &self,
        _sample_rate: u32,
        _duration_secs: f64,
        level_db_spl: f64,
        _frequency_hz: f64,
    ) -> Result<Vec<f64>, PortError> {
        if level_db_spl == self.fail_at {
            return Err(format!("synthesizer offline at {level_db_spl} dB").into());
        }
        Ok(vec![0.0; 16])
    }
}

/// Short stimulus so sweeps stay fast
struct TinyStimulus;

impl StimulusSource for TinyStimulus {
    fn pure_tone(
        &self,
        _sample_rate: u32,
        _duration_secs: f64,
        _level_db_spl: f64,
        _frequency_hz: f64,
    ) -> Result<Vec<f64>, PortError> {
        Ok(vec![0.0; 8])
    }
}

/// Records every argument set it is asked for
#[derive(Default)]
struct RecordingStimulus {
    calls: Mutex<Vec<(u32, f64, f64, f64)>>,
}

impl StimulusSource for RecordingStimulus {
    fn pure_tone(
        &self,
        sample_rate: u32,
        duration_secs: f64,
        level_db_spl: f64,
        frequency_hz: f64,
    ) -> Result<Vec<f64>, PortError> {
        self.calls
            .lock()
            .unwrap()
            .push((sample_rate, duration_secs, level_db_spl, frequency_hz));
        Ok(vec![level_db_spl; 2])
    }
}

/// Records the sample rate of every scored signal
#[derive(Default)]
struct RecordingModel {
    sample_rates: Mutex<Vec<u32>>,
}

impl HearingModel for RecordingModel {
    fn score(&self, signal: &[f64], sample_rate: u32) -> Result<ModelOutput, PortError> {
        self.sample_rates.lock().unwrap().push(sample_rate);
        Ok(ModelOutput::new(vec![], vec![phon_to_sone(signal[0]).max(0.0)]))
    }
}

// ========== Helper Functions ==========

/// Generate a calibrated pure tone, one vector per channel
fn tone_channels(level_db_spl: f64, channels: usize) -> Vec<Vec<f64>> {
    let tone = PureToneGenerator::new()
        .generate(48000, 0.5, level_db_spl, 1000.0)
        .unwrap();
    vec![tone; channels]
}

fn cumulative_table(steps: Vec<f64>) -> Vec<f64> {
    let mut acc = 0.0;
    steps
        .into_iter()
        .map(|step| {
            acc += step;
            acc
        })
        .collect()
}

// ========== Property-Based Tests ==========

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// phon -> sone -> phon returns the input across both regimes
    #[test]
    fn phon_sone_round_trip(phon in -10.0_f64..=120.0_f64) {
        let back = sone_to_phon(phon_to_sone(phon));
        prop_assert!((back - phon).abs() < 1e-6, "{} phon came back as {}", phon, back);
    }

    /// phon_to_sone never decreases
    #[test]
    fn phon_to_sone_is_monotonic(a in -10.0_f64..120.0_f64, delta in 0.0_f64..20.0_f64) {
        prop_assert!(phon_to_sone(a) <= phon_to_sone(a + delta));
    }

    /// Below the top calibration point remapping never decreases
    #[test]
    fn remap_is_monotonic_inside_table(
        steps in prop::collection::vec(0.01_f64..5.0_f64, 20),
        a in 0.0_f64..1.0_f64,
        b in 0.0_f64..1.0_f64,
    ) {
        let values = cumulative_table(steps);
        let table = CalibrationTable::from_loudness(&values);
        let remapper = LoudnessRemapper::new();

        let top = values[values.len() - 1];
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        // Scale into [0, top) so the uncorrected top clamp is never hit
        let raw_low = low * top * 0.999_999;
        let raw_high = high * top * 0.999_999;

        let corrected_low = remapper.remap(raw_low, &table).unwrap();
        let corrected_high = remapper.remap(raw_high, &table).unwrap();
        prop_assert!(corrected_low <= corrected_high + 1e-12,
            "remap({}) = {} > remap({}) = {}", raw_low, corrected_low, raw_high, corrected_high);
    }

    /// With the reference scale as its own table, remapping is monotonic everywhere
    #[test]
    fn remap_identity_is_monotonic(a in -5.0_f64..100.0_f64, delta in 0.0_f64..50.0_f64) {
        let table = CalibrationTable::from_loudness(&REFERENCE_SONES);
        let remapper = LoudnessRemapper::new();
        let first = remapper.remap(a, &table).unwrap();
        let second = remapper.remap(a + delta, &table).unwrap();
        prop_assert!(first <= second + 1e-12);
        prop_assert!(first >= 0.0);
    }

    /// Output is never negative for a non-negative table
    #[test]
    fn remap_is_non_negative(
        steps in prop::collection::vec(0.0_f64..5.0_f64, 20),
        raw in 0.0_f64..200.0_f64,
    ) {
        let values = cumulative_table(steps);
        let table = CalibrationTable::from_loudness(&values);
        let corrected = LoudnessRemapper::new().remap(raw, &table).unwrap();
        prop_assert!(corrected >= 0.0);
        prop_assert!(corrected.is_finite());
    }
}

// ========== Conversion ==========

#[test]
fn test_conversion_anchor_points() {
    assert_eq!(phon_to_sone(40.0), 1.0);
    assert_eq!(phon_to_sone(50.0), 2.0);
    let expected = (30.0_f64 / 40.0).powf(2.86) - 0.005;
    assert!((phon_to_sone(30.0) - expected).abs() < 1e-12);
}

// ========== Calibration Sweep ==========

#[test]
fn test_constant_model_gives_constant_table() {
    let model = ConstantModel {
        total_loudness: vec![1.0, 2.0, 3.000_000_4, 4.0],
    };
    let table = CalibrationTableBuilder::new(TinyStimulus, model)
        .build()
        .unwrap();

    // mean = 2.5000001, rounded to 6 decimals
    assert_eq!(table.len(), 20);
    assert!(table.values().iter().all(|&v| v == 2.5));
}

#[test]
fn test_probe_order_preserved() {
    let table = CalibrationTableBuilder::new(PureToneGenerator::new(), LevelMeterModel { gain: 1.0 })
        .build()
        .unwrap();

    let phons: Vec<f64> = table.points().iter().map(|p| p.nominal_phon).collect();
    assert_eq!(phons, PROBE_PHONS.to_vec());
    assert!(table.is_monotonic());
}

#[test]
fn test_sweep_requests_standard_stimulus() {
    let stimulus = RecordingStimulus::default();
    let model = RecordingModel::default();
    let config = CalibrationConfig {
        parallel: false,
        ..Default::default()
    };
    CalibrationTableBuilder::with_config(&stimulus, &model, config)
        .build()
        .unwrap();

    let calls = stimulus.calls.lock().unwrap();
    let expected: Vec<(u32, f64, f64, f64)> = PROBE_PHONS
        .iter()
        .map(|&phon| (48000, 2.0, phon, 1000.0))
        .collect();
    assert_eq!(*calls, expected);

    let sample_rates = model.sample_rates.lock().unwrap();
    assert_eq!(sample_rates.len(), 20);
    assert!(sample_rates.iter().all(|&rate| rate == 48000));
}

#[test]
fn test_collaborator_failure_propagates() {
    let stimulus = FailingStimulus {
        fail_at: 45.0,
    };
    let config = CalibrationConfig {
        parallel: false,
        ..Default::default()
    };
    let builder = CalibrationTableBuilder::with_config(
        stimulus,
        ConstantModel {
            total_loudness: vec![1.0],
        },
        config,
    );

    match builder.build() {
        Err(CalibrationError::CollaboratorFailure {
            collaborator,
            probe_phon,
            source,
        }) => {
            assert_eq!(collaborator, "stimulus source");
            assert_eq!(probe_phon, Some(45.0));
            assert!(source.to_string().contains("synthesizer offline"));
        }
        other => panic!("expected collaborator failure, got {other:?}"),
    }
}

#[test]
fn test_model_failure_propagates_in_parallel() {
    // An empty stimulus makes the level meter fail on every probe
    struct EmptyStimulus;
    impl StimulusSource for EmptyStimulus {
        fn pure_tone(&self, _: u32, _: f64, _: f64, _: f64) -> Result<Vec<f64>, PortError> {
            Ok(Vec::new())
        }
    }

    let result = CalibrationTableBuilder::new(EmptyStimulus, LevelMeterModel { gain: 1.0 }).build();
    assert!(matches!(
        result,
        Err(CalibrationError::CollaboratorFailure {
            collaborator: "hearing model",
            ..
        })
    ));
}

#[test]
fn test_empty_model_output_is_an_error() {
    let model = ConstantModel {
        total_loudness: vec![],
    };
    let result = CalibrationTableBuilder::new(TinyStimulus, model).build();
    assert!(matches!(
        result,
        Err(CalibrationError::EmptyModelOutput { probe_phon: Some(_) })
    ));
}

// ========== Remapping ==========

#[test]
fn test_identity_case() {
    let scale = [0.0, 1.0, 2.0, 4.0, 8.0];
    let remapper = LoudnessRemapper::with_reference(scale.to_vec());
    let table = CalibrationTable::from_loudness(&scale);
    assert!((remapper.remap(3.0, &table).unwrap() - 3.0).abs() < 1e-12);
}

#[test]
fn test_floor_is_exactly_zero() {
    let values: Vec<f64> = REFERENCE_SONES.iter().map(|s| s * 1.3 + 0.01).collect();
    let table = CalibrationTable::from_loudness(&values);
    let remapper = LoudnessRemapper::new();

    for raw in [values[0], values[0] - 0.005, 0.0, -1.0] {
        assert_eq!(remapper.remap(raw, &table).unwrap(), 0.0, "raw {raw}");
    }
}

/// Pins the uncorrected top clamp: beyond the last calibration point the raw
/// table value is returned, not the reference value of 64 sones.
#[test]
fn test_top_clamp_returns_uncorrected_table_value() {
    let values: Vec<f64> = REFERENCE_SONES.iter().map(|s| s * 0.5).collect();
    let table = CalibrationTable::from_loudness(&values);
    let remapper = LoudnessRemapper::new();

    for raw in [32.0, 33.0, 1000.0] {
        assert_eq!(remapper.remap(raw, &table).unwrap(), 32.0);
    }
    // Just below the top the reference scale applies
    let below = remapper.remap(31.999, &table).unwrap();
    assert!(below > 63.0 && below < 64.0, "got {below}");
}

#[test]
fn test_adjacent_equal_entries() {
    let mut values = REFERENCE_SONES.to_vec();
    values[5] = values[4];
    let table = CalibrationTable::from_loudness(&values);
    let remapper = LoudnessRemapper::new();

    let corrected = remapper.remap(values[4], &table).unwrap();
    assert!(corrected.is_finite());
    // Ties move past the flat segment and land on its reference value
    assert!((corrected - REFERENCE_SONES[5]).abs() < 1e-12);
}

#[test]
fn test_mismatched_table_length() {
    let table = CalibrationTable::from_loudness(&[0.0, 1.0, 2.0, 4.0, 8.0]);
    let result = LoudnessRemapper::new().remap(3.0, &table);
    assert!(matches!(
        result,
        Err(CalibrationError::ConfigurationMismatch {
            expected: 20,
            actual: 5
        })
    ));
}

#[test]
fn test_configured_scale_reaches_remapper() {
    let config = CalibrationConfig {
        probe_phons: vec![0.0, 40.0, 80.0],
        reference_sones: vec![0.0, 1.0, 16.0],
        parallel: false,
        ..Default::default()
    };
    let builder = CalibrationTableBuilder::with_config(
        PureToneGenerator::new(),
        LevelMeterModel { gain: 4.0 },
        config.clone(),
    );
    let table = builder.build().unwrap();
    assert_eq!(table.len(), 3);

    // 1 sone is measured as 4 at 40 phon and corrected back to 1
    let remapper = builder.remapper();
    assert_eq!(remapper, LoudnessRemapper::from_config(&config));
    let corrected = remapper.remap(table.get(1).unwrap(), &table).unwrap();
    assert!((corrected - 1.0).abs() < 1e-9);

    assert!(LoudnessEvaluator::new(LevelMeterModel { gain: 4.0 }, Arc::new(table.clone())).is_err());
    let evaluator =
        LoudnessEvaluator::with_remapper(LevelMeterModel { gain: 4.0 }, Arc::new(table), remapper)
            .unwrap();
    let results = evaluator.evaluate(&tone_channels(40.0, 1), 48000).unwrap();
    assert!((results[0].corrected_sones - 1.0).abs() < 0.02);
}

// ========== End-to-End ==========

#[test]
fn test_calibration_corrects_biased_model() {
    let model = Arc::new(LevelMeterModel { gain: 1.5 });
    let table = CalibrationTableBuilder::new(PureToneGenerator::new(), Arc::clone(&model))
        .build()
        .unwrap();
    let evaluator = LoudnessEvaluator::new(Arc::clone(&model), Arc::new(table)).unwrap();

    for level in [30.0, 40.0, 60.0, 80.0] {
        let results = evaluator.evaluate(&tone_channels(level, 1), 48000).unwrap();
        let result = results[0];

        let expected = phon_to_sone(level);
        assert!(
            (result.raw_sones - expected * 1.5).abs() / (expected * 1.5) < 0.01,
            "{level} dB: raw {} sones",
            result.raw_sones
        );
        assert!(
            (result.corrected_sones - expected).abs() / expected < 0.02,
            "{level} dB: corrected {} sones, expected {expected}",
            result.corrected_sones
        );
        assert!((result.corrected_phons - level).abs() < 0.5);
    }
}

#[test]
fn test_stereo_channels_evaluated_independently() {
    let model = LevelMeterModel { gain: 1.0 };
    let table = CalibrationTableBuilder::new(PureToneGenerator::new(), &model)
        .build()
        .unwrap();
    let evaluator = LoudnessEvaluator::new(&model, Arc::new(table)).unwrap();

    let mut channels = tone_channels(50.0, 1);
    channels.extend(tone_channels(70.0, 1));
    let results = evaluator.evaluate(&channels, 48000).unwrap();

    assert_eq!(results.len(), 2);
    assert!((results[0].corrected_sones - 2.0).abs() < 0.05);
    assert!((results[1].corrected_sones - 8.0).abs() < 0.2);
}

#[test]
fn test_shared_table_concurrent_reads() {
    let table = Arc::new(CalibrationTable::from_loudness(&REFERENCE_SONES));
    let remapper = Arc::new(LoudnessRemapper::new());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let table = Arc::clone(&table);
            let remapper = Arc::clone(&remapper);
            std::thread::spawn(move || remapper.remap(f64::from(i) + 1.5, &table).unwrap())
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let corrected = handle.join().unwrap();
        assert!((corrected - (i as f64 + 1.5)).abs() < 1e-9);
    }
}
