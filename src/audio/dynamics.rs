use super::windows::{peak_series, rms_series, top_indices, WindowConfig};
use crate::error::{FeatureError, FeatureResult};

/// Floor added to linear amplitudes before taking the log.
pub const AMPLITUDE_EPSILON: f64 = 1e-9;

/// Silence in dB: what the epsilon floor resolves to.
pub const SILENCE_DB: f64 = -180.0;

pub fn amplitude_to_db(amplitude: f64) -> f64 {
    20.0 * (amplitude + AMPLITUDE_EPSILON).log10()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DynamicRange {
    /// Mean RMS of the loudest windows, dBFS.
    pub rms_db: f64,
    /// Mean peak of the same windows, dBFS.
    pub peak_db: f64,
    /// `peak_db - rms_db`.
    pub crest_factor_db: f64,
}

/// Crest factor of the loudest `top_percent` windows (ranked by RMS).
///
/// A signal shorter than one window has no measurement.
pub fn dynamic_range(
    samples: &[f32],
    sample_rate: u32,
    window_secs: f64,
    hop_fraction: f64,
    top_percent: f64,
) -> FeatureResult<DynamicRange> {
    let config = WindowConfig::from_duration(sample_rate, window_secs, hop_fraction);
    let rms = rms_series(samples, config);
    if rms.is_empty() {
        return Err(FeatureError::Degenerate("shorter than one dynamics window"));
    }
    let peaks = peak_series(samples, config);

    let selected = top_indices(&rms, top_percent);
    let n = selected.len() as f64;
    let avg_rms = selected.iter().map(|&i| rms[i]).sum::<f64>() / n;
    let avg_peak = selected.iter().map(|&i| peaks[i]).sum::<f64>() / n;

    let rms_db = amplitude_to_db(avg_rms);
    let peak_db = amplitude_to_db(avg_peak);
    Ok(DynamicRange {
        rms_db,
        peak_db,
        crest_factor_db: peak_db - rms_db,
    })
}
