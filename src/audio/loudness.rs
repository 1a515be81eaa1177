//! Loudest-section integrated loudness.
//!
//! BS.1770 gated loudness (via `ebur128`) is measured on 1 s windows with 50%
//! overlap. The loudest `top_percent` windows are then joined sample for sample
//! and metered again, giving "how loud is the loud part" rather than a
//! whole-track average.

use ebur128::{EbuR128, Mode};

use super::windows::{map_windows, top_indices, WindowConfig};
use crate::error::FeatureResult;

/// Reported in place of -inf when every gating block is below the absolute gate.
pub const LOUDNESS_FLOOR_LUFS: f64 = -70.0;

/// Integrated loudness of a mono block in LUFS; -inf for silence.
pub fn integrated_loudness(samples: &[f32], sample_rate: u32) -> FeatureResult<f64> {
    let mut meter = EbuR128::new(1, sample_rate, Mode::I)?;
    meter.add_frames_f32(samples)?;
    Ok(meter.loudness_global()?)
}

/// Per-window loudness scores. Windows the meter rejects score -inf.
pub fn loudness_series(samples: &[f32], sample_rate: u32, config: WindowConfig) -> Vec<f64> {
    map_windows(samples, config, |block| {
        integrated_loudness(block, sample_rate).unwrap_or(f64::NEG_INFINITY)
    })
}

/// `Ok(None)` when the signal is shorter than one window.
pub fn loudest_section_lufs(
    samples: &[f32],
    sample_rate: u32,
    window_secs: f64,
    hop_fraction: f64,
    top_percent: f64,
) -> FeatureResult<Option<f64>> {
    let config = WindowConfig::from_duration(sample_rate, window_secs, hop_fraction);
    let scores = loudness_series(samples, sample_rate, config);
    if scores.is_empty() {
        log::debug!(
            "Loudness: {} samples shorter than one {}-sample window",
            samples.len(),
            config.size
        );
        return Ok(None);
    }

    let selected = top_indices(&scores, top_percent);
    let mut combined = Vec::with_capacity(selected.len() * config.size);
    for &i in &selected {
        let start = i * config.hop;
        combined.extend_from_slice(&samples[start..start + config.size]);
    }

    let lufs = integrated_loudness(&combined, sample_rate)?;
    log::debug!(
        "Loudness: {} of {} windows selected, {:.2} LUFS",
        selected.len(),
        scores.len(),
        lufs
    );
    Ok(Some(if lufs.is_finite() {
        lufs
    } else {
        LOUDNESS_FLOOR_LUFS
    }))
}
