//! Overlapping fixed-duration windows over a mono signal.
//!
//! For a buffer of `n` samples, window size `w` and hop `h` the series holds
//! exactly `(n - w) / h` values (integer division), and is empty when the
//! buffer does not exceed one window. Callers pick their own fallback for the
//! empty case instead of treating it as an error.

use std::ops::Range;

use rayon::prelude::*;

/// Window geometry in samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    pub size: usize,
    pub hop: usize,
}

impl WindowConfig {
    /// `size = round(sample_rate * duration)`, `hop = size * hop_fraction`, with `size > hop >= 1`.
    pub fn from_duration(sample_rate: u32, duration_secs: f64, hop_fraction: f64) -> Self {
        let size = ((sample_rate as f64 * duration_secs).round() as usize).max(2);
        let hop = ((size as f64 * hop_fraction) as usize).clamp(1, size - 1);
        Self { size, hop }
    }

    pub fn count(&self, len: usize) -> usize {
        if len <= self.size {
            0
        } else {
            (len - self.size) / self.hop
        }
    }

    pub fn ranges(&self, len: usize) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.count(len)).map(move |i| {
            let start = i * self.hop;
            start..start + self.size
        })
    }
}

/// Per-window scalar values, in window order.
pub type WindowSeries = Vec<f64>;

pub fn rms(block: &[f32]) -> f64 {
    if block.is_empty() {
        return 0.0;
    }
    let sum: f64 = block.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / block.len() as f64).sqrt()
}

pub fn peak(block: &[f32]) -> f64 {
    block.iter().map(|s| s.abs() as f64).fold(0.0, f64::max)
}

pub fn rms_series(samples: &[f32], config: WindowConfig) -> WindowSeries {
    map_windows(samples, config, rms)
}

pub fn peak_series(samples: &[f32], config: WindowConfig) -> WindowSeries {
    map_windows(samples, config, peak)
}

/// Apply `measure` to every window, in parallel, keeping window order.
pub fn map_windows<T, F>(samples: &[f32], config: WindowConfig, measure: F) -> Vec<T>
where
    T: Send,
    F: Fn(&[f32]) -> T + Sync,
{
    let ranges: Vec<Range<usize>> = config.ranges(samples.len()).collect();
    ranges
        .into_par_iter()
        .map(|r| measure(&samples[r]))
        .collect()
}

/// Indices of the `top_percent` highest values, at least one when the series is non-empty.
///
/// NaN compares below everything so it is never selected over a real value.
pub fn top_indices(series: &[f64], top_percent: f64) -> Vec<usize> {
    if series.is_empty() {
        return Vec::new();
    }
    let keep = ((series.len() as f64 * top_percent) as usize).clamp(1, series.len());
    let mut order: Vec<usize> = (0..series.len()).collect();
    order.sort_by(|&a, &b| {
        let (x, y) = (series[a], series[b]);
        match (x.is_nan(), y.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => x.total_cmp(&y),
        }
    });
    order.split_off(series.len() - keep)
}
