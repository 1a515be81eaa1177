//! Key estimation from a time-averaged chroma vector.

use serde::Serialize;
use std::fmt;

use super::spectrum::Spectrogram;
use crate::error::{FeatureError, FeatureResult};

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Krumhansl-Kessler probe-tone profiles, tonic first.
pub const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
pub const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

const CHROMA_MIN_HZ: f64 = 32.7;
const CHROMA_MAX_HZ: f64 = 5000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Mode {
    Major,
    #[serde(rename = "minor")]
    Minor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MusicalKey {
    /// Pitch class of the tonic, 0 = C.
    pub tonic: usize,
    pub mode: Mode,
}

impl fmt::Display for MusicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "Major",
            Mode::Minor => "minor",
        };
        write!(f, "{} {}", NOTE_NAMES[self.tonic % 12], mode)
    }
}

/// 12-bin pitch-class energy, each frame max-normalised, then averaged over time.
pub fn chroma(spec: &Spectrogram) -> [f64; 12] {
    let bins: Vec<(usize, usize)> = (1..spec.bin_count())
        .filter_map(|k| {
            let f = spec.bin_frequency(k);
            if !(CHROMA_MIN_HZ..=CHROMA_MAX_HZ).contains(&f) {
                return None;
            }
            let midi = 69.0 + 12.0 * (f / 440.0).log2();
            Some((k, (midi.round() as i64).rem_euclid(12) as usize))
        })
        .collect();

    let mut mean = [0.0f64; 12];
    if spec.frames.is_empty() {
        return mean;
    }
    for frame in &spec.frames {
        let mut c = [0.0f64; 12];
        for &(k, pc) in &bins {
            c[pc] += frame[k] as f64;
        }
        let max = c.iter().copied().fold(0.0, f64::max);
        if max > 0.0 {
            for (m, v) in mean.iter_mut().zip(c) {
                *m += v / max;
            }
        }
    }
    let n = spec.frames.len() as f64;
    for m in &mut mean {
        *m /= n;
    }
    mean
}

/// Pearson correlation; `None` when either side has zero variance.
pub fn pearson(a: &[f64; 12], b: &[f64; 12]) -> Option<f64> {
    let mean_a = a.iter().sum::<f64>() / 12.0;
    let mean_b = b.iter().sum::<f64>() / 12.0;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some(cov / denom)
}

/// Profile rotated so its tonic sits on pitch class `shift`.
fn rotate(profile: &[f64; 12], shift: usize) -> [f64; 12] {
    let mut out = [0.0; 12];
    for (i, &v) in profile.iter().enumerate() {
        out[(i + shift) % 12] = v;
    }
    out
}

/// Best of the 24 rotated profiles. Major is tried before minor at each
/// tonic and only a strictly higher correlation replaces the leader, so exact
/// ties keep the first candidate in C..B, major-then-minor order.
pub fn detect_key(chroma: &[f64; 12]) -> FeatureResult<MusicalKey> {
    let mut best: Option<(f64, MusicalKey)> = None;
    for tonic in 0..12 {
        for (mode, profile) in [(Mode::Major, &MAJOR_PROFILE), (Mode::Minor, &MINOR_PROFILE)] {
            let Some(corr) = pearson(&rotate(profile, tonic), chroma) else {
                continue;
            };
            if best.map_or(true, |(c, _)| corr > c) {
                best = Some((corr, MusicalKey { tonic, mode }));
            }
        }
    }
    best.map(|(_, key)| key)
        .ok_or(FeatureError::Degenerate("flat chroma"))
}
