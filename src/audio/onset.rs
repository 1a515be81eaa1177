// Onset strength, transient statistics and tempo
//
// Onset envelope:
// 1. Mel power spectrogram (128 bands) from the shared STFT
// 2. Convert to dB: 10*log10(max(p, 1e-10)), floored at (max - 80 dB)
// 3. Positive first difference per band: max(0, S_t[b] - S_(t-1)[b])
// 4. Mean across bands -> one value per frame (frame 0 is 0)
//
// Tempo: autocorrelation of the envelope over lags spanning 30-300 BPM,
// weighted by a log-normal prior around 120 BPM, best lag refined by
// parabolic interpolation.

use super::spectrum::{DspBackend, Spectrogram};
use crate::error::{FeatureError, FeatureResult};

const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

const MIN_BPM: f64 = 30.0;
const MAX_BPM: f64 = 300.0;
const PRIOR_BPM: f64 = 120.0;
const PRIOR_OCTAVES: f64 = 1.0;

pub fn onset_envelope(backend: &DspBackend, spec: &Spectrogram) -> Vec<f32> {
    if spec.frames.is_empty() {
        return Vec::new();
    }
    let bank = backend.mel_filterbank(spec.sample_rate, spec.n_fft);

    let mut mel_db: Vec<Vec<f32>> = spec
        .frames
        .iter()
        .map(|frame| {
            bank.apply(frame)
                .into_iter()
                .map(|p| 10.0 * p.max(AMIN).log10())
                .collect()
        })
        .collect();

    let max_db = mel_db
        .iter()
        .flat_map(|f| f.iter().copied())
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = max_db - TOP_DB;
    for frame in &mut mel_db {
        for v in frame.iter_mut() {
            *v = v.max(floor);
        }
    }

    let bands = bank.len().max(1) as f32;
    let mut envelope = Vec::with_capacity(mel_db.len());
    envelope.push(0.0);
    for pair in mel_db.windows(2) {
        let flux: f32 = pair[1]
            .iter()
            .zip(&pair[0])
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
        envelope.push(flux / bands);
    }
    envelope
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransientStrength {
    pub average: f64,
    pub max: f64,
}

pub fn transient_strength(envelope: &[f32]) -> FeatureResult<TransientStrength> {
    if envelope.is_empty() {
        return Err(FeatureError::Degenerate("empty onset envelope"));
    }
    let sum: f64 = envelope.iter().map(|&v| v as f64).sum();
    let max = envelope.iter().map(|&v| v as f64).fold(0.0, f64::max);
    Ok(TransientStrength {
        average: sum / envelope.len() as f64,
        max,
    })
}

pub fn describe_transients(strength: TransientStrength) -> String {
    let quality = if strength.average < 1.5 {
        "very soft or buried"
    } else if strength.average < 3.5 {
        "balanced"
    } else if strength.average < 7.0 {
        "punchy and defined"
    } else {
        "sharp or overly spiky"
    };

    let note = if strength.max > 30.0 {
        "The track has extremely spiky transients — possibly over-accentuated drums or uncompressed attacks."
    } else if strength.max > 15.0 {
        "Transients are strong and pronounced — mix might feel punchy or aggressive."
    } else if strength.max < 5.0 {
        "Transients appear soft throughout — the mix may lack snap or attack."
    } else {
        "Transient range appears normal for most styles."
    };

    format!("Transients are {}. {}", quality, note)
}

/// Single best tempo estimate in BPM.
pub fn estimate_tempo(envelope: &[f32], frame_rate: f64) -> FeatureResult<f64> {
    let min_lag = (frame_rate * 60.0 / MAX_BPM).ceil().max(1.0) as usize;
    let max_lag = (frame_rate * 60.0 / MIN_BPM).floor() as usize;
    let max_lag = max_lag.min(envelope.len().saturating_sub(2));
    if max_lag <= min_lag + 1 {
        return Err(FeatureError::Degenerate("too short for tempo estimation"));
    }
    if envelope.iter().all(|&v| v <= 0.0) {
        return Err(FeatureError::Degenerate("no onsets"));
    }

    let env: Vec<f64> = envelope.iter().map(|&v| v as f64).collect();
    let autocorr = |lag: usize| -> f64 {
        let n = env.len() - lag;
        env[..n].iter().zip(&env[lag..]).map(|(a, b)| a * b).sum::<f64>() / n as f64
    };
    let ac: Vec<f64> = (0..=max_lag + 1).map(autocorr).collect();

    let prior = |lag: usize| -> f64 {
        let bpm = 60.0 * frame_rate / lag as f64;
        let z = (bpm / PRIOR_BPM).log2() / PRIOR_OCTAVES;
        (-0.5 * z * z).exp()
    };

    let best = (min_lag..=max_lag)
        .max_by(|&a, &b| (ac[a] * prior(a)).total_cmp(&(ac[b] * prior(b))))
        .ok_or(FeatureError::Degenerate("no tempo candidates"))?;
    if ac[best] <= 0.0 {
        return Err(FeatureError::Degenerate("flat autocorrelation"));
    }

    let (y0, y1, y2) = (ac[best - 1], ac[best], ac[best + 1]);
    let denom = y0 - 2.0 * y1 + y2;
    let shift = if denom.abs() > f64::EPSILON {
        (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };
    let lag = best as f64 + shift;
    Ok(60.0 * frame_rate / lag)
}
