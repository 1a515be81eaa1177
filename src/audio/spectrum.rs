//! Short-time power spectrum, computed once per analysis and shared read-only
//! by the onset, key and band features.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub const MEL_BANDS: usize = 128;

/// Lazily built FFT plans, Hann windows and mel filterbanks.
///
/// Construct once at start-up and pass by reference; every cached entry is
/// immutable after it is built, so concurrent analyses only read.
pub struct DspBackend {
    planner: Mutex<FftPlanner<f32>>,
    plans: Mutex<HashMap<usize, Arc<dyn Fft<f32>>>>,
    windows: Mutex<HashMap<usize, Arc<Vec<f32>>>>,
    mel: Mutex<HashMap<(u32, usize), Arc<MelFilterbank>>>,
}

impl Default for DspBackend {
    fn default() -> Self {
        Self {
            planner: Mutex::new(FftPlanner::new()),
            plans: Mutex::default(),
            windows: Mutex::default(),
            mel: Mutex::default(),
        }
    }
}

impl DspBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance for callers that do not manage their own.
    pub fn shared() -> &'static DspBackend {
        static BACKEND: OnceLock<DspBackend> = OnceLock::new();
        BACKEND.get_or_init(DspBackend::new)
    }

    pub fn fft(&self, size: usize) -> Arc<dyn Fft<f32>> {
        let mut plans = lock(&self.plans);
        plans
            .entry(size)
            .or_insert_with(|| lock(&self.planner).plan_fft_forward(size))
            .clone()
    }

    pub fn hann(&self, size: usize) -> Arc<Vec<f32>> {
        lock(&self.windows)
            .entry(size)
            .or_insert_with(|| Arc::new(hann_window(size)))
            .clone()
    }

    pub fn mel_filterbank(&self, sample_rate: u32, n_fft: usize) -> Arc<MelFilterbank> {
        lock(&self.mel)
            .entry((sample_rate, n_fft))
            .or_insert_with(|| Arc::new(MelFilterbank::new(sample_rate, n_fft, MEL_BANDS)))
            .clone()
    }
}

// A poisoned cache only means another thread panicked while inserting; the map itself is intact.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Power spectrogram, one row of `n_fft / 2 + 1` bins per frame.
pub struct Spectrogram {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop: usize,
    pub frames: Vec<Vec<f32>>,
}

impl Spectrogram {
    /// Centred STFT: the signal is zero-padded by `n_fft / 2` on both sides so
    /// frame `t` is centred on sample `t * hop`.
    pub fn compute(
        backend: &DspBackend,
        samples: &[f32],
        sample_rate: u32,
        n_fft: usize,
        hop: usize,
    ) -> Self {
        let pad = n_fft / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let frame_count = if padded.len() < n_fft {
            0
        } else {
            1 + (padded.len() - n_fft) / hop
        };
        let fft = backend.fft(n_fft);
        let hann = backend.hann(n_fft);
        let bins = n_fft / 2 + 1;

        let frames = (0..frame_count)
            .into_par_iter()
            .map(|t| {
                let start = t * hop;
                let mut buffer: Vec<Complex<f32>> = padded[start..start + n_fft]
                    .iter()
                    .zip(hann.iter())
                    .map(|(&s, &w)| Complex::new(s * w, 0.0))
                    .collect();
                fft.process(&mut buffer);
                buffer[..bins].iter().map(|c| c.norm_sqr()).collect()
            })
            .collect();

        Self {
            sample_rate,
            n_fft,
            hop,
            frames,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / self.n_fft as f64
    }

    pub fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / self.hop as f64
    }

    /// Power summed over all frames, per bin.
    pub fn bin_totals(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.bin_count()];
        for frame in &self.frames {
            for (t, &p) in totals.iter_mut().zip(frame) {
                *t += p as f64;
            }
        }
        totals
    }
}

/// Triangular mel filters (HTK mel scale, Slaney area normalisation).
pub struct MelFilterbank {
    /// Per band: first bin and the weights starting there.
    bands: Vec<(usize, Vec<f32>)>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let hz_to_mel = |f: f64| 2595.0 * (1.0 + f / 700.0).log10();
        let mel_to_hz = |m: f64| 700.0 * (10f64.powf(m / 2595.0) - 1.0);

        let nyquist = sample_rate as f64 / 2.0;
        let max_mel = hz_to_mel(nyquist);
        let edges: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(max_mel * i as f64 / (n_mels + 1) as f64))
            .collect();
        let bins = n_fft / 2 + 1;
        let bin_hz = |k: usize| k as f64 * sample_rate as f64 / n_fft as f64;

        let bands = (0..n_mels)
            .map(|m| {
                let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
                let norm = 2.0 / (hi - lo);
                let mut first = None;
                let mut weights = Vec::new();
                for k in 0..bins {
                    let f = bin_hz(k);
                    let w = if f > lo && f <= center {
                        (f - lo) / (center - lo)
                    } else if f > center && f < hi {
                        (hi - f) / (hi - center)
                    } else {
                        0.0
                    };
                    if w > 0.0 {
                        first.get_or_insert(k);
                        weights.push((w * norm) as f32);
                    } else if first.is_some() {
                        break;
                    }
                }
                (first.unwrap_or(0), weights)
            })
            .collect();
        Self { bands }
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.bands
            .iter()
            .map(|(first, weights)| {
                weights
                    .iter()
                    .zip(&power[*first..])
                    .map(|(w, p)| w * p)
                    .sum()
            })
            .collect()
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn sine_energy_lands_in_its_bin() {
        let sr = 22050;
        let signal: Vec<f32> = (0..sr)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / sr as f32).sin())
            .collect();
        let spec = Spectrogram::compute(DspBackend::shared(), &signal, sr, 2048, 512);
        assert_eq!(spec.frames.len(), 1 + signal.len() / 512);
        let totals = spec.bin_totals();
        let (best, _) = totals
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!((spec.bin_frequency(best) - 1000.0).abs() < 11.0);
    }

    #[test]
    fn backend_reuses_plans() {
        let backend = DspBackend::new();
        let a = backend.fft(1024);
        let b = backend.fft(1024);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&backend.mel_filterbank(22050, 2048), &backend.mel_filterbank(22050, 2048)));
    }

    #[test]
    fn mel_bands_cover_spectrum() {
        let bank = MelFilterbank::new(22050, 2048, MEL_BANDS);
        assert_eq!(bank.len(), MEL_BANDS);
        let flat = vec![1.0f32; 1025];
        let out = bank.apply(&flat);
        assert!(out.iter().all(|&v| v >= 0.0));
        assert!(out.iter().filter(|&&v| v > 0.0).count() > MEL_BANDS / 2);
    }
}
