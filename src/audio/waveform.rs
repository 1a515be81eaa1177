//! Tempo-adapted RMS levels for the waveform view.
//!
//! The signal is cut into back-to-back chunks of half a beat (clamped to
//! 0.2-0.6 s by default), each chunk's RMS is turned into calibrated dB, and
//! the sequence is run through a one-pole smoother.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::analysis::Analyzer;
use super::dynamics::amplitude_to_db;
use super::features::{round_to, RmsChunkSeries};
use super::onset::{estimate_tempo, onset_envelope};
use super::spectrum::{DspBackend, Spectrogram};
use super::windows::rms;
use crate::cancel::CancelToken;
use crate::config::{AnalysisConfig, WaveformConfig};
use crate::error::{AnalysisError, DecodeError, Result};

/// `60 / bpm * beat_fraction`, clamped to the configured chunk bounds.
/// A non-positive or non-finite BPM gives the longest chunk.
pub fn chunk_duration_from_bpm(bpm: f64, cfg: &WaveformConfig) -> f64 {
    if !bpm.is_finite() || bpm <= 0.0 {
        return cfg.max_chunk_secs;
    }
    let chunk = 60.0 / bpm * cfg.beat_fraction;
    chunk.min(cfg.max_chunk_secs).max(cfg.min_chunk_secs)
}

/// Calibrated dB level per full chunk, rounded to 2 decimals. A trailing partial chunk is dropped.
pub fn chunk_levels_db(samples: &[f32], samples_per_chunk: usize, calibration_db: f64) -> Vec<f64> {
    if samples_per_chunk == 0 {
        return Vec::new();
    }
    samples
        .par_chunks_exact(samples_per_chunk)
        .map(|chunk| round_to(amplitude_to_db(rms(chunk)) + calibration_db, 2))
        .collect()
}

/// `s[0] = x[0]`, `s[i] = alpha * s[i-1] + (1 - alpha) * x[i]`, each rounded to 2 decimals.
pub fn smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    let Some((&first, rest)) = values.split_first() else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(values.len());
    out.push(first);
    let mut prev = first;
    for &v in rest {
        prev = round_to(alpha * prev + (1.0 - alpha) * v, 2);
        out.push(prev);
    }
    out
}

/// Whole-number BPM of a mono signal, or `None` when no tempo can be found.
pub fn estimate_bpm(
    backend: &DspBackend,
    samples: &[f32],
    sample_rate: u32,
    cfg: &AnalysisConfig,
) -> Option<f64> {
    let spec = Spectrogram::compute(backend, samples, sample_rate, cfg.stft_size, cfg.stft_hop);
    let envelope = onset_envelope(backend, &spec);
    match estimate_tempo(&envelope, spec.frame_rate()) {
        Ok(bpm) => Some(bpm.round()),
        Err(err) => {
            log::warn!("tempo unavailable for chunk sizing: {}", err);
            None
        }
    }
}

/// Chunk series for an already decoded mono signal.
pub fn rms_chunk_series(samples: &[f32], sample_rate: u32, chunk_duration_secs: f64, cfg: &WaveformConfig) -> RmsChunkSeries {
    let samples_per_chunk = (sample_rate as f64 * chunk_duration_secs) as usize;
    let raw = chunk_levels_db(samples, samples_per_chunk, cfg.calibration_db);
    RmsChunkSeries {
        values: smooth(&raw, cfg.smoothing),
        chunk_duration_secs,
    }
}

/// Serialize the values alone as a JSON array of floats.
pub fn write_json(series: &RmsChunkSeries, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    serde_json::to_writer(&mut writer, &series.values)?;
    writer.flush()?;
    Ok(())
}

impl Analyzer<'_> {
    /// Decode `path` and compute its RMS-chunk series. Without a usable hint
    /// the chunk length is derived from the estimated tempo.
    pub fn rms_chunks(
        &self,
        path: &Path,
        chunk_duration_hint: Option<f64>,
        cancel: &CancelToken,
    ) -> Result<RmsChunkSeries> {
        self.check_config()?;
        let config = self.config();
        let buffer = self
            .decoder()
            .decode(path, config.decoder.target_sample_rate, true, cancel)
            .map_err(|err| match err {
                DecodeError::Cancelled => AnalysisError::Cancelled,
                other => AnalysisError::Decode(other),
            })?;
        buffer.validate()?;
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let samples = buffer.to_mono();
        let sr = buffer.sample_rate();
        let chunk = match chunk_duration_hint.filter(|d| d.is_finite() && *d > 0.0) {
            Some(d) => d,
            None => {
                let bpm = estimate_bpm(self.backend(), &samples, sr, &config.analysis)
                    .unwrap_or(config.waveform.default_bpm);
                let chunk = chunk_duration_from_bpm(bpm, &config.waveform);
                log::info!("Estimated BPM: {}, adaptive chunk: {:.3}s", bpm, chunk);
                chunk
            }
        };

        let series = rms_chunk_series(&samples, sr, chunk, &config.waveform);
        log::info!("{} chunks of {:.3}s", series.len(), chunk);
        Ok(series)
    }

    /// Adaptive chunk series for a reference track, written to `<out_dir>/<stem>_rms.json`.
    pub fn process_reference_track(&self, path: &Path, out_dir: &Path, cancel: &CancelToken) -> Result<PathBuf> {
        let series = self.rms_chunks(path, None, cancel)?;
        let out = reference_json_path(path, out_dir);
        write_json(&series, &out)?;
        log::info!("RMS JSON saved at {}", out.display());
        Ok(out)
    }
}

pub fn reference_json_path(track: &Path, out_dir: &Path) -> PathBuf {
    let stem = track
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string());
    out_dir.join(format!("{}_rms.json", stem))
}
