use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use super::bands::{spectral_balance, SpectralBalance};
use super::buffer::{peak_normalize, SampleBuffer};
use super::decode::Decoder;
use super::describe::{GenreBucket, RegionLevels, TABLES_V1};
use super::dynamics::{amplitude_to_db, dynamic_range, DynamicRange};
use super::features::{round_to, AnalysisResult};
use super::key::{chroma, detect_key, MusicalKey};
use super::loudness::loudest_section_lufs;
use super::onset::{describe_transients, estimate_tempo, onset_envelope, transient_strength, TransientStrength};
use super::peak::{classify_peak, sample_peak, true_peak_db, PeakIssueReport};
use super::spectrum::{DspBackend, Spectrogram};
use super::stereo::{stereo_width, StereoWidth};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{AnalysisError, DecodeError, FeatureError, FeatureResult, Result};

/// Decodes a file once and runs every feature over the shared buffers.
pub struct Analyzer<'a> {
    config: Config,
    backend: &'a DspBackend,
    decoder: Decoder,
}

impl<'a> Analyzer<'a> {
    pub fn new(config: Config, backend: &'a DspBackend) -> Self {
        let decoder = Decoder::from_config(&config.decoder);
        Self::with_decoder(config, backend, decoder)
    }

    pub fn with_decoder(config: Config, backend: &'a DspBackend, decoder: Decoder) -> Self {
        Self {
            config,
            backend,
            decoder,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn backend(&self) -> &'a DspBackend {
        self.backend
    }

    pub(crate) fn check_config(&self) -> Result<()> {
        self.config.validate().map_err(AnalysisError::InvalidConfig)
    }

    pub fn analyze(&self, path: &Path, genre: Option<&str>, cancel: &CancelToken) -> Result<AnalysisResult> {
        self.check_config()?;
        log::info!("Analyzing {}", path.display());
        let buffer = self
            .decoder
            .decode(path, self.config.decoder.target_sample_rate, false, cancel)
            .map_err(|err| match err {
                DecodeError::Cancelled => AnalysisError::Cancelled,
                other => AnalysisError::Decode(other),
            })?;
        self.analyze_buffer(&buffer, genre, cancel)
    }

    /// Everything after decoding. `buffer` keeps its original channels for stereo width.
    pub fn analyze_buffer(
        &self,
        buffer: &SampleBuffer,
        genre: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<AnalysisResult> {
        self.check_config()?;
        buffer.validate()?;
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let cfg = &self.config.analysis;
        let sr = buffer.sample_rate();
        let native = buffer.to_mono();
        let mono = if cfg.normalize {
            peak_normalize(&native)
        } else {
            native.clone()
        };

        log::info!("Pass 1: Spectrogram ({} samples, {}Hz)...", mono.len(), sr);
        let spec = Spectrogram::compute(self.backend, &mono, sr, cfg.stft_size, cfg.stft_hop);
        let envelope = onset_envelope(self.backend, &spec);

        log::info!("Pass 2: Features...");
        let mut true_peak: Option<f64> = None;
        let mut loudness: Option<Option<f64>> = None;
        let mut dynamics: Option<DynamicRange> = None;
        let mut transients: Option<TransientStrength> = None;
        let mut tempo: Option<f64> = None;
        let mut key: Option<MusicalKey> = None;
        let mut width: Option<StereoWidth> = None;
        let mut balance: Option<SpectralBalance> = None;

        rayon::scope(|s| {
            s.spawn(|_| true_peak = run_feature("true peak", cancel, || true_peak_db(&native, sr)));
            s.spawn(|_| {
                loudness = run_feature("loudness", cancel, || {
                    loudest_section_lufs(&mono, sr, cfg.loudness_window_secs, cfg.hop_fraction, cfg.top_percent)
                })
            });
            s.spawn(|_| {
                dynamics = run_feature("dynamic range", cancel, || {
                    dynamic_range(&mono, sr, cfg.dynamics_window_secs, cfg.hop_fraction, cfg.top_percent)
                })
            });
            s.spawn(|_| transients = run_feature("transients", cancel, || transient_strength(&envelope)));
            s.spawn(|_| {
                tempo = run_feature("tempo", cancel, || estimate_tempo(&envelope, spec.frame_rate()))
            });
            s.spawn(|_| key = run_feature("key", cancel, || detect_key(&chroma(&spec))));
            s.spawn(|_| width = run_feature("stereo width", cancel, || Ok(stereo_width(buffer))));
            s.spawn(|_| balance = run_feature("spectral balance", cancel, || Ok(spectral_balance(&spec))));
        });

        // Uses the un-normalised peak and the uncalibrated loud-window RMS.
        let loud_rms_db = dynamics.map(|d| d.rms_db);
        let peak_issues: Option<PeakIssueReport> = run_feature("peak issues", cancel, || {
            Ok(classify_peak(amplitude_to_db(sample_peak(&native)), loud_rms_db))
        })
        .flatten();

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let result = self.assemble(AssembleInput {
            genre,
            true_peak,
            loudness: loudness.flatten(),
            dynamics,
            transients,
            tempo,
            key,
            width,
            balance,
            peak_issues,
        });

        let missing = result.missing_fields();
        if missing.is_empty() {
            log::info!("Analysis complete");
        } else {
            log::info!("Analysis complete, unavailable: {}", missing.join(", "));
        }
        Ok(result)
    }

    fn assemble(&self, input: AssembleInput<'_>) -> AnalysisResult {
        let cal = &self.config.calibration;
        let bucket = GenreBucket::from_genre(input.genre);

        let bands = input.balance.map(|b| b.bands.rounded(4));
        let low_end_description = input
            .balance
            .map(|b| TABLES_V1.describe_low_end(bucket, input.genre, b.low_end_ratio));
        let spectral_balance_description = input.balance.zip(bands).map(|(b, rounded)| {
            let levels = RegionLevels::new(&rounded, b.low_end_ratio);
            TABLES_V1.describe_spectral_balance(bucket, input.genre, &levels)
        });

        let transients = input.transients.map(|t| TransientStrength {
            average: round_to(t.average, 4),
            max: round_to(t.max, 4),
        });

        AnalysisResult {
            true_peak_db: input.true_peak.map(|v| round_to(v, 2)),
            rms_db_peak: input.dynamics.map(|d| round_to(d.rms_db + cal.rms_offset_db, 2)),
            integrated_loudness: input
                .loudness
                .map(|v| round_to(v + cal.loudness_offset_db, 2)),
            dynamic_range_db: input
                .dynamics
                .map(|d| round_to(d.crest_factor_db + cal.dynamic_range_offset_db, 2)),
            tempo_bpm: input.tempo.map(|v| round_to(v, 2)),
            key: input.key.map(|k| k.to_string()),
            stereo_width_ratio: input.width.map(|w| round_to(w.ratio, 2)),
            stereo_width_label: input.width.map(|w| w.label),
            low_end_ratio: input.balance.map(|b| round_to(b.low_end_ratio, 2)),
            low_end_description,
            band_energies: bands,
            spectral_balance_description,
            peak_issue: input.peak_issues.as_ref().map(PeakIssueReport::label),
            peak_issue_explanation: input.peak_issues.map(|r| r.explanation),
            avg_transient_strength: transients.map(|t| t.average),
            max_transient_strength: transients.map(|t| t.max),
            transient_description: transients.map(describe_transients),
        }
    }
}

struct AssembleInput<'g> {
    genre: Option<&'g str>,
    true_peak: Option<f64>,
    loudness: Option<f64>,
    dynamics: Option<DynamicRange>,
    transients: Option<TransientStrength>,
    tempo: Option<f64>,
    key: Option<MusicalKey>,
    width: Option<StereoWidth>,
    balance: Option<SpectralBalance>,
    peak_issues: Option<PeakIssueReport>,
}

/// Run one feature in isolation: errors and panics are logged and become `None`.
pub(crate) fn run_feature<T>(
    name: &'static str,
    cancel: &CancelToken,
    feature: impl FnOnce() -> FeatureResult<T>,
) -> Option<T> {
    if cancel.is_cancelled() {
        log::debug!("Skipping {}: {}", name, FeatureError::Cancelled);
        return None;
    }
    match panic::catch_unwind(AssertUnwindSafe(feature)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            log::warn!("{} unavailable: {}", name, err);
            None
        }
        Err(payload) => {
            log::warn!("{} unavailable: {}", name, FeatureError::Panicked(panic_message(&*payload)));
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
