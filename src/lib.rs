//! Mix analysis for uploaded recordings: peak, loudness, dynamics, transients,
//! tempo, key, stereo width and spectral balance, plus a tempo-adapted RMS
//! series for waveform display.
//!
//! [`analyze`] and [`rms_chunks`] run with the default [`Config`]; build an
//! [`Analyzer`] to supply your own configuration, decoder or cancel token.

pub mod audio;
pub mod cancel;
pub mod config;
pub mod error;

use std::path::Path;

pub use audio::analysis::Analyzer;
pub use audio::bands::{Band, BandEnergyMap};
pub use audio::buffer::SampleBuffer;
pub use audio::features::{AnalysisResult, RmsChunkSeries};
pub use audio::spectrum::DspBackend;
pub use cancel::CancelToken;
pub use config::Config;
pub use error::{AnalysisError, DecodeError, FeatureError, Result};

/// Analyze one file with the default configuration.
pub fn analyze(path: &Path, genre: Option<&str>) -> Result<AnalysisResult> {
    Analyzer::new(Config::default(), DspBackend::shared()).analyze(path, genre, &CancelToken::new())
}

/// RMS-chunk series for one file with the default configuration.
pub fn rms_chunks(path: &Path, chunk_duration_hint: Option<f64>) -> Result<RmsChunkSeries> {
    Analyzer::new(Config::default(), DspBackend::shared()).rms_chunks(path, chunk_duration_hint, &CancelToken::new())
}
