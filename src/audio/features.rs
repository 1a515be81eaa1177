use serde::Serialize;

use super::bands::BandEnergyMap;
use super::stereo::WidthLabel;

/// The per-track report. Every field is independently optional: a feature
/// that failed leaves its fields as `None`, serialized as `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub true_peak_db: Option<f64>,
    /// Mean RMS of the loudest windows, dBFS.
    pub rms_db_peak: Option<f64>,
    /// Loudest-section integrated loudness, LUFS.
    pub integrated_loudness: Option<f64>,
    /// Crest factor of the loudest windows.
    pub dynamic_range_db: Option<f64>,
    pub tempo_bpm: Option<f64>,
    /// e.g. "F# minor"
    pub key: Option<String>,
    pub stereo_width_ratio: Option<f64>,
    pub stereo_width_label: Option<WidthLabel>,
    pub low_end_ratio: Option<f64>,
    pub low_end_description: Option<String>,
    pub band_energies: Option<BandEnergyMap>,
    pub spectral_balance_description: Option<String>,
    /// Issue labels joined with ", ".
    pub peak_issue: Option<String>,
    pub peak_issue_explanation: Option<String>,
    pub avg_transient_strength: Option<f64>,
    pub max_transient_strength: Option<f64>,
    pub transient_description: Option<String>,
}

impl AnalysisResult {
    /// Names of the fields that ended up null.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let checks = [
            ("true_peak_db", self.true_peak_db.is_none()),
            ("rms_db_peak", self.rms_db_peak.is_none()),
            ("integrated_loudness", self.integrated_loudness.is_none()),
            ("dynamic_range_db", self.dynamic_range_db.is_none()),
            ("tempo_bpm", self.tempo_bpm.is_none()),
            ("key", self.key.is_none()),
            ("stereo_width_ratio", self.stereo_width_ratio.is_none()),
            ("stereo_width_label", self.stereo_width_label.is_none()),
            ("low_end_ratio", self.low_end_ratio.is_none()),
            ("low_end_description", self.low_end_description.is_none()),
            ("band_energies", self.band_energies.is_none()),
            ("spectral_balance_description", self.spectral_balance_description.is_none()),
            ("avg_transient_strength", self.avg_transient_strength.is_none()),
            ("max_transient_strength", self.max_transient_strength.is_none()),
            ("transient_description", self.transient_description.is_none()),
        ];
        checks
            .into_iter()
            .filter_map(|(name, missing)| missing.then_some(name))
            .collect()
    }
}

/// Smoothed per-chunk dB levels for the waveform view.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RmsChunkSeries {
    pub values: Vec<f64>,
    pub chunk_duration_secs: f64,
}

impl RmsChunkSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
