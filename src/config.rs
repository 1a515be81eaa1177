use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub waveform: WaveformConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecoderConfig {
    /// Every decoded buffer is resampled to this rate. `0` keeps the native rate.
    #[serde(default = "default_target_sample_rate")]
    pub target_sample_rate: u32,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_fallback_timeout_secs")]
    pub fallback_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_loudness_window_secs")]
    pub loudness_window_secs: f64,
    #[serde(default = "default_dynamics_window_secs")]
    pub dynamics_window_secs: f64,
    #[serde(default = "default_hop_fraction")]
    pub hop_fraction: f64,
    #[serde(default = "default_top_percent")]
    pub top_percent: f64,
    /// Peak-normalise the mono signal before everything except the peak figures.
    #[serde(default = "default_normalize")]
    pub normalize: bool,
    #[serde(default = "default_stft_size")]
    pub stft_size: usize,
    #[serde(default = "default_stft_hop")]
    pub stft_hop: usize,
}

/// Fixed offsets added to the published report figures.
#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_rms_offset_db")]
    pub rms_offset_db: f64,
    #[serde(default = "default_loudness_offset_db")]
    pub loudness_offset_db: f64,
    #[serde(default = "default_dynamic_range_offset_db")]
    pub dynamic_range_offset_db: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaveformConfig {
    #[serde(default = "default_beat_fraction")]
    pub beat_fraction: f64,
    #[serde(default = "default_min_chunk_secs")]
    pub min_chunk_secs: f64,
    #[serde(default = "default_max_chunk_secs")]
    pub max_chunk_secs: f64,
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    #[serde(default = "default_calibration_db")]
    pub calibration_db: f64,
    /// Used when tempo cannot be estimated.
    #[serde(default = "default_bpm")]
    pub default_bpm: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: default_target_sample_rate(),
            ffmpeg_path: default_ffmpeg_path(),
            fallback_timeout_secs: default_fallback_timeout_secs(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            loudness_window_secs: default_loudness_window_secs(),
            dynamics_window_secs: default_dynamics_window_secs(),
            hop_fraction: default_hop_fraction(),
            top_percent: default_top_percent(),
            normalize: default_normalize(),
            stft_size: default_stft_size(),
            stft_hop: default_stft_hop(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            rms_offset_db: default_rms_offset_db(),
            loudness_offset_db: default_loudness_offset_db(),
            dynamic_range_offset_db: default_dynamic_range_offset_db(),
        }
    }
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            beat_fraction: default_beat_fraction(),
            min_chunk_secs: default_min_chunk_secs(),
            max_chunk_secs: default_max_chunk_secs(),
            smoothing: default_smoothing(),
            calibration_db: default_calibration_db(),
            default_bpm: default_bpm(),
        }
    }
}

fn default_target_sample_rate() -> u32 { 22050 }
fn default_ffmpeg_path() -> String { "ffmpeg".into() }
fn default_fallback_timeout_secs() -> u64 { 120 }
fn default_loudness_window_secs() -> f64 { 1.0 }
fn default_dynamics_window_secs() -> f64 { 0.4 }
fn default_hop_fraction() -> f64 { 0.5 }
fn default_top_percent() -> f64 { 0.1 }
fn default_normalize() -> bool { true }
fn default_stft_size() -> usize { 2048 }
fn default_stft_hop() -> usize { 512 }
fn default_rms_offset_db() -> f64 { 1.0 }
fn default_loudness_offset_db() -> f64 { 4.5 }
fn default_dynamic_range_offset_db() -> f64 { 0.8 }
fn default_beat_fraction() -> f64 { 0.5 }
fn default_min_chunk_secs() -> f64 { 0.2 }
fn default_max_chunk_secs() -> f64 { 0.6 }
fn default_smoothing() -> f64 { 0.95 }
fn default_calibration_db() -> f64 { 0.82 }
fn default_bpm() -> f64 { 120.0 }

impl Config {
    /// Reject values the analysis cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        let a = &self.analysis;
        let w = &self.waveform;
        let checks = [
            (a.stft_size >= 2, "analysis.stft_size must be at least 2"),
            (a.stft_hop >= 1, "analysis.stft_hop must be at least 1"),
            (a.loudness_window_secs > 0.0, "analysis.loudness_window_secs must be positive"),
            (a.dynamics_window_secs > 0.0, "analysis.dynamics_window_secs must be positive"),
            (a.hop_fraction > 0.0 && a.hop_fraction <= 1.0, "analysis.hop_fraction must be in (0, 1]"),
            (a.top_percent > 0.0 && a.top_percent <= 1.0, "analysis.top_percent must be in (0, 1]"),
            (w.beat_fraction > 0.0, "waveform.beat_fraction must be positive"),
            (w.min_chunk_secs > 0.0, "waveform.min_chunk_secs must be positive"),
            (w.min_chunk_secs <= w.max_chunk_secs, "waveform.min_chunk_secs exceeds max_chunk_secs"),
            ((0.0..=1.0).contains(&w.smoothing), "waveform.smoothing must be in [0, 1]"),
            (w.default_bpm > 0.0, "waveform.default_bpm must be positive"),
            (self.decoder.fallback_timeout_secs > 0, "decoder.fallback_timeout_secs must be positive"),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, msg)) => Err((*msg).to_string()),
            None => Ok(()),
        }
    }
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    let cfg: Config = match toml::from_str(&content) {
        Ok(cfg) => cfg,
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            return None;
        }
    };
    match cfg.validate() {
        Ok(()) => Some(cfg),
        Err(msg) => {
            log::warn!("Invalid config {}: {}", path.display(), msg);
            None
        }
    }
}

/// Explicit path first, then `./zoundscope.toml`, then the per-user config locations.
pub fn discover_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("zoundscope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("zoundscope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("zoundscope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.decoder.target_sample_rate, 22050);
        assert_eq!(cfg.analysis.stft_size, 2048);
        assert!((cfg.waveform.smoothing - 0.95).abs() < 1e-12);
        assert!((cfg.calibration.loudness_offset_db - 4.5).abs() < 1e-12);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [decoder]
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"

            [waveform]
            smoothing = 0.8
            "#,
        )
        .unwrap();
        assert_eq!(cfg.decoder.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(cfg.decoder.fallback_timeout_secs, 120);
        assert!((cfg.waveform.smoothing - 0.8).abs() < 1e-12);
        assert!((cfg.waveform.max_chunk_secs - 0.6).abs() < 1e-12);
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases: [fn(&mut Config); 5] = [
            |c| c.analysis.stft_hop = 0,
            |c| c.analysis.stft_size = 0,
            |c| c.analysis.top_percent = 0.0,
            |c| c.waveform.smoothing = 1.5,
            |c| c.waveform.min_chunk_secs = 0.8,
        ];
        for tweak in cases {
            let mut cfg = Config::default();
            tweak(&mut cfg);
            assert!(cfg.validate().is_err(), "{:?}", cfg);
        }
    }

    #[test]
    fn invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zoundscope.toml");
        std::fs::write(&path, "[analysis]\nstft_hop = 0\n").unwrap();
        assert!(load_config(&path).is_none());

        std::fs::write(&path, "[analysis]\nstft_hop = 256\n").unwrap();
        assert_eq!(load_config(&path).unwrap().analysis.stft_hop, 256);
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = Path::new("/tmp/custom.toml");
        assert_eq!(discover_config_path(Some(explicit)), Some(explicit.to_path_buf()));
    }
}
