use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use zoundscope::audio::decode::{DecodePath, DecodeRequest, Decoder, SymphoniaDecoder};
use zoundscope::audio::stereo::WidthLabel;
use zoundscope::{
    AnalysisError, Analyzer, CancelToken, Config, DecodeError, DspBackend, SampleBuffer,
};

const SR: u32 = 22050;

/// 440 Hz tone with a short 2 kHz click on every beat at 120 BPM.
fn test_signal(secs: f32) -> Vec<f32> {
    let n = (secs * SR as f32) as usize;
    let beat = SR as usize / 2;
    let click_len = SR as usize / 50;
    (0..n)
        .map(|i| {
            let t = i as f32 / SR as f32;
            let mut s = 0.3 * (2.0 * PI * 440.0 * t).sin();
            let pos = i % beat;
            if pos < click_len {
                let decay = (-(pos as f32) / (click_len as f32 / 4.0)).exp();
                s += 0.5 * decay * (2.0 * PI * 2000.0 * t).sin();
            }
            s
        })
        .collect()
}

fn write_wav(path: &Path, left: &[f32], right: Option<&[f32]>) {
    let spec = hound::WavSpec {
        channels: if right.is_some() { 2 } else { 1 },
        sample_rate: SR,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for (i, &l) in left.iter().enumerate() {
        writer.write_sample((l * i16::MAX as f32) as i16).unwrap();
        if let Some(right) = right {
            writer.write_sample((right[i] * i16::MAX as f32) as i16).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn config_without_ffmpeg() -> Config {
    let mut config = Config::default();
    config.decoder.ffmpeg_path = "/nonexistent/ffmpeg".into();
    config
}

#[test]
fn stereo_wav_with_identical_channels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mix.wav");
    let signal = test_signal(8.0);
    write_wav(&path, &signal, Some(&signal));

    let result = zoundscope::analyze(&path, Some("pop")).unwrap();

    assert_eq!(result.stereo_width_ratio, Some(0.0));
    assert_eq!(result.stereo_width_label, Some(WidthLabel::Narrow));
    assert!(result.true_peak_db.is_some_and(|p| p < 0.5 && p > -6.0));
    assert!(result.integrated_loudness.is_some());
    assert!(result.rms_db_peak.is_some());
    assert!(result.dynamic_range_db.is_some_and(|d| d > 0.0));
    assert!(result.tempo_bpm.is_some());
    assert!(result.key.is_some());
    assert!(result.avg_transient_strength.is_some());

    let bands = result.band_energies.unwrap();
    assert!(bands.iter().all(|(_, r)| (0.0..=1.0).contains(&r)));
    assert!(result.low_end_description.is_some());
    assert!(result.spectral_balance_description.is_some());

    let json = serde_json::to_value(
        zoundscope::analyze(&path, None).unwrap(),
    )
    .unwrap();
    assert!(json["band_energies"]["low-mid"].is_number());
    assert_eq!(
        json["spectral_balance_description"],
        "Spectral balance analyzed, but genre could not be matched precisely."
    );
}

#[test]
fn mono_wav_is_narrow() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.wav");
    write_wav(&path, &test_signal(4.0), None);

    let result = zoundscope::analyze(&path, None).unwrap();
    assert_eq!(result.stereo_width_ratio, Some(0.0));
    assert_eq!(result.stereo_width_label, Some(WidthLabel::Narrow));
}

#[test]
fn silent_wav_does_not_fail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("silence.wav");
    write_wav(&path, &vec![0.0; SR as usize * 4], None);

    let result = zoundscope::analyze(&path, Some("metal")).unwrap();
    for level in [
        result.true_peak_db,
        result.rms_db_peak,
        result.integrated_loudness,
        result.dynamic_range_db,
    ] {
        assert!(level.unwrap().is_finite());
    }
    assert_eq!(result.tempo_bpm, None);
}

#[test]
fn undecodable_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.mp3");
    std::fs::write(&path, vec![0x5au8; 4096]).unwrap();

    let analyzer = Analyzer::new(config_without_ffmpeg(), DspBackend::shared());
    let err = analyzer
        .analyze(&path, None, &CancelToken::new())
        .unwrap_err();
    match err {
        AnalysisError::Decode(DecodeError::Unrecoverable { primary, fallback, .. }) => {
            assert!(matches!(*fallback, DecodeError::Spawn { .. }), "{:?}", fallback);
            assert!(!matches!(*primary, DecodeError::Spawn { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

/// Reads one decimal sample per line. No container probe recognises plain text.
struct TextPcm;

impl DecodePath for TextPcm {
    fn name(&self) -> &'static str {
        "text-pcm"
    }

    fn decode(&self, path: &Path, _request: &DecodeRequest) -> Result<SampleBuffer, DecodeError> {
        let text = std::fs::read_to_string(path).map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let samples: Vec<f32> = text.lines().filter_map(|l| l.trim().parse().ok()).collect();
        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(SampleBuffer::mono(samples, SR))
    }
}

fn write_text_pcm(dir: &Path) -> PathBuf {
    let path = dir.join("capture.pcm");
    let text: String = test_signal(6.0)
        .iter()
        .map(|s| format!("{:.6}\n", s))
        .collect();
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn fallback_path_still_gives_a_full_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_text_pcm(dir.path());

    let decoder = Decoder::new(Box::new(SymphoniaDecoder), Box::new(TextPcm));
    let analyzer = Analyzer::with_decoder(Config::default(), DspBackend::shared(), decoder);
    let result = analyzer.analyze(&path, Some("electronic"), &CancelToken::new()).unwrap();

    assert!(result.true_peak_db.is_some());
    assert!(result.integrated_loudness.is_some());
    assert!(result.key.is_some());
    assert!(result.band_energies.is_some());
    assert!(result.transient_description.is_some());
}

#[cfg(unix)]
#[test]
fn ffmpeg_fallback_gives_a_full_stereo_report() {
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;
    use zoundscope::audio::ffmpeg::FfmpegDecoder;

    let dir = tempfile::tempdir().unwrap();
    let left = test_signal(6.0);
    let right: Vec<f32> = left
        .iter()
        .enumerate()
        .map(|(i, &l)| 0.5 * l + 0.3 * (2.0 * PI * 660.0 * i as f32 / SR as f32).sin())
        .collect();
    let pcm_path = dir.path().join("decoded.f32");
    let bytes: Vec<u8> = left
        .iter()
        .zip(&right)
        .flat_map(|(l, r)| l.to_le_bytes().into_iter().chain(r.to_le_bytes()))
        .collect();
    std::fs::write(&pcm_path, bytes).unwrap();

    let fake = dir.path().join("fake-ffmpeg");
    std::fs::write(&fake, format!("#!/bin/sh\nexec cat '{}'\n", pcm_path.display())).unwrap();
    std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

    // Not a container symphonia can probe.
    let upload = dir.path().join("upload.m4a");
    std::fs::write(&upload, vec![0x5au8; 4096]).unwrap();

    let decoder = Decoder::new(
        Box::new(SymphoniaDecoder),
        Box::new(FfmpegDecoder::new(&fake, Duration::from_secs(10))),
    );
    let analyzer = Analyzer::with_decoder(Config::default(), DspBackend::shared(), decoder);
    let result = analyzer.analyze(&upload, Some("pop"), &CancelToken::new()).unwrap();

    assert!(result.missing_fields().is_empty(), "{:?}", result.missing_fields());
    assert!(result.stereo_width_ratio.is_some_and(|w| w > 0.0));
    assert_ne!(result.stereo_width_label, Some(WidthLabel::Narrow));
}

#[test]
fn cancelled_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.wav");
    write_wav(&path, &test_signal(2.0), None);

    let cancel = CancelToken::new();
    cancel.cancel();
    let analyzer = Analyzer::new(Config::default(), DspBackend::shared());
    assert!(matches!(
        analyzer.analyze(&path, None, &cancel),
        Err(AnalysisError::Cancelled)
    ));
}

#[test]
fn rms_chunks_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.wav");
    let signal = test_signal(5.0);
    write_wav(&path, &signal, None);

    let series = zoundscope::rms_chunks(&path, Some(0.25)).unwrap();
    let per_chunk = (SR as f64 * 0.25) as usize;
    assert_eq!(series.len(), signal.len() / per_chunk);
    assert_eq!(series.chunk_duration_secs, 0.25);
    assert!(series.values.iter().all(|v| v.is_finite() && *v < 1.0));
}

#[test]
fn reference_track_json_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference.wav");
    write_wav(&path, &test_signal(6.0), None);
    let out_dir = dir.path().join("rms");

    let analyzer = Analyzer::new(Config::default(), DspBackend::shared());
    let out = analyzer
        .process_reference_track(&path, &out_dir, &CancelToken::new())
        .unwrap();
    assert_eq!(out, out_dir.join("reference_rms.json"));

    let values: Vec<f64> = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    // Adaptive chunks are 0.2-0.6 s, so 6 s gives 10 to 30 of them.
    assert!((10..=30).contains(&values.len()), "{}", values.len());
}
