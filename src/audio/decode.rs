use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer as PacketBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::SampleBuffer;
use super::ffmpeg::FfmpegDecoder;
use super::resample::resample_channels;
use crate::cancel::CancelToken;
use crate::config::DecoderConfig;
use crate::error::DecodeError;

/// How often the packet loop checks for cancellation.
const CANCEL_CHECK_PACKETS: usize = 256;

#[derive(Clone, Debug, Default)]
pub struct DecodeRequest {
    /// `0` keeps the native rate.
    pub target_sample_rate: u32,
    /// Downmix to one channel; otherwise up to two channels are kept.
    pub mono: bool,
    pub cancel: CancelToken,
}

/// One way of turning a file into PCM.
pub trait DecodePath: Send + Sync {
    fn name(&self) -> &'static str;
    fn decode(&self, path: &Path, request: &DecodeRequest) -> Result<SampleBuffer, DecodeError>;
}

/// In-process decoding through symphonia's probe and codec registry.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaDecoder;

impl DecodePath for SymphoniaDecoder {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    fn decode(&self, path: &Path, request: &DecodeRequest) -> Result<SampleBuffer, DecodeError> {
        let file = std::fs::File::open(path).map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::Probe(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;

        let track_id = track.id;
        let mut channels = track.codec_params.channels.map_or(0, |c| c.count());
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::Codec(e.to_string()))?;

        let mut interleaved: Vec<f32> = Vec::new();
        let mut packets = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(DecodeError::Codec(e.to_string())),
            };

            packets += 1;
            if packets % CANCEL_CHECK_PACKETS == 0 && request.cancel.is_cancelled() {
                return Err(DecodeError::Cancelled);
            }

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::debug!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(DecodeError::Codec(e.to_string())),
            };

            let spec = *decoded.spec();
            channels = spec.channels.count();
            sample_rate = spec.rate;

            let mut sample_buf = PacketBuffer::<f32>::new(decoded.frames() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(sample_buf.samples());
        }

        if interleaved.is_empty() || channels == 0 {
            return Err(DecodeError::Empty);
        }
        if sample_rate == 0 {
            return Err(DecodeError::Codec("unknown sample rate".into()));
        }

        let mut buffer = SampleBuffer::from_interleaved(&interleaved, channels, sample_rate);
        if request.mono {
            buffer = buffer.into_mono();
        }
        conform_rate(buffer, request.target_sample_rate)
    }
}

fn conform_rate(buffer: SampleBuffer, target: u32) -> Result<SampleBuffer, DecodeError> {
    let native = buffer.sample_rate();
    if target == 0 || target == native {
        return Ok(buffer);
    }
    let mut channels = resample_channels(buffer.channels(), native, target)?.into_iter();
    Ok(match (channels.next(), channels.next()) {
        (Some(left), Some(right)) => SampleBuffer::stereo(left, right, target),
        (Some(only), None) => SampleBuffer::mono(only, target),
        _ => return Err(DecodeError::Empty),
    })
}

/// Primary path first, then exactly one fallback attempt.
pub struct Decoder {
    primary: Box<dyn DecodePath>,
    fallback: Box<dyn DecodePath>,
}

impl Decoder {
    pub fn new(primary: Box<dyn DecodePath>, fallback: Box<dyn DecodePath>) -> Self {
        Self { primary, fallback }
    }

    pub fn from_config(config: &DecoderConfig) -> Self {
        Self::new(
            Box::new(SymphoniaDecoder),
            Box::new(FfmpegDecoder::new(
                &config.ffmpeg_path,
                Duration::from_secs(config.fallback_timeout_secs),
            )),
        )
    }

    pub fn decode(
        &self,
        path: &Path,
        target_sample_rate: u32,
        mono: bool,
        cancel: &CancelToken,
    ) -> Result<SampleBuffer, DecodeError> {
        let request = DecodeRequest {
            target_sample_rate,
            mono,
            cancel: cancel.clone(),
        };

        let primary = match self.primary.decode(path, &request) {
            Ok(buffer) => {
                log_decoded(self.primary.name(), path, &buffer);
                return Ok(buffer);
            }
            Err(DecodeError::Cancelled) => return Err(DecodeError::Cancelled),
            Err(err) => err,
        };
        if cancel.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }

        log::info!(
            "{} could not decode {} ({}), trying {}",
            self.primary.name(),
            path.display(),
            primary,
            self.fallback.name()
        );
        match self.fallback.decode(path, &request) {
            Ok(buffer) => {
                log_decoded(self.fallback.name(), path, &buffer);
                Ok(buffer)
            }
            Err(DecodeError::Cancelled) => Err(DecodeError::Cancelled),
            Err(fallback) => Err(DecodeError::Unrecoverable {
                path: path.to_path_buf(),
                primary: Box::new(primary),
                fallback: Box::new(fallback),
            }),
        }
    }
}

fn log_decoded(via: &str, path: &Path, buffer: &SampleBuffer) {
    log::info!(
        "Decoded {} via {}: {} ch, {}Hz, {:.1}s",
        path.display(),
        via,
        buffer.channel_count(),
        buffer.sample_rate(),
        buffer.duration_secs()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Failing(Arc<AtomicUsize>);

    impl DecodePath for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn decode(&self, _: &Path, _: &DecodeRequest) -> Result<SampleBuffer, DecodeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(DecodeError::Probe("unsupported".into()))
        }
    }

    struct Constant(Arc<AtomicUsize>);

    impl DecodePath for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }
        fn decode(&self, _: &Path, req: &DecodeRequest) -> Result<SampleBuffer, DecodeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(SampleBuffer::mono(vec![0.25; 100], req.target_sample_rate))
        }
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn fallback_used_when_primary_fails() {
        let (a, b) = (counter(), counter());
        let dec = Decoder::new(Box::new(Failing(a.clone())), Box::new(Constant(b.clone())));
        let buf = dec.decode(Path::new("x.bin"), 8000, true, &CancelToken::new()).unwrap();
        assert_eq!(buf.len(), 100);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fallback_skipped_when_primary_succeeds() {
        let (a, b) = (counter(), counter());
        let dec = Decoder::new(Box::new(Constant(a.clone())), Box::new(Failing(b.clone())));
        dec.decode(Path::new("x.bin"), 8000, true, &CancelToken::new()).unwrap();
        assert_eq!(b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn both_failing_is_unrecoverable() {
        let dec = Decoder::new(Box::new(Failing(counter())), Box::new(Failing(counter())));
        let err = dec
            .decode(Path::new("x.bin"), 8000, true, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, DecodeError::Unrecoverable { .. }), "{:?}", err);
    }

    #[test]
    fn cancelled_before_fallback() {
        let b = counter();
        let dec = Decoder::new(Box::new(Failing(counter())), Box::new(Constant(b.clone())));
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = dec.decode(Path::new("x.bin"), 8000, true, &cancel).unwrap_err();
        assert!(matches!(err, DecodeError::Cancelled));
        assert_eq!(b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_file_fails_to_open() {
        let err = SymphoniaDecoder
            .decode(Path::new("/definitely/not/here.wav"), &DecodeRequest::default())
            .unwrap_err();
        assert!(matches!(err, DecodeError::Open { .. }));
    }

    #[test]
    fn garbage_fails_to_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"this is not a riff file at all").unwrap();
        let err = SymphoniaDecoder.decode(&path, &DecodeRequest::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Probe(_)), "{:?}", err);
    }

    #[test]
    fn wav_is_decoded_and_resampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..44100 {
            let s = ((i as f32 * 0.05).sin() * 8000.0) as i16;
            writer.write_sample(s).unwrap();
            writer.write_sample(-s).unwrap();
        }
        writer.finalize().unwrap();

        let stereo = SymphoniaDecoder
            .decode(
                &path,
                &DecodeRequest {
                    target_sample_rate: 22050,
                    mono: false,
                    cancel: CancelToken::new(),
                },
            )
            .unwrap();
        assert_eq!(stereo.channel_count(), 2);
        assert_eq!(stereo.sample_rate(), 22050);
        assert!((stereo.len() as i64 - 22050).abs() <= 1);

        let native = SymphoniaDecoder
            .decode(
                &path,
                &DecodeRequest {
                    target_sample_rate: 0,
                    mono: true,
                    cancel: CancelToken::new(),
                },
            )
            .unwrap();
        assert_eq!(native.channel_count(), 1);
        assert_eq!(native.len(), 44100);
        assert!(native.peak() < 1e-3, "L and -L cancel in the downmix");
    }
}
