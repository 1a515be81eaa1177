use crate::error::AnalysisError;

/// Decoded PCM, stored channel-major: `channels[c][i]` is sample `i` of channel `c`.
///
/// Holds one channel (mono) or two (left, right). Every channel has the same length.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Self {
        let len = left.len().min(right.len());
        let (mut left, mut right) = (left, right);
        left.truncate(len);
        right.truncate(len);
        Self {
            channels: vec![left, right],
            sample_rate,
        }
    }

    /// Split interleaved frames. More than two channels keep only the front pair.
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        match channel_count {
            0 | 1 => Self::mono(samples.to_vec(), sample_rate),
            n => {
                let frames = samples.len() / n;
                let mut left = Vec::with_capacity(frames);
                let mut right = Vec::with_capacity(frames);
                for frame in samples.chunks_exact(n) {
                    left.push(frame[0]);
                    right.push(frame[1]);
                }
                Self::stereo(left, right, sample_rate)
            }
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate.max(1) as f64
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Left/right pair, if the buffer carries two channels.
    pub fn stereo_pair(&self) -> Option<(&[f32], &[f32])> {
        match self.channels.as_slice() {
            [left, right] => Some((left, right)),
            _ => None,
        }
    }

    /// Average of all channels.
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels.as_slice() {
            [only] => only.clone(),
            [left, right] => left
                .iter()
                .zip(right)
                .map(|(l, r)| (l + r) * 0.5)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn into_mono(self) -> Self {
        let sample_rate = self.sample_rate;
        if self.channels.len() == 1 {
            return self;
        }
        Self::mono(self.to_mono(), sample_rate)
    }

    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|s| s.abs())
            .fold(0.0f32, f32::max)
    }

    /// Reject buffers no feature can work on: empty, zero rate, or containing NaN/Inf.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.sample_rate == 0 {
            return Err(AnalysisError::EmptyOrInvalidBuffer("sample rate is zero".into()));
        }
        if self.is_empty() {
            return Err(AnalysisError::EmptyOrInvalidBuffer("no samples decoded".into()));
        }
        let non_finite = self
            .channels
            .iter()
            .flat_map(|c| c.iter())
            .filter(|s| !s.is_finite())
            .count();
        if non_finite > 0 {
            return Err(AnalysisError::EmptyOrInvalidBuffer(format!(
                "{} non-finite samples",
                non_finite
            )));
        }
        Ok(())
    }
}

/// Scale so the absolute peak sits at full scale. Silence stays silent.
pub fn peak_normalize(samples: &[f32]) -> Vec<f32> {
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    let scale = 1.0 / (peak as f64 + 1e-9);
    samples.iter().map(|&s| (s as f64 * scale) as f32).collect()
}
