use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::error::ResampleError;

const SINC_LEN: usize = 256;
/// Fade-out appended after the signal; long enough that the filter delay never eats real samples.
const TAIL_LEN: usize = 2 * SINC_LEN;

/// Resample one channel from `from_rate` to `to_rate` in a single pass.
///
/// The signal is extended at both ends by holding the edge sample and fading it
/// out with a raised cosine, so the filter never sees a step at the boundaries.
/// The filter delay and the lead-in are trimmed off the front, leaving output
/// that is time-aligned with the input and exactly `round(len * to / from)`
/// samples long.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, ResampleError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(ResampleError(format!("invalid rates {} -> {}", from_rate, to_rate)));
    }

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let head_len = lead_in_len(from_rate, to_rate);
    let first = samples[0];
    let last = samples[samples.len() - 1];

    let mut padded = Vec::with_capacity(head_len + samples.len() + TAIL_LEN);
    padded.extend((0..head_len).map(|k| first * fade(head_len - k, head_len)));
    padded.extend_from_slice(samples);
    padded.extend((1..=TAIL_LEN).map(|k| last * fade(k, TAIL_LEN)));

    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        2.0, // max relative ratio
        params,
        padded.len(),
        1, // mono
    )
    .map_err(|e| ResampleError(e.to_string()))?;

    let skip = resampler.output_delay() + (head_len as f64 * ratio).round() as usize;
    let output = resampler
        .process(&[padded.as_slice()], None)
        .map_err(|e| ResampleError(e.to_string()))?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let channel = output.into_iter().next().unwrap_or_default();
    let mut out: Vec<f32> = channel.into_iter().skip(skip).take(expected).collect();
    if out.len() < expected {
        log::debug!("resampler returned {} of {} samples, holding last value", out.len(), expected);
        let hold = out.last().copied().unwrap_or(last);
        out.resize(expected, hold);
    }
    Ok(out)
}

/// Raised-cosine gain after `k` of `len` fade samples: 1 at `k = 0`, 0 at `k = len`.
fn fade(k: usize, len: usize) -> f32 {
    0.5 * (1.0 + (std::f32::consts::PI * k as f32 / len as f32).cos())
}

/// Lead-in length of at least `SINC_LEN` input samples that maps onto a whole
/// number of output samples, so trimming it keeps the output on the input grid.
fn lead_in_len(from_rate: u32, to_rate: u32) -> usize {
    let step = (from_rate / gcd(from_rate, to_rate)) as usize;
    if step <= 4 * SINC_LEN {
        SINC_LEN.div_ceil(step) * step
    } else {
        SINC_LEN
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Resample every channel of a channel-major buffer.
pub fn resample_channels(
    channels: &[Vec<f32>],
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<Vec<f32>>, ResampleError> {
    channels
        .iter()
        .map(|c| resample(c, from_rate, to_rate))
        .collect()
}
