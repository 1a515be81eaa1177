use serde::Serialize;

use super::buffer::SampleBuffer;

const EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthLabel {
    Narrow,
    Medium,
    Wide,
    #[serde(rename = "too wide")]
    TooWide,
}

impl WidthLabel {
    pub fn from_ratio(ratio: f64) -> Self {
        if !ratio.is_finite() || ratio < 0.25 {
            WidthLabel::Narrow
        } else if ratio < 0.6 {
            WidthLabel::Medium
        } else if ratio < 1.2 {
            WidthLabel::Wide
        } else {
            WidthLabel::TooWide
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WidthLabel::Narrow => "narrow",
            WidthLabel::Medium => "medium",
            WidthLabel::Wide => "wide",
            WidthLabel::TooWide => "too wide",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StereoWidth {
    pub ratio: f64,
    pub label: WidthLabel,
}

/// Side-to-mid ratio of mean absolute levels, measured on the undownmixed buffer.
///
/// Mono input, identical channels and a non-finite ratio all read as 0.0 / narrow.
pub fn stereo_width(buffer: &SampleBuffer) -> StereoWidth {
    let narrow = StereoWidth {
        ratio: 0.0,
        label: WidthLabel::Narrow,
    };
    let Some((left, right)) = buffer.stereo_pair() else {
        return narrow;
    };
    if left.is_empty() {
        return narrow;
    }

    let (mut mid_sum, mut side_sum) = (0.0f64, 0.0f64);
    for (&l, &r) in left.iter().zip(right) {
        let (l, r) = (l as f64, r as f64);
        mid_sum += ((l + r) / 2.0).abs();
        side_sum += ((l - r) / 2.0).abs();
    }
    let n = left.len() as f64;
    let ratio = (side_sum / n) / (mid_sum / n + EPSILON);
    if !ratio.is_finite() {
        return narrow;
    }
    StereoWidth {
        ratio,
        label: WidthLabel::from_ratio(ratio),
    }
}
