//! Peak levels and the issues derived from them.

use serde::Serialize;

use super::dynamics::amplitude_to_db;
use super::resample::resample;
use crate::error::FeatureResult;

/// Rate above which no oversampling is done.
pub const TRUE_PEAK_MAX_RATE: u32 = 48_000;

/// Oversampled peak in dBFS.
///
/// Below 48 kHz the signal is upsampled to `min(48000, 2 * rate)` to catch
/// most inter-sample overs; at or above 48 kHz the native samples are used.
pub fn true_peak_db(samples: &[f32], sample_rate: u32) -> FeatureResult<f64> {
    let peak = if sample_rate >= TRUE_PEAK_MAX_RATE {
        sample_peak(samples)
    } else {
        let target = TRUE_PEAK_MAX_RATE.min(sample_rate.saturating_mul(2));
        let upsampled = resample(samples, sample_rate, target)?;
        sample_peak(&upsampled).max(sample_peak(samples))
    };
    Ok(amplitude_to_db(peak))
}

pub fn sample_peak(samples: &[f32]) -> f64 {
    samples.iter().map(|s| s.abs() as f64).fold(0.0, f64::max)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PeakIssue {
    #[serde(rename = "Clipping risk")]
    ClippingRisk,
    #[serde(rename = "Near-clipping warning")]
    NearClipping,
    #[serde(rename = "Low peak level")]
    LowPeakLevel,
    #[serde(rename = "Low peak level without dynamic benefit")]
    LowPeakWithoutDynamics,
}

impl PeakIssue {
    pub fn label(self) -> &'static str {
        match self {
            PeakIssue::ClippingRisk => "Clipping risk",
            PeakIssue::NearClipping => "Near-clipping warning",
            PeakIssue::LowPeakLevel => "Low peak level",
            PeakIssue::LowPeakWithoutDynamics => "Low peak level without dynamic benefit",
        }
    }

    pub fn explanation(self) -> &'static str {
        match self {
            PeakIssue::ClippingRisk => {
                "The track peaks above 0.0 dBFS, which can result in digital clipping. \
                 Even if your DAW meters show 0.0 dB, intersample peaks may exceed this in real-world playback. \
                 Consider using a true peak limiter set to -1.0 dBTP to avoid distortion."
            }
            PeakIssue::NearClipping => {
                "The track peaks very close to 0.0 dBFS. While it may not clip outright, \
                 there is a risk of intersample peaks causing distortion on some playback systems. \
                 A ceiling of -1.0 dBTP is generally safer."
            }
            PeakIssue::LowPeakLevel => {
                "The track peaks well below typical full-scale levels. \
                 This might indicate improper gain staging and can affect metering or plugin behavior. \
                 Consider raising the level during export to reach closer to 0 dBFS without clipping."
            }
            PeakIssue::LowPeakWithoutDynamics => {
                "The track peaks well below 0 dBFS, but the average loudness remains high. \
                 This suggests the level was lowered without gaining extra dynamic range. \
                 Consider exporting at full scale unless you're preparing for mastering."
            }
        }
    }
}

/// Issues found for one track, in detection order, with their explanations joined.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeakIssueReport {
    pub issues: Vec<PeakIssue>,
    pub explanation: String,
}

impl PeakIssueReport {
    /// Issue labels joined with ", ".
    pub fn label(&self) -> String {
        self.issues
            .iter()
            .map(|i| i.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Classify the native (not oversampled) peak.
///
/// The primary ladder is exclusive: above 0 dB, within (-0.3, 0], or below
/// -5 dB. The compound rule (peak under -3 dB while the loud-window RMS stays
/// above -15 dB) is checked independently and appended.
pub fn classify_peak(peak_db: f64, loud_rms_db: Option<f64>) -> Option<PeakIssueReport> {
    let mut issues = Vec::new();
    if peak_db > 0.0 {
        issues.push(PeakIssue::ClippingRisk);
    } else if peak_db > -0.3 {
        issues.push(PeakIssue::NearClipping);
    } else if peak_db < -5.0 {
        issues.push(PeakIssue::LowPeakLevel);
    }

    if peak_db < -3.0 && loud_rms_db.is_some_and(|rms| rms > -15.0) {
        issues.push(PeakIssue::LowPeakWithoutDynamics);
    }

    if issues.is_empty() {
        return None;
    }
    let explanation = issues
        .iter()
        .map(|i| i.explanation())
        .collect::<Vec<_>>()
        .join(" ");
    Some(PeakIssueReport {
        issues,
        explanation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, amp: f32, secs: f32, sr: u32) -> Vec<f32> {
        (0..(secs * sr as f32) as usize)
            .map(|i| amp * (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn sine_true_peak_matches_amplitude() {
        for amp in [1.0f32, 0.5, 0.1] {
            let db = true_peak_db(&sine(1000.0, amp, 1.0, 22050), 22050).unwrap();
            let expected = 20.0 * (amp as f64).log10();
            assert!((db - expected).abs() < 0.15, "amp {} -> {} dB", amp, db);
        }
    }

    #[test]
    fn signal_ending_mid_cycle_does_not_overshoot() {
        // Ends at -0.496, close to a trough.
        let ends_near_peak: Vec<f32> = (0..3000).map(|i| 0.5 * (0.1 * i as f32).sin()).collect();
        // Starts at its crest.
        let starts_at_peak: Vec<f32> = (0..3000).map(|i| 0.5 * (0.1 * i as f32).cos()).collect();
        // 3 kHz, cut off at an arbitrary phase.
        let cut_off: Vec<f32> = sine(3000.0, 0.5, 0.1037, 22050);
        for signal in [ends_near_peak, starts_at_peak, cut_off] {
            let db = true_peak_db(&signal, 22050).unwrap();
            assert!((db - amplitude_to_db(0.5)).abs() < 0.05, "{} dB", db);
        }
    }

    #[test]
    fn high_rate_uses_native_samples() {
        let signal = sine(1000.0, 0.25, 0.5, 96000);
        let db = true_peak_db(&signal, 96000).unwrap();
        assert!((db - amplitude_to_db(sample_peak(&signal))).abs() < 1e-9);
    }

    #[test]
    fn silence_is_finite() {
        let db = true_peak_db(&[0.0; 4096], 22050).unwrap();
        assert!(db.is_finite());
        assert!(db < -170.0);
    }

    #[test]
    fn boundaries_are_exclusive() {
        assert!(classify_peak(0.0, None)
            .unwrap()
            .issues
            .iter()
            .all(|i| *i != PeakIssue::ClippingRisk));
        assert_eq!(
            classify_peak(0.01, None).unwrap().issues,
            vec![PeakIssue::ClippingRisk]
        );
        assert!(classify_peak(-0.3, None).is_none());
        assert_eq!(
            classify_peak(-0.29, None).unwrap().issues,
            vec![PeakIssue::NearClipping]
        );
        assert!(classify_peak(-5.0, None).is_none());
        assert_eq!(
            classify_peak(-5.01, None).unwrap().issues,
            vec![PeakIssue::LowPeakLevel]
        );
    }

    #[test]
    fn compound_rule_appends() {
        let report = classify_peak(-6.0, Some(-12.0)).unwrap();
        assert_eq!(
            report.issues,
            vec![PeakIssue::LowPeakLevel, PeakIssue::LowPeakWithoutDynamics]
        );
        assert_eq!(report.label(), "Low peak level, Low peak level without dynamic benefit");
        assert!(report.explanation.contains("gain staging"));
        assert!(report.explanation.contains("without gaining extra dynamic range"));

        let only_compound = classify_peak(-4.0, Some(-10.0)).unwrap();
        assert_eq!(only_compound.issues, vec![PeakIssue::LowPeakWithoutDynamics]);
        assert!(classify_peak(-4.0, Some(-20.0)).is_none());
        assert!(classify_peak(-4.0, None).is_none());
    }
}
