//! Spectral energy per named band, as fractions of total power.

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::spectrum::Spectrogram;

const EPSILON: f64 = 1e-9;

/// Upper edge (inclusive) of the low-end region.
pub const LOW_END_MAX_HZ: f64 = 150.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Band {
    Sub,
    Low,
    LowMid,
    Mid,
    HighMid,
    High,
    Air,
}

impl Band {
    pub const ALL: [Band; 7] = [
        Band::Sub,
        Band::Low,
        Band::LowMid,
        Band::Mid,
        Band::HighMid,
        Band::High,
        Band::Air,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Band::Sub => "sub",
            Band::Low => "low",
            Band::LowMid => "low-mid",
            Band::Mid => "mid",
            Band::HighMid => "high-mid",
            Band::High => "high",
            Band::Air => "air",
        }
    }

    /// Half-open range `[lo, hi)` in Hz.
    pub fn range_hz(self) -> (f64, f64) {
        match self {
            Band::Sub => (20.0, 60.0),
            Band::Low => (60.0, 250.0),
            Band::LowMid => (250.0, 500.0),
            Band::Mid => (500.0, 2000.0),
            Band::HighMid => (2000.0, 4000.0),
            Band::High => (4000.0, 8000.0),
            Band::Air => (8000.0, 16000.0),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Ratio of total power in each of the seven bands. Bins outside 20 Hz-16 kHz
/// are in the total but in no band, so ratios need not sum to one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandEnergyMap {
    ratios: [f64; 7],
}

impl BandEnergyMap {
    pub fn from_ratios(ratios: [f64; 7]) -> Self {
        Self {
            ratios: ratios.map(|r| if r.is_finite() { r.clamp(0.0, 1.0) } else { 0.0 }),
        }
    }

    pub fn get(&self, band: Band) -> f64 {
        self.ratios[band.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, f64)> + '_ {
        Band::ALL.iter().map(move |&b| (b, self.get(b)))
    }

    /// sub + low
    pub fn lows(&self) -> f64 {
        self.get(Band::Sub) + self.get(Band::Low)
    }

    /// low-mid + mid + high-mid
    pub fn mids(&self) -> f64 {
        self.get(Band::LowMid) + self.get(Band::Mid) + self.get(Band::HighMid)
    }

    /// high + air
    pub fn highs(&self) -> f64 {
        self.get(Band::High) + self.get(Band::Air)
    }

    pub fn rounded(&self, places: i32) -> Self {
        let scale = 10f64.powi(places);
        Self {
            ratios: self.ratios.map(|r| (r * scale).round() / scale),
        }
    }
}

impl Serialize for BandEnergyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(7))?;
        for (band, ratio) in self.iter() {
            map.serialize_entry(band.name(), &ratio)?;
        }
        map.end()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectralBalance {
    pub bands: BandEnergyMap,
    /// Fraction of power at or below 150 Hz.
    pub low_end_ratio: f64,
}

pub fn spectral_balance(spec: &Spectrogram) -> SpectralBalance {
    let totals = spec.bin_totals();
    let total: f64 = totals.iter().sum();

    let mut band_energy = [0.0f64; 7];
    let mut low_end = 0.0f64;
    for (k, &p) in totals.iter().enumerate() {
        let f = spec.bin_frequency(k);
        if f <= LOW_END_MAX_HZ {
            low_end += p;
        }
        if let Some(band) = Band::ALL.iter().find(|b| {
            let (lo, hi) = b.range_hz();
            f >= lo && f < hi
        }) {
            band_energy[band.index()] += p;
        }
    }

    let denom = total + EPSILON;
    SpectralBalance {
        bands: BandEnergyMap::from_ratios(band_energy.map(|e| e / denom)),
        low_end_ratio: (low_end / denom).clamp(0.0, 1.0),
    }
}
