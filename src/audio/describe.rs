//! Genre-aware wording for low-end and spectral-balance figures.
//!
//! Each description is an ordered ladder of threshold rungs evaluated top to
//! bottom; the first rung that matches wins and `otherwise` covers the rest.
//! Tables are plain data so they can be re-tuned as a new version without
//! touching the evaluation code.

use serde::Serialize;

use super::bands::BandEnergyMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenreBucket {
    BassDriven,
    Balanced,
    LessBassy,
    Unknown,
}

const BASS_DRIVEN: &[&str] = &["electronic", "hiphop", "rnb"];
const BALANCED: &[&str] = &["pop", "rock", "indie", "reggae", "funk", "soul", "classic"];
const LESS_BASSY: &[&str] = &["punk", "metal", "jazz", "country", "folk"];

impl GenreBucket {
    /// Unlisted or missing genres fall into `Unknown`.
    pub fn from_genre(genre: Option<&str>) -> Self {
        let Some(genre) = genre.map(|g| g.trim().to_lowercase()) else {
            return GenreBucket::Unknown;
        };
        let genre = genre.as_str();
        if BASS_DRIVEN.contains(&genre) {
            GenreBucket::BassDriven
        } else if BALANCED.contains(&genre) {
            GenreBucket::Balanced
        } else if LESS_BASSY.contains(&genre) {
            GenreBucket::LessBassy
        } else {
            GenreBucket::Unknown
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Every genre on the allow-list.
pub fn known_genres() -> impl Iterator<Item = &'static str> {
    BASS_DRIVEN
        .iter()
        .chain(BALANCED)
        .chain(LESS_BASSY)
        .copied()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    /// Fraction of power at or below 150 Hz.
    LowEnd,
    /// sub + low
    Lows,
    /// low-mid + mid + high-mid
    Mids,
    /// high + air
    Highs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Below,
    Above,
}

#[derive(Clone, Copy, Debug)]
pub struct Rung {
    pub region: Region,
    pub comparison: Comparison,
    pub threshold: f64,
    pub text: &'static str,
}

const fn below(region: Region, threshold: f64, text: &'static str) -> Rung {
    Rung {
        region,
        comparison: Comparison::Below,
        threshold,
        text,
    }
}

const fn above(region: Region, threshold: f64, text: &'static str) -> Rung {
    Rung {
        region,
        comparison: Comparison::Above,
        threshold,
        text,
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Ladder {
    pub rungs: &'static [Rung],
    pub otherwise: &'static str,
}

/// Region values a ladder can test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionLevels {
    pub low_end: f64,
    pub lows: f64,
    pub mids: f64,
    pub highs: f64,
}

impl RegionLevels {
    pub fn new(bands: &BandEnergyMap, low_end_ratio: f64) -> Self {
        Self {
            low_end: low_end_ratio,
            lows: bands.lows(),
            mids: bands.mids(),
            highs: bands.highs(),
        }
    }

    fn get(&self, region: Region) -> f64 {
        match region {
            Region::LowEnd => self.low_end,
            Region::Lows => self.lows,
            Region::Mids => self.mids,
            Region::Highs => self.highs,
        }
    }
}

impl Ladder {
    pub fn select(&self, levels: &RegionLevels) -> &'static str {
        self.rungs
            .iter()
            .find(|rung| {
                let value = levels.get(rung.region);
                match rung.comparison {
                    Comparison::Below => value < rung.threshold,
                    Comparison::Above => value > rung.threshold,
                }
            })
            .map_or(self.otherwise, |rung| rung.text)
    }
}

/// One versioned set of ladders, indexed by `GenreBucket`.
#[derive(Clone, Copy, Debug)]
pub struct ClassificationTables {
    pub version: &'static str,
    pub low_end: [Ladder; 4],
    pub spectral: [Ladder; 4],
}

impl ClassificationTables {
    pub fn describe_low_end(&self, bucket: GenreBucket, genre: Option<&str>, low_end_ratio: f64) -> String {
        let levels = RegionLevels {
            low_end: low_end_ratio,
            lows: 0.0,
            mids: 0.0,
            highs: 0.0,
        };
        interpolate(self.low_end[bucket.index()].select(&levels), genre)
    }

    pub fn describe_spectral_balance(&self, bucket: GenreBucket, genre: Option<&str>, levels: &RegionLevels) -> String {
        interpolate(self.spectral[bucket.index()].select(levels), genre)
    }
}

fn interpolate(text: &str, genre: Option<&str>) -> String {
    let genre = genre.map(|g| g.trim().to_lowercase()).unwrap_or_default();
    text.replace("{genre}", &genre)
}

use Region::{Highs, LowEnd, Lows, Mids};

pub const TABLES_V1: ClassificationTables = ClassificationTables {
    version: "v1",
    low_end: [
        // bass_driven
        Ladder {
            rungs: &[
                below(LowEnd, 0.08, "Low-end is light for {genre}. Consider boosting the bass or sub for fullness."),
                below(LowEnd, 0.28, "Low-end feels balanced for bass-driven music."),
                below(LowEnd, 0.45, "Low-end is elevated — still genre-typical. No changes needed unless masking is audible."),
            ],
            otherwise: "Low-end is very strong — double-check clarity in the sub region.",
        },
        // balanced
        Ladder {
            rungs: &[
                below(LowEnd, 0.05, "Low-end is light — may sound thin or underpowered for {genre}."),
                below(LowEnd, 0.20, "Low-end feels appropriate and balanced for this style."),
                below(LowEnd, 0.35, "Low-end is strong — possibly a stylistic choice, but check for mud or masking."),
            ],
            otherwise: "Low-end is very heavy — could overwhelm mids or make the mix feel boomy.",
        },
        // less_bassy
        Ladder {
            rungs: &[
                below(LowEnd, 0.03, "Low-end is very light — likely appropriate for {genre}."),
                below(LowEnd, 0.12, "Low-end feels balanced and controlled for this genre."),
                below(LowEnd, 0.25, "Low-end is on the heavier side — may still work, but ensure it doesn't obscure midrange clarity."),
            ],
            otherwise: "Low-end is unusually strong for {genre} — might overpower vocals or acoustic instruments.",
        },
        // unknown
        Ladder {
            rungs: &[
                below(LowEnd, 0.05, "Low-end is very light — might feel thin unless intentional."),
                below(LowEnd, 0.15, "Low-end is on the light side, but may be fine for minimal or acoustic styles."),
                below(LowEnd, 0.30, "Low-end appears balanced — acceptable for many genres."),
                below(LowEnd, 0.45, "Low-end is strong — stylistic, but check for muddiness."),
            ],
            otherwise: "Low-end is very dominant — could overwhelm mids or cause translation issues.",
        },
    ],
    spectral: [
        // bass_driven
        Ladder {
            rungs: &[
                above(Lows, 0.75, "Low-end is very strong — often genre-typical, but worth a clarity check."),
                above(Lows, 0.55, "Low end is prominent, which is typical for this genre. No action needed unless masking is audible."),
                above(Mids, 0.5, "Mid frequencies dominate — may sound boxy or congested for this genre."),
                above(Highs, 0.35, "Highs are bright — ensure they don’t make the mix feel harsh or distract from the bass foundation."),
            ],
            otherwise: "Spectral balance appears well suited for a bass-driven style.",
        },
        // balanced
        Ladder {
            rungs: &[
                above(Lows, 0.6, "Low end is strong — may be stylistic, but check for any mud or masking."),
                above(Lows, 0.45, "Low end is moderately elevated — still acceptable depending on artistic intent."),
                above(Mids, 0.5, "Midrange is quite strong — might sound rich, or a bit crowded."),
                above(Highs, 0.45, "Highs are crisp — could add brilliance, or cause sharpness if overdone."),
            ],
            otherwise: "Spectral balance is fairly even and typical for a balanced genre.",
        },
        // less_bassy
        Ladder {
            rungs: &[
                above(Lows, 0.50, "Low end is elevated — uncommon in this genre, so check for rumble or mud."),
                above(Mids, 0.55, "Midrange is dominant — can sound raw or aggressive, which fits this style."),
                above(Highs, 0.5, "Highs are very pronounced — this can be typical but may fatigue the ear."),
            ],
            otherwise: "Spectral balance looks appropriate for a mid/high-forward genre.",
        },
        // unknown
        Ladder {
            rungs: &[],
            otherwise: "Spectral balance analyzed, but genre could not be matched precisely.",
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKETS: [GenreBucket; 4] = [
        GenreBucket::BassDriven,
        GenreBucket::Balanced,
        GenreBucket::LessBassy,
        GenreBucket::Unknown,
    ];

    #[test]
    fn genre_lookup() {
        assert_eq!(GenreBucket::from_genre(Some("Electronic")), GenreBucket::BassDriven);
        assert_eq!(GenreBucket::from_genre(Some(" rock ")), GenreBucket::Balanced);
        assert_eq!(GenreBucket::from_genre(Some("jazz")), GenreBucket::LessBassy);
        assert_eq!(GenreBucket::from_genre(Some("polka")), GenreBucket::Unknown);
        assert_eq!(GenreBucket::from_genre(None), GenreBucket::Unknown);
        assert_eq!(known_genres().count(), 15);
    }

    #[test]
    fn low_end_sweep_walks_ladder_in_order() {
        for bucket in BUCKETS {
            let ladder = TABLES_V1.low_end[bucket.index()];
            let mut expected: Vec<&str> = ladder.rungs.iter().map(|r| r.text).collect();
            expected.push(ladder.otherwise);

            let mut seen: Vec<&str> = Vec::new();
            for step in 0..=1000 {
                let levels = RegionLevels {
                    low_end: step as f64 / 1000.0,
                    lows: 0.0,
                    mids: 0.0,
                    highs: 0.0,
                };
                let text = ladder.select(&levels);
                if seen.last() != Some(&text) {
                    assert!(!seen.contains(&text), "{:?} repeated {}", bucket, text);
                    seen.push(text);
                }
            }
            assert_eq!(seen, expected, "{:?}", bucket);
        }
    }

    #[test]
    fn low_end_thresholds_are_exclusive_upper_bounds() {
        let t = &TABLES_V1;
        let text = t.describe_low_end(GenreBucket::BassDriven, Some("hiphop"), 0.079);
        assert_eq!(text, "Low-end is light for hiphop. Consider boosting the bass or sub for fullness.");
        let text = t.describe_low_end(GenreBucket::BassDriven, Some("hiphop"), 0.08);
        assert_eq!(text, "Low-end feels balanced for bass-driven music.");
        let text = t.describe_low_end(GenreBucket::Unknown, None, 0.45);
        assert!(text.starts_with("Low-end is very dominant"));
    }

    #[test]
    fn spectral_lows_checked_before_mids() {
        let levels = RegionLevels {
            low_end: 0.0,
            lows: 0.6,
            mids: 0.6,
            highs: 0.0,
        };
        let text = TABLES_V1.describe_spectral_balance(GenreBucket::BassDriven, Some("rnb"), &levels);
        assert!(text.starts_with("Low end is prominent"));

        let levels = RegionLevels { lows: 0.2, ..levels };
        let text = TABLES_V1.describe_spectral_balance(GenreBucket::BassDriven, Some("rnb"), &levels);
        assert!(text.starts_with("Mid frequencies dominate"));
    }

    #[test]
    fn spectral_fallbacks() {
        let even = RegionLevels {
            low_end: 0.1,
            lows: 0.3,
            mids: 0.4,
            highs: 0.2,
        };
        assert_eq!(
            TABLES_V1.describe_spectral_balance(GenreBucket::Balanced, Some("pop"), &even),
            "Spectral balance is fairly even and typical for a balanced genre."
        );
        assert_eq!(
            TABLES_V1.describe_spectral_balance(GenreBucket::Unknown, None, &even),
            "Spectral balance analyzed, but genre could not be matched precisely."
        );
        let bright = RegionLevels { highs: 0.51, mids: 0.3, ..even };
        assert!(TABLES_V1
            .describe_spectral_balance(GenreBucket::LessBassy, Some("metal"), &bright)
            .starts_with("Highs are very pronounced"));
    }
}
