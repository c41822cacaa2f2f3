//! Valence normalization
//!
//! Maps raw affect values onto a signed scale where -1 is the calibrated
//! floor and +1 the calibrated ceiling.
//!
//! Continuous scores are rescaled linearly and are NOT clamped: a reading
//! outside the calibration range lands outside [-1, 1] (e.g. 1.3). The
//! threshold comparisons downstream still behave, so callers only need to
//! tolerate the wider range.
//!
//! Symbols outside the vocabulary normalize to 0.0 (neutral). This is the
//! documented policy for unknown input, not an error path.

use serde::{Deserialize, Serialize};

use super::ValenceRaw;

/// Calibration floor of the continuous valence instrument.
pub const VALENCE_MIN: f64 = 2.88;
/// Calibration ceiling of the continuous valence instrument.
pub const VALENCE_MAX: f64 = 7.83;

/// Scale on which the symbol vocabulary scores are expressed.
pub const SYMBOL_CALIBRATION: Calibration = Calibration { min: 3.01, max: 7.75 };

/// Emoji picker vocabulary with the valence score of each symbol.
pub const EMOJI_VALENCE: [(&str, f64); 12] = [
    ("😫", 3.01),
    ("😤", 3.02),
    ("😢", 3.56),
    ("😥", 3.48),
    ("😅", 4.26),
    ("🙄", 4.36),
    ("🧐", 5.20),
    ("😎", 5.62),
    ("😉", 6.54),
    ("😙", 6.58),
    ("😊", 7.75),
    ("😍", 7.69),
];

/// Linear calibration range of a valence source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
}

fn default_min() -> f64 {
    VALENCE_MIN
}

fn default_max() -> f64 {
    VALENCE_MAX
}

impl Calibration {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `2 * (value - min) / (max - min) - 1`, unclamped.
    pub fn rescale(&self, value: f64) -> f64 {
        2.0 * ((value - self.min) / (self.max - self.min)) - 1.0
    }

    /// Source-scale value that rescales to 0.0.
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.max > self.min
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new(VALENCE_MIN, VALENCE_MAX)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValenceNormalizer {
    instrument: Calibration,
    symbols: Calibration,
    vocabulary: &'static [(&'static str, f64)],
}

impl ValenceNormalizer {
    /// Normalizer for the given instrument calibration and the emoji vocabulary.
    pub fn new(instrument: Calibration) -> Self {
        Self {
            instrument,
            symbols: SYMBOL_CALIBRATION,
            vocabulary: &EMOJI_VALENCE,
        }
    }

    pub fn instrument(&self) -> Calibration {
        self.instrument
    }

    pub fn normalize(&self, raw: &ValenceRaw) -> f64 {
        match raw {
            ValenceRaw::Score(value) => self.normalize_score(*value),
            ValenceRaw::Symbol(tag) => self.normalize_symbol(tag),
        }
    }

    pub fn normalize_score(&self, value: f64) -> f64 {
        self.instrument.rescale(value)
    }

    /// Unknown symbols are neutral (0.0).
    pub fn normalize_symbol(&self, tag: &str) -> f64 {
        match self.symbol_score(tag) {
            Some(score) => self.symbols.rescale(score),
            None => 0.0,
        }
    }

    pub fn symbol_score(&self, tag: &str) -> Option<f64> {
        let tag = tag.trim();
        self.vocabulary
            .iter()
            .find(|(symbol, _)| *symbol == tag)
            .map(|(_, score)| *score)
    }

    /// Value on the source scale, used for the report statistics.
    ///
    /// Unknown symbols report the symbol-scale midpoint so they stay
    /// consistent with their neutral normalization.
    pub fn source_score(&self, raw: &ValenceRaw) -> f64 {
        match raw {
            ValenceRaw::Score(value) => *value,
            ValenceRaw::Symbol(tag) => self
                .symbol_score(tag)
                .unwrap_or_else(|| self.symbols.midpoint()),
        }
    }
}

impl Default for ValenceNormalizer {
    fn default() -> Self {
        Self::new(Calibration::default())
    }
}
