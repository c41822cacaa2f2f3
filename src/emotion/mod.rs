//! Emotion estimation
//!
//! Affect measurements come in from the upstream store as loosely typed
//! documents, are decoded into [`Measurement`]s, normalized onto a signed
//! valence scale and reduced to one [`EmotionLabel`] per day.

pub mod aggregator;
pub mod classifier;
pub mod normalizer;
pub mod source;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use aggregator::{DailyAggregator, DailyReport, DayEstimate};
pub use classifier::{
    ClassifierStrategy, EmotionClassifier, MaxAbsClassifier, MeanValenceClassifier,
    PeakClassifier, Thresholds,
};
pub use normalizer::{Calibration, ValenceNormalizer};
pub use source::{InMemorySource, JsonFileSource, MeasurementSource};

/// Timestamp layout used by the upstream documents: `day` + ' ' + `time`.
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Daily emotion label. No other values are ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EmotionLabel {
    Positive,
    Neutral,
    Negative,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 3] = [
        EmotionLabel::Positive,
        EmotionLabel::Neutral,
        EmotionLabel::Negative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Positive => "Positive",
            EmotionLabel::Neutral => "Neutral",
            EmotionLabel::Negative => "Negative",
        }
    }

    /// Emoji shown next to the label in chat notifications.
    pub fn emoji(&self) -> &'static str {
        match self {
            EmotionLabel::Positive => "😊",
            EmotionLabel::Neutral => "😐",
            EmotionLabel::Negative => "😔",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        EmotionLabel::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown emotion label: {s:?}"))
    }
}

/// Raw affect value as recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum ValenceRaw {
    /// Continuous instrument score on the calibrated source scale.
    Score(f64),
    /// Discrete tag from the symbol vocabulary (emoji picker).
    Symbol(String),
}

/// One decoded affect sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub subject_id: String,
    pub timestamp: NaiveDateTime,
    pub valence: ValenceRaw,
}

impl Measurement {
    pub fn new(subject_id: impl Into<String>, timestamp: NaiveDateTime, valence: ValenceRaw) -> Self {
        Self {
            subject_id: subject_id.into(),
            timestamp,
            valence,
        }
    }

    pub fn score(subject_id: impl Into<String>, timestamp: NaiveDateTime, value: f64) -> Self {
        Self::new(subject_id, timestamp, ValenceRaw::Score(value))
    }

    pub fn symbol(subject_id: impl Into<String>, timestamp: NaiveDateTime, tag: impl Into<String>) -> Self {
        Self::new(subject_id, timestamp, ValenceRaw::Symbol(tag.into()))
    }
}

/// Affect document as stored upstream, before validation.
///
/// `day` is `YYYY/MM/DD`, `time` is `HH:MM` local wall clock, `valence` is a
/// number, a numeric string or a vocabulary symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, alias = "user_id")]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub valence: Option<serde_json::Value>,
}

impl RawRecord {
    pub fn new(day: &str, time: &str, valence: serde_json::Value) -> Self {
        Self {
            subject_id: None,
            day: Some(day.to_string()),
            time: Some(time.to_string()),
            valence: Some(valence),
        }
    }

    /// Decode into a [`Measurement`] for `subject_id`.
    ///
    /// Returns `None` for malformed documents: missing or unparseable
    /// timestamp, missing valence, or a non-finite numeric valence.
    pub fn decode(&self, subject_id: &str) -> Option<Measurement> {
        let day = self.day.as_deref()?.trim();
        let time = self.time.as_deref()?.trim();
        let timestamp =
            NaiveDateTime::parse_from_str(&format!("{day} {time}"), RECORD_TIMESTAMP_FORMAT).ok()?;

        let valence = match self.valence.as_ref()? {
            serde_json::Value::Number(n) => ValenceRaw::Score(n.as_f64().filter(|v| v.is_finite())?),
            serde_json::Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return None;
                }
                match s.parse::<f64>() {
                    Ok(v) if v.is_finite() => ValenceRaw::Score(v),
                    Ok(_) => return None,
                    Err(_) => ValenceRaw::Symbol(s.to_string()),
                }
            }
            _ => return None,
        };

        Some(Measurement::new(subject_id, timestamp, valence))
    }
}
