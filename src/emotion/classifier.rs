//! Daily emotion classifiers
//!
//! Three strategies share the [`EmotionClassifier`] capability:
//!
//! - [`PeakClassifier`]: the governing one. Takes the sample with the largest
//!   absolute normalized valence and labels its signed value against the
//!   asymmetric neutral band [-0.176, 0.140].
//! - [`MaxAbsClassifier`]: same peak selection with the older ±0.3 band.
//! - [`MeanValenceClassifier`]: averages the day instead of taking the peak,
//!   ±0.3 band.
//!
//! The two peak variants disagree on moderate days (a lone 0.2 reading is
//! Positive under the governing band and Neutral under ±0.3). That is kept
//! as-is; pick the strategy in config.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::normalizer::ValenceNormalizer;
use super::{EmotionLabel, Measurement};
use crate::error::ConfigError;

/// Neutral band shared by the label rules: values in the closed interval
/// `[negative_below, positive_above]` are Neutral.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub negative_below: f64,
    pub positive_above: f64,
}

impl Thresholds {
    /// Asymmetric band of the peak-value method.
    pub const PEAK: Thresholds = Thresholds {
        negative_below: -0.176,
        positive_above: 0.140,
    };

    /// Symmetric band used by the max-abs and mean methods.
    pub const LEGACY: Thresholds = Thresholds {
        negative_below: -0.3,
        positive_above: 0.3,
    };

    pub fn label_for(&self, value: f64) -> EmotionLabel {
        if value > self.positive_above {
            EmotionLabel::Positive
        } else if value < self.negative_below {
            EmotionLabel::Negative
        } else {
            EmotionLabel::Neutral
        }
    }
}

/// Reduces one day of measurements to a label. Empty input is Neutral.
pub trait EmotionClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn classify(&self, day: &[Measurement]) -> EmotionLabel;
}

/// Value with the largest magnitude; the first one wins on ties.
pub fn peak_valence<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut peak: Option<f64> = None;
    for v in values {
        match peak {
            Some(p) if v.abs() <= p.abs() => {}
            _ => peak = Some(v),
        }
    }
    peak
}

pub fn mean_valence<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0_f64, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[derive(Debug, Clone, Copy)]
pub struct PeakClassifier {
    normalizer: ValenceNormalizer,
    thresholds: Thresholds,
}

impl PeakClassifier {
    pub fn new(normalizer: ValenceNormalizer) -> Self {
        Self::with_thresholds(normalizer, Thresholds::PEAK)
    }

    pub fn with_thresholds(normalizer: ValenceNormalizer, thresholds: Thresholds) -> Self {
        Self {
            normalizer,
            thresholds,
        }
    }
}

impl EmotionClassifier for PeakClassifier {
    fn name(&self) -> &'static str {
        "peak"
    }

    fn classify(&self, day: &[Measurement]) -> EmotionLabel {
        peak_valence(day.iter().map(|m| self.normalizer.normalize(&m.valence)))
            .map(|peak| self.thresholds.label_for(peak))
            .unwrap_or(EmotionLabel::Neutral)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MaxAbsClassifier {
    normalizer: ValenceNormalizer,
    thresholds: Thresholds,
}

impl MaxAbsClassifier {
    pub fn new(normalizer: ValenceNormalizer) -> Self {
        Self::with_thresholds(normalizer, Thresholds::LEGACY)
    }

    pub fn with_thresholds(normalizer: ValenceNormalizer, thresholds: Thresholds) -> Self {
        Self {
            normalizer,
            thresholds,
        }
    }
}

impl EmotionClassifier for MaxAbsClassifier {
    fn name(&self) -> &'static str {
        "max_abs"
    }

    fn classify(&self, day: &[Measurement]) -> EmotionLabel {
        peak_valence(day.iter().map(|m| self.normalizer.normalize(&m.valence)))
            .map(|peak| self.thresholds.label_for(peak))
            .unwrap_or(EmotionLabel::Neutral)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MeanValenceClassifier {
    normalizer: ValenceNormalizer,
    thresholds: Thresholds,
}

impl MeanValenceClassifier {
    pub fn new(normalizer: ValenceNormalizer) -> Self {
        Self::with_thresholds(normalizer, Thresholds::LEGACY)
    }

    pub fn with_thresholds(normalizer: ValenceNormalizer, thresholds: Thresholds) -> Self {
        Self {
            normalizer,
            thresholds,
        }
    }
}

impl EmotionClassifier for MeanValenceClassifier {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn classify(&self, day: &[Measurement]) -> EmotionLabel {
        mean_valence(day.iter().map(|m| self.normalizer.normalize(&m.valence)))
            .map(|mean| self.thresholds.label_for(mean))
            .unwrap_or(EmotionLabel::Neutral)
    }
}

/// Classifier selection as written in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStrategy {
    #[default]
    Peak,
    MaxAbs,
    Mean,
}

impl ClassifierStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierStrategy::Peak => "peak",
            ClassifierStrategy::MaxAbs => "max_abs",
            ClassifierStrategy::Mean => "mean",
        }
    }

    pub fn default_thresholds(&self) -> Thresholds {
        match self {
            ClassifierStrategy::Peak => Thresholds::PEAK,
            ClassifierStrategy::MaxAbs | ClassifierStrategy::Mean => Thresholds::LEGACY,
        }
    }

    pub fn build(
        &self,
        normalizer: ValenceNormalizer,
        thresholds: Thresholds,
    ) -> Box<dyn EmotionClassifier> {
        match self {
            ClassifierStrategy::Peak => {
                Box::new(PeakClassifier::with_thresholds(normalizer, thresholds))
            }
            ClassifierStrategy::MaxAbs => {
                Box::new(MaxAbsClassifier::with_thresholds(normalizer, thresholds))
            }
            ClassifierStrategy::Mean => {
                Box::new(MeanValenceClassifier::with_thresholds(normalizer, thresholds))
            }
        }
    }
}

impl fmt::Display for ClassifierStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "peak" => Ok(ClassifierStrategy::Peak),
            "max_abs" | "max-abs" => Ok(ClassifierStrategy::MaxAbs),
            "mean" => Ok(ClassifierStrategy::Mean),
            other => Err(ConfigError::Strategy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::normalizer::Calibration;
    use chrono::NaiveDate;

    /// Identity calibration: raw score == normalized valence.
    fn identity() -> ValenceNormalizer {
        ValenceNormalizer::new(Calibration::new(-1.0, 1.0))
    }

    fn day(values: &[f64]) -> Vec<Measurement> {
        let base = NaiveDate::from_ymd_opt(2025, 10, 27)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Measurement::score("test00", base + chrono::Duration::minutes(i as i64), *v)
            })
            .collect()
    }

    #[test]
    fn test_empty_day_is_neutral_for_every_strategy() {
        for strategy in [
            ClassifierStrategy::Peak,
            ClassifierStrategy::MaxAbs,
            ClassifierStrategy::Mean,
        ] {
            let c = strategy.build(identity(), strategy.default_thresholds());
            assert_eq!(c.classify(&[]), EmotionLabel::Neutral, "{}", c.name());
        }
    }

    #[test]
    fn test_peak_picks_largest_magnitude() {
        let c = PeakClassifier::new(identity());
        assert_eq!(c.classify(&day(&[0.5, -0.9, 0.1])), EmotionLabel::Negative);
        assert_eq!(c.classify(&day(&[0.05, 0.6, -0.2])), EmotionLabel::Positive);
    }

    #[test]
    fn test_peak_band_is_closed_and_asymmetric() {
        let band = Thresholds::PEAK;
        assert_eq!(band.label_for(-0.176), EmotionLabel::Neutral);
        assert_eq!(band.label_for(0.140), EmotionLabel::Neutral);
        assert_eq!(band.label_for(0.1400001), EmotionLabel::Positive);
        assert_eq!(band.label_for(-0.1760001), EmotionLabel::Negative);

        let c = PeakClassifier::new(identity());
        assert_eq!(c.classify(&day(&[0.15])), EmotionLabel::Positive);
        assert_eq!(c.classify(&day(&[-0.15])), EmotionLabel::Neutral);
        assert_eq!(c.classify(&day(&[-0.18])), EmotionLabel::Negative);
    }

    #[test]
    fn test_peak_and_max_abs_diverge_on_moderate_day() {
        let records = day(&[0.2]);
        assert_eq!(PeakClassifier::new(identity()).classify(&records), EmotionLabel::Positive);
        assert_eq!(MaxAbsClassifier::new(identity()).classify(&records), EmotionLabel::Neutral);
    }

    #[test]
    fn test_tie_goes_to_first_occurrence() {
        assert_eq!(peak_valence([0.5, -0.5]), Some(0.5));
        assert_eq!(peak_valence([-0.5, 0.5]), Some(-0.5));
        assert_eq!(peak_valence(std::iter::empty()), None);

        let c = PeakClassifier::new(identity());
        assert_eq!(c.classify(&day(&[-0.4, 0.4])), EmotionLabel::Negative);
    }

    #[test]
    fn test_mean_strategy_averages() {
        let c = MeanValenceClassifier::new(identity());
        // Peak would say Negative; the mean is ~0.03.
        assert_eq!(c.classify(&day(&[0.5, -0.9, 0.5])), EmotionLabel::Neutral);
        assert_eq!(c.classify(&day(&[0.4, 0.5])), EmotionLabel::Positive);
        assert_eq!(c.classify(&day(&[-0.4, -0.2, -0.6])), EmotionLabel::Negative);
    }

    #[test]
    fn test_thresholds_are_overridable() {
        let strict = Thresholds {
            negative_below: -0.8,
            positive_above: 0.8,
        };
        let c = PeakClassifier::with_thresholds(identity(), strict);
        assert_eq!(c.classify(&day(&[0.7])), EmotionLabel::Neutral);
        assert_eq!(c.classify(&day(&[0.9])), EmotionLabel::Positive);
    }

    #[test]
    fn test_unknown_symbols_do_not_move_the_peak() {
        let base = NaiveDate::from_ymd_opt(2025, 10, 27)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let records = vec![
            Measurement::symbol("test00", base, "🦀"),
            Measurement::symbol("test00", base, "😢"),
        ];
        let c = PeakClassifier::new(ValenceNormalizer::default());
        assert_eq!(c.classify(&records), EmotionLabel::Negative);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("peak".parse::<ClassifierStrategy>().unwrap(), ClassifierStrategy::Peak);
        assert_eq!("MAX_ABS".parse::<ClassifierStrategy>().unwrap(), ClassifierStrategy::MaxAbs);
        assert_eq!("mean".parse::<ClassifierStrategy>().unwrap(), ClassifierStrategy::Mean);
        assert!("median".parse::<ClassifierStrategy>().is_err());
    }
}
