//! Per-day aggregation
//!
//! Groups a subject's measurements by calendar date (timestamps are already
//! local) and runs the configured classifier on each day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::classifier::EmotionClassifier;
use super::normalizer::ValenceNormalizer;
use super::source::MeasurementSource;
use super::{EmotionLabel, Measurement, RawRecord};

/// Summary of one subject-day. `mean_valence` and `std_valence` are on the
/// source scale; `std_valence` is the sample deviation, 0 for a single record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub subject_id: String,
    pub date: NaiveDate,
    pub record_count: usize,
    pub label: EmotionLabel,
    pub mean_valence: f64,
    pub std_valence: f64,
}

/// Outcome of estimating a single day. `NoData` is never folded into Neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayEstimate {
    Classified(EmotionLabel),
    NoData,
}

impl DayEstimate {
    pub fn label(&self) -> Option<EmotionLabel> {
        match self {
            DayEstimate::Classified(label) => Some(*label),
            DayEstimate::NoData => None,
        }
    }
}

pub struct DailyAggregator {
    classifier: Arc<dyn EmotionClassifier>,
    normalizer: ValenceNormalizer,
    source: Arc<dyn MeasurementSource>,
}

impl DailyAggregator {
    pub fn new(
        classifier: Arc<dyn EmotionClassifier>,
        normalizer: ValenceNormalizer,
        source: Arc<dyn MeasurementSource>,
    ) -> Self {
        Self {
            classifier,
            normalizer,
            source,
        }
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// One report per distinct date, ascending. Malformed records are dropped.
    pub fn aggregate(&self, subject_id: &str, records: &[RawRecord]) -> Vec<DailyReport> {
        group_by_day(decode_all(subject_id, records))
            .into_iter()
            .map(|(date, day)| self.report(subject_id, date, &day))
            .collect()
    }

    /// Fetches the subject's records from the source and aggregates them.
    /// A source failure is logged and yields no reports.
    pub fn aggregate_subject(&self, subject_id: &str) -> Vec<DailyReport> {
        match self.source.fetch(subject_id) {
            Ok(records) => self.aggregate(subject_id, &records),
            Err(e) => {
                warn!("[AGGREGATE] Failed to fetch measurements for {}: {}", subject_id, e);
                Vec::new()
            }
        }
    }

    pub fn estimate_day(&self, subject_id: &str, records: &[RawRecord], date: NaiveDate) -> DayEstimate {
        let day: Vec<Measurement> = decode_all(subject_id, records)
            .into_iter()
            .filter(|m| m.timestamp.date() == date)
            .collect();

        if day.is_empty() {
            debug!("[AGGREGATE] No measurements for {} on {}", subject_id, date);
            return DayEstimate::NoData;
        }

        DayEstimate::Classified(self.classifier.classify(&day))
    }

    /// Label for exactly one date, or `NoData` when the subject has no usable
    /// measurement that day (a source failure counts as no data).
    pub fn estimate_single_day(&self, subject_id: &str, date: NaiveDate) -> DayEstimate {
        match self.source.fetch(subject_id) {
            Ok(records) => self.estimate_day(subject_id, &records, date),
            Err(e) => {
                warn!("[AGGREGATE] Failed to fetch measurements for {}: {}", subject_id, e);
                DayEstimate::NoData
            }
        }
    }

    fn report(&self, subject_id: &str, date: NaiveDate, day: &[Measurement]) -> DailyReport {
        let scores: Vec<f64> = day
            .iter()
            .map(|m| self.normalizer.source_score(&m.valence))
            .collect();
        let (mean_valence, std_valence) = mean_and_sample_std(&scores);

        DailyReport {
            subject_id: subject_id.to_string(),
            date,
            record_count: day.len(),
            label: self.classifier.classify(day),
            mean_valence,
            std_valence,
        }
    }
}

fn decode_all(subject_id: &str, records: &[RawRecord]) -> Vec<Measurement> {
    let decoded: Vec<Measurement> = records.iter().filter_map(|r| r.decode(subject_id)).collect();
    let dropped = records.len() - decoded.len();
    if dropped > 0 {
        debug!("[AGGREGATE] Dropped {} malformed records for {}", dropped, subject_id);
    }
    decoded
}

/// Input order is preserved within each day.
pub fn group_by_day(measurements: Vec<Measurement>) -> BTreeMap<NaiveDate, Vec<Measurement>> {
    let mut days: BTreeMap<NaiveDate, Vec<Measurement>> = BTreeMap::new();
    for m in measurements {
        days.entry(m.timestamp.date()).or_default().push(m);
    }
    days
}

fn mean_and_sample_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::classifier::PeakClassifier;
    use crate::emotion::normalizer::Calibration;
    use crate::emotion::source::InMemorySource;
    use serde_json::json;

    fn aggregator(source: Arc<InMemorySource>) -> DailyAggregator {
        let normalizer = ValenceNormalizer::new(Calibration::new(-1.0, 1.0));
        DailyAggregator::new(Arc::new(PeakClassifier::new(normalizer)), normalizer, source)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_aggregate_groups_by_date() {
        let agg = aggregator(Arc::new(InMemorySource::new()));
        let records = vec![
            RawRecord::new("2025/10/28", "07:00", json!(0.6)),
            RawRecord::new("2025/10/27", "08:00", json!(0.5)),
            RawRecord::new("2025/10/27", "12:00", json!(-0.9)),
            RawRecord::new("2025/10/27", "18:00", json!(0.1)),
            RawRecord::new("bad-date", "18:00", json!(0.1)),
            RawRecord::new("2025/10/29", "18:00", json!(null)),
        ];

        let reports = agg.aggregate("test00", &records);
        assert_eq!(reports.len(), 2);

        assert_eq!(reports[0].date, date(2025, 10, 27));
        assert_eq!(reports[0].record_count, 3);
        assert_eq!(reports[0].label, EmotionLabel::Negative);
        assert!((reports[0].mean_valence - (-0.1)).abs() < 1e-9);
        assert!((reports[0].std_valence - 0.7211102550927979).abs() < 1e-9);

        assert_eq!(reports[1].date, date(2025, 10, 28));
        assert_eq!(reports[1].record_count, 1);
        assert_eq!(reports[1].label, EmotionLabel::Positive);
        assert_eq!(reports[1].std_valence, 0.0);
    }

    #[test]
    fn test_single_day_distinguishes_no_data_from_neutral() {
        let source = Arc::new(InMemorySource::new());
        source.push("test00", RawRecord::new("2025/10/27", "09:00", json!(0.0)));
        let agg = aggregator(source);

        assert_eq!(
            agg.estimate_single_day("test00", date(2025, 10, 27)),
            DayEstimate::Classified(EmotionLabel::Neutral)
        );
        assert_eq!(agg.estimate_single_day("test00", date(2025, 10, 28)), DayEstimate::NoData);
        assert_eq!(agg.estimate_single_day("nobody", date(2025, 10, 27)), DayEstimate::NoData);
        assert_eq!(DayEstimate::NoData.label(), None);
    }

    #[test]
    fn test_malformed_only_day_is_no_data() {
        let agg = aggregator(Arc::new(InMemorySource::new()));
        let records = vec![RawRecord::new("2025/10/27", "9 o'clock", json!(0.8))];
        assert_eq!(agg.estimate_day("test00", &records, date(2025, 10, 27)), DayEstimate::NoData);
        assert!(agg.aggregate("test00", &records).is_empty());
    }

    #[test]
    fn test_mean_and_sample_std() {
        assert_eq!(mean_and_sample_std(&[]), (0.0, 0.0));
        assert_eq!(mean_and_sample_std(&[4.0]), (4.0, 0.0));
        let (mean, std) = mean_and_sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std - 2.138089935299395).abs() < 1e-12);
    }
}
