//! Dispatch decision
//!
//! Ties today's emotion estimate for a subject to the rotation store of the
//! location where the subject was detected.

use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::emotion::{DailyAggregator, DayEstimate, EmotionLabel};
use crate::messages::RotationStore;

/// What a dispatch attempt came to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { label: EmotionLabel, message: String },
    /// Already served today, or nothing in the catalog for `label`.
    Suppressed { label: EmotionLabel },
    /// No usable measurement for the subject today.
    NoData,
}

impl DispatchOutcome {
    pub fn message(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Delivered { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn into_message(self) -> Option<String> {
        match self {
            DispatchOutcome::Delivered { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<EmotionLabel> {
        match self {
            DispatchOutcome::Delivered { label, .. } | DispatchOutcome::Suppressed { label } => {
                Some(*label)
            }
            DispatchOutcome::NoData => None,
        }
    }
}

pub struct DispatchDecider {
    aggregator: DailyAggregator,
    store: Arc<RotationStore>,
    clock: Arc<dyn Clock>,
}

impl DispatchDecider {
    pub fn new(aggregator: DailyAggregator, store: Arc<RotationStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            aggregator,
            store,
            clock,
        }
    }

    pub fn aggregator(&self) -> &DailyAggregator {
        &self.aggregator
    }

    pub fn store(&self) -> &RotationStore {
        &self.store
    }

    /// Message to speak at `location_id` for `subject_id`, or `None` to stay
    /// silent.
    pub fn decide(&self, location_id: &str, subject_id: &str) -> Option<String> {
        self.decide_outcome(location_id, subject_id).into_message()
    }

    pub fn decide_outcome(&self, location_id: &str, subject_id: &str) -> DispatchOutcome {
        let today = self.clock.today();

        let label = match self.aggregator.estimate_single_day(subject_id, today) {
            DayEstimate::Classified(label) => label,
            DayEstimate::NoData => {
                debug!(
                    "[DISPATCH] No measurements for {} on {}; {} stays silent",
                    subject_id, today, location_id
                );
                return DispatchOutcome::NoData;
            }
        };

        match self.store.get_message_on(location_id, label, today) {
            Some(message) => {
                info!(
                    "[DISPATCH] {} -> {}: {} {}",
                    subject_id,
                    location_id,
                    label.emoji(),
                    label
                );
                DispatchOutcome::Delivered { label, message }
            }
            None => DispatchOutcome::Suppressed { label },
        }
    }
}
