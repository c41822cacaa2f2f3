use std::sync::Arc;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::dispatch::DispatchDecider;
use crate::emotion::{DailyAggregator, JsonFileSource, MeasurementSource, ValenceNormalizer};
use crate::messages::{MessageCatalog, RotationStore};

/// Everything a running engine needs, wired from one [`EngineConfig`].
pub struct AppState {
    pub config: EngineConfig,

    /// Loaded once at startup; read-only afterwards
    pub catalog: Arc<MessageCatalog>,

    pub store: Arc<RotationStore>,

    pub decider: DispatchDecider,
}

impl AppState {
    /// Build with the system clock and the JSON file source named in
    /// `config.source`. A missing catalog or an unopenable state directory
    /// degrades instead of failing.
    pub fn from_config(config: EngineConfig) -> Self {
        let source = Arc::new(JsonFileSource::new(config.source.path.clone()));
        Self::with_parts(config, source, Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: EngineConfig,
        source: Arc<dyn MeasurementSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let catalog = Arc::new(MessageCatalog::load_or_empty(&config.catalog.path));
        let store = Arc::new(RotationStore::open_or_memory(
            &config.store.path,
            catalog.clone(),
            clock.clone(),
        ));

        let normalizer = ValenceNormalizer::new(config.calibration);
        let classifier = config
            .classifier
            .strategy
            .build(normalizer, config.thresholds());
        let aggregator = DailyAggregator::new(Arc::from(classifier), normalizer, source);

        info!(
            "[CONFIG] Engine ready: strategy={} catalog={} messages state={}",
            aggregator.classifier_name(),
            catalog.total(),
            if store.is_persistent() { "sled" } else { "memory" }
        );

        let decider = DispatchDecider::new(aggregator, store.clone(), clock);

        Self {
            config,
            catalog,
            store,
            decider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::emotion::{EmotionLabel, InMemorySource, RawRecord};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_wires_config_into_decider() {
        let td = tempdir().unwrap();
        let catalog_path = td.path().join("message.csv");
        fs::write(&catalog_path, "Category,Message\nNegative,Take it easy.\n").unwrap();

        let mut config = EngineConfig::default();
        config.catalog.path = catalog_path;
        config.store.path = td.path().join("state");
        config.calibration = crate::emotion::Calibration::new(-1.0, 1.0);

        let source = Arc::new(InMemorySource::new());
        source.push("test00", RawRecord::new("2025/10/27", "09:00", json!(-0.5)));
        let clock = Arc::new(ManualClock::new(NaiveDate::from_ymd_opt(2025, 10, 27).unwrap()));

        let state = AppState::with_parts(config, source, clock);
        assert!(state.store.is_persistent());
        assert_eq!(state.catalog.len_for(EmotionLabel::Negative), 1);
        assert_eq!(state.decider.aggregator().classifier_name(), "peak");
        assert_eq!(
            state.decider.decide("room-1", "test00").as_deref(),
            Some("Take it easy.")
        );
        assert_eq!(state.store.counter_status("room-1")[&EmotionLabel::Negative], 1);
    }
}
