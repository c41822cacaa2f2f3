// Rotation Store: once-per-day message rotation per location
//
// Storage format:
//   Tree: "rotation_state"
//   Key: location_id bytes
//   Value: JSON record, replaced whole on every write
//     {"last_dispatch_date": "2025-10-27", "cursors": {"Positive": 2, "Neutral": 0}}
//
// Cursors hold the index of the NEXT message for that label. A cursor equal
// to (or, after the catalog shrinks, beyond) the catalog length wraps to 0
// when it is next read, so the last entry is always delivered once.

use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::catalog::MessageCatalog;
use crate::clock::Clock;
use crate::emotion::EmotionLabel;
use crate::error::StoreError;

const ROTATION_TREE: &str = "rotation_state";

/// Durable home of the per-location records, as JSON bytes keyed by location.
pub trait RotationBackend: Send + Sync {
    fn load_all(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError>;
    /// Replace the whole record of `location_id` and make it durable.
    fn save(&self, location_id: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
    fn flush(&self) -> Result<(), StoreError>;
}

pub struct SledBackend {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledBackend {
    pub fn new(db: sled::Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(ROTATION_TREE)?;
        Ok(Self { db, tree })
    }
}

impl RotationBackend for SledBackend {
    fn load_all(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (key, value) = item?;
            out.push((String::from_utf8_lossy(&key).to_string(), value.to_vec()));
        }
        Ok(out)
    }

    fn save(&self, location_id: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.tree.insert(location_id.as_bytes(), bytes)?;
        self.tree.flush()?;
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

/// Persisted rotation state of one location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRecord {
    #[serde(default)]
    pub last_dispatch_date: Option<NaiveDate>,
    #[serde(default)]
    pub cursors: BTreeMap<EmotionLabel, usize>,
}

impl RotationRecord {
    pub fn cursor(&self, label: EmotionLabel) -> usize {
        self.cursors.get(&label).copied().unwrap_or(0)
    }
}

/// Per-location rotation cursors and last-dispatch dates.
///
/// Each location's record sits behind its own mutex, so the
/// check-select-advance-persist sequence for one location never interleaves
/// with another call for the same location. Different locations only share
/// the map shard briefly while looking up their slot.
pub struct RotationStore {
    catalog: Arc<MessageCatalog>,
    clock: Arc<dyn Clock>,
    backend: Option<Box<dyn RotationBackend>>,
    states: DashMap<String, Arc<Mutex<RotationRecord>>>,
}

impl RotationStore {
    /// Open (or create) the sled database at `path` and load every location.
    pub fn open(path: &Path, catalog: Arc<MessageCatalog>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::with_db(db, catalog, clock)
    }

    /// Like [`open`](Self::open), but falls back to memory-only operation
    /// when the database cannot be opened.
    pub fn open_or_memory(path: &Path, catalog: Arc<MessageCatalog>, clock: Arc<dyn Clock>) -> Self {
        match Self::open(path, catalog.clone(), clock.clone()) {
            Ok(store) => store,
            Err(e) => {
                warn!(
                    "[ROTATION] Failed to open rotation state at {}: {}; running memory-only, state will not survive a restart",
                    path.display(),
                    e
                );
                Self::in_memory(catalog, clock)
            }
        }
    }

    pub fn with_db(db: sled::Db, catalog: Arc<MessageCatalog>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        Self::with_backend(Box::new(SledBackend::new(db)?), catalog, clock)
    }

    pub fn with_backend(
        backend: Box<dyn RotationBackend>,
        catalog: Arc<MessageCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let store = Self {
            catalog,
            clock,
            backend: Some(backend),
            states: DashMap::new(),
        };
        store.load_all_from_db()?;

        info!("[ROTATION] Loaded rotation state for {} locations", store.states.len());
        Ok(store)
    }

    pub fn in_memory(catalog: Arc<MessageCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            clock,
            backend: None,
            states: DashMap::new(),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.backend.is_some()
    }

    pub fn catalog(&self) -> &MessageCatalog {
        &self.catalog
    }

    fn load_all_from_db(&self) -> Result<(), StoreError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };

        for (location_id, value) in backend.load_all()? {
            match serde_json::from_slice::<RotationRecord>(&value) {
                Ok(record) => {
                    self.states.insert(location_id, Arc::new(Mutex::new(record)));
                }
                Err(e) => {
                    warn!(
                        "[ROTATION] Failed to decode state for location {}: {}; starting it fresh",
                        location_id, e
                    );
                }
            }
        }

        Ok(())
    }

    fn slot(&self, location_id: &str) -> Arc<Mutex<RotationRecord>> {
        self.states
            .entry(location_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn existing(&self, location_id: &str) -> Option<Arc<Mutex<RotationRecord>>> {
        self.states.get(location_id).map(|slot| slot.value().clone())
    }

    fn persist(&self, location_id: &str, record: &RotationRecord) -> Result<(), StoreError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        backend.save(location_id, serde_json::to_vec(record)?)
    }

    /// Next message for `location_id` under `label`, at most once per day.
    ///
    /// Returns `None` when the location was already served today (whatever
    /// the label) or when the catalog has nothing for `label`. Neither case
    /// touches the stored state. A failed flush is logged and the selected
    /// message is still returned.
    pub fn get_message(&self, location_id: &str, label: EmotionLabel) -> Option<String> {
        self.get_message_on(location_id, label, self.clock.today())
    }

    /// [`get_message`](Self::get_message) with the calendar day pinned by
    /// the caller, so a label estimated for `today` is recorded on that day.
    pub fn get_message_on(&self, location_id: &str, label: EmotionLabel, today: NaiveDate) -> Option<String> {
        let slot = self.slot(location_id);
        let mut record = slot.lock();

        if record.last_dispatch_date == Some(today) {
            debug!("[ROTATION] {} already received its message for {}", location_id, today);
            return None;
        }

        let messages = self.catalog.messages_for(label);
        if messages.is_empty() {
            warn!("[ROTATION] No {} messages in catalog; nothing sent to {}", label, location_id);
            return None;
        }

        let mut index = record.cursor(label);
        if index >= messages.len() {
            info!("[ROTATION] {} {} messages looped back to the first entry", location_id, label);
            index = 0;
        }

        let message = messages[index].clone();
        record.cursors.insert(label, index + 1);
        record.last_dispatch_date = Some(today);

        if let Err(e) = self.persist(location_id, &record) {
            warn!(
                "[ROTATION] Failed to persist state for {}: {}; it may not survive a restart",
                location_id, e
            );
        }

        info!(
            "[ROTATION] Selected message: location={} label={} index={}/{}",
            location_id,
            label,
            index + 1,
            messages.len()
        );

        Some(message)
    }

    /// Current cursor per label; zeros for an unseen location.
    pub fn counter_status(&self, location_id: &str) -> BTreeMap<EmotionLabel, usize> {
        let record = self
            .existing(location_id)
            .map(|slot| slot.lock().clone())
            .unwrap_or_default();

        EmotionLabel::ALL
            .into_iter()
            .map(|label| (label, record.cursor(label)))
            .collect()
    }

    pub fn last_dispatch_date(&self, location_id: &str) -> Option<NaiveDate> {
        self.existing(location_id)
            .and_then(|slot| slot.lock().last_dispatch_date)
    }

    /// Zero every cursor of `location_id`, keeping its last dispatch date.
    /// Returns `false` when the location has no state yet.
    pub fn reset(&self, location_id: &str) -> bool {
        let Some(slot) = self.existing(location_id) else {
            return false;
        };
        let mut record = slot.lock();
        if *record == RotationRecord::default() {
            return false;
        }

        for label in EmotionLabel::ALL {
            record.cursors.insert(label, 0);
        }

        if let Err(e) = self.persist(location_id, &record) {
            warn!("[ROTATION] Failed to persist reset for {}: {}", location_id, e);
        }

        info!("[ROTATION] Reset message counters for {}", location_id);
        true
    }

    /// Every location with recorded state, sorted by location id.
    pub fn snapshot(&self) -> Vec<(String, RotationRecord)> {
        let slots: Vec<(String, Arc<Mutex<RotationRecord>>)> = self
            .states
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let mut all: Vec<(String, RotationRecord)> = slots
            .into_iter()
            .map(|(location_id, slot)| (location_id, slot.lock().clone()))
            .filter(|(_, record)| *record != RotationRecord::default())
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Flush outstanding writes. Each mutation already flushes; this is for
    /// orderly shutdown.
    pub fn flush(&self) -> Result<(), StoreError> {
        match &self.backend {
            Some(backend) => backend.flush(),
            None => Ok(()),
        }
    }
}
