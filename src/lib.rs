//! Mood relay
//!
//! Estimates a person's daily emotion from affect measurements and picks
//! at most one supportive message per location per day, cycling through a
//! catalog per emotion.

pub mod app_state;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod emotion;
pub mod error;
pub mod events;
pub mod messages;

pub use app_state::AppState;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use dispatch::{DispatchDecider, DispatchOutcome};
pub use emotion::{DailyAggregator, DailyReport, EmotionLabel, Measurement, RawRecord};
pub use error::{CatalogError, ConfigError, SourceError, StoreError};
pub use events::{handle_event, SensorEvent, WebhookBody};
pub use messages::{MessageCatalog, RotationStore};
