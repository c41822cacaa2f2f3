//! Message catalog and per-location rotation.

pub mod catalog;
pub mod rotation;

pub use catalog::MessageCatalog;
pub use rotation::{RotationBackend, RotationRecord, RotationStore, SledBackend};
