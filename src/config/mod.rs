//! Configuration

pub mod engine;

pub use engine::{
    CatalogConfig, ClassifierConfig, EngineConfig, RoutingConfig, SourceConfig, StoreConfig,
    DEFAULT_CONFIG_FILE,
};
