//! Configuration types and re-exports

pub use super::{
    AppConfig, CacheConfig, FeaturesConfig, ForecastConfig, LogConfig, MarketConfig,
    ProvidersConfig, SequenceConfig, ServerConfig, TreeConfig,
};
