//! Configuration management for Pricecast
//!
//! Loads defaults, optional config files and environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Environment variable holding the news API key
pub const ALPHA_VANTAGE_KEY_VAR: &str = "ALPHA_VANTAGE_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub forecast: ForecastConfig,
    pub features: FeaturesConfig,
    pub sequence: SequenceConfig,
    pub tree: TreeConfig,
    pub cache: CacheConfig,
    pub market: MarketConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    /// Window length of the sequence model
    pub lookback: usize,
    /// Minimum bars of history a request needs
    pub min_history: usize,
    /// Normalizer target range
    pub range_min: f64,
    pub range_max: f64,
    /// Ensemble weights (not renormalized)
    pub sequence_weight: f64,
    pub tree_weight: f64,
    /// Multiplier scale of the sentiment factor
    pub sentiment_strength: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    /// RSI period
    pub rsi_period: usize,
    /// MACD fast period
    pub macd_fast: usize,
    /// MACD slow period
    pub macd_slow: usize,
    /// Bollinger Bands period
    pub bb_period: usize,
    /// Bollinger Bands width in standard deviations
    pub bb_std_dev: f64,
    /// ATR period
    pub atr_period: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceConfig {
    pub hidden_1: usize,
    pub hidden_2: usize,
    pub dense_units: usize,
    pub dropout: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Seed for weight init and batch shuffling
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeConfig {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Forecast cache size bound (0 = unbounded)
    pub forecast_capacity: usize,
    /// Forecast cache entry lifetime in seconds (0 = never expires)
    pub forecast_ttl_secs: u64,
    /// Market snapshot lifetime in seconds
    pub market_ttl_secs: u64,
    /// News cache lifetime in seconds
    pub news_ttl_secs: u64,
    /// Memoized sentiment scores kept
    pub sentiment_capacity: usize,
    /// Memoized sentiment score lifetime in seconds
    pub sentiment_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// History window requested for each index (e.g. "6mo")
    pub period: String,
    /// Sequence-only forecast steps per index
    pub forecast_steps: usize,
    /// Gainers / losers reported
    pub top_n: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// "yahoo" or "csv"
    pub history: String,
    /// Directory of `<TICKER>.csv` files for the csv history provider
    pub csv_dir: String,
    pub yahoo_base_url: String,
    pub stocktwits_base_url: String,
    pub alpha_vantage_base_url: String,
    pub request_timeout_secs: u64,
    pub news_limit: usize,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::builder()?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (PRICECAST__SECTION__KEY)
            .add_source(
                Environment::with_prefix("PRICECAST")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Built-in defaults only
    pub fn defaults() -> Result<Self> {
        let config = Self::builder()?
            .build()
            .context("Failed to build configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    fn builder() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>> {
        let builder = Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            // Log defaults
            .set_default("log.level", "info")?
            .set_default("log.json", false)?
            // Forecast defaults
            .set_default("forecast.lookback", 60)?
            .set_default("forecast.min_history", 60)?
            .set_default("forecast.range_min", 0.0)?
            .set_default("forecast.range_max", 1.0)?
            .set_default("forecast.sequence_weight", 0.6)?
            .set_default("forecast.tree_weight", 0.4)?
            .set_default("forecast.sentiment_strength", 0.1)?
            // Features defaults
            .set_default("features.rsi_period", 14)?
            .set_default("features.macd_fast", 12)?
            .set_default("features.macd_slow", 26)?
            .set_default("features.bb_period", 20)?
            .set_default("features.bb_std_dev", 2.0)?
            .set_default("features.atr_period", 14)?
            // Sequence model defaults
            .set_default("sequence.hidden_1", 50)?
            .set_default("sequence.hidden_2", 50)?
            .set_default("sequence.dense_units", 25)?
            .set_default("sequence.dropout", 0.2)?
            .set_default("sequence.epochs", 50)?
            .set_default("sequence.batch_size", 32)?
            .set_default("sequence.learning_rate", 0.001)?
            .set_default("sequence.seed", 42)?
            // Tree model defaults
            .set_default("tree.n_rounds", 100)?
            .set_default("tree.learning_rate", 0.3)?
            .set_default("tree.max_depth", 6)?
            .set_default("tree.min_samples_leaf", 1)?
            // Cache defaults
            .set_default("cache.forecast_capacity", 0)?
            .set_default("cache.forecast_ttl_secs", 0)?
            .set_default("cache.market_ttl_secs", 300)?
            .set_default("cache.news_ttl_secs", 900)?
            .set_default("cache.sentiment_capacity", 100)?
            .set_default("cache.sentiment_ttl_secs", 900)?
            // Market defaults
            .set_default("market.period", "6mo")?
            .set_default("market.forecast_steps", 5)?
            .set_default("market.top_n", 5)?
            // Provider defaults
            .set_default("providers.history", "yahoo")?
            .set_default("providers.csv_dir", "./data")?
            .set_default(
                "providers.yahoo_base_url",
                "https://query1.finance.yahoo.com/v8/finance/chart",
            )?
            .set_default(
                "providers.stocktwits_base_url",
                "https://api.stocktwits.com/api/2/streams/symbol",
            )?
            .set_default(
                "providers.alpha_vantage_base_url",
                "https://www.alphavantage.co/query",
            )?
            .set_default("providers.request_timeout_secs", 30)?
            .set_default("providers.news_limit", 10)?;
        Ok(builder)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.forecast.lookback == 0 {
            bail!("forecast.lookback must be positive");
        }
        if self.forecast.min_history < self.forecast.lookback {
            bail!(
                "forecast.min_history ({}) must be at least forecast.lookback ({})",
                self.forecast.min_history,
                self.forecast.lookback
            );
        }
        if self.forecast.range_max <= self.forecast.range_min {
            bail!("forecast.range_max must be greater than forecast.range_min");
        }
        if self.forecast.sequence_weight < 0.0 || self.forecast.tree_weight < 0.0 {
            bail!("ensemble weights must be non-negative");
        }
        if !(0.0..1.0).contains(&self.sequence.dropout) {
            bail!("sequence.dropout must be in [0, 1)");
        }
        let sequence = &self.sequence;
        if sequence.batch_size == 0 || sequence.hidden_1 == 0 || sequence.hidden_2 == 0 {
            bail!("sequence layer sizes and batch_size must be positive");
        }
        if self.features.macd_fast >= self.features.macd_slow {
            bail!("features.macd_fast must be shorter than features.macd_slow");
        }
        match self.providers.history.as_str() {
            "yahoo" | "csv" => {}
            other => bail!("Unknown history provider '{}'", other),
        }
        Ok(())
    }

    /// News API key, read from the environment only
    pub fn alpha_vantage_api_key() -> Option<String> {
        std::env::var(ALPHA_VANTAGE_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "lookback={} weights={:.2}/{:.2} epochs={} rounds={} history={} forecast_cache={}",
            self.forecast.lookback,
            self.forecast.sequence_weight,
            self.forecast.tree_weight,
            self.sequence.epochs,
            self.tree.n_rounds,
            self.providers.history,
            if self.cache.forecast_capacity == 0 {
                "unbounded".to_string()
            } else {
                self.cache.forecast_capacity.to_string()
            }
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
