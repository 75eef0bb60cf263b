//! Pricecast Library
//!
//! Ensemble (LSTM + gradient boosting) near-term closing price forecasting

pub mod cache;
pub mod config;
pub mod error;
pub mod features;
pub mod ml_engine;
pub mod providers;
pub mod service;
pub mod types;

#[cfg(feature = "server")]
pub mod server;

pub use error::{ForecastError, ProviderError, Result};
