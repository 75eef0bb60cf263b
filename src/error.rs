//! Error taxonomy for the forecasting pipeline and its collaborators

use thiserror::Error;

/// Failure reported by an external collaborator (market data, sentiment, news)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("No data found for {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<csv::Error> for ProviderError {
    fn from(err: csv::Error) -> Self {
        ProviderError::Io(format!("CSV error: {}", err))
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::Io(err.to_string())
    }
}

/// Errors surfaced by a forecast or market snapshot request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Malformed ticker, horizon out of range, missing fields
    #[error("{0}")]
    Validation(String),

    #[error("No data found for ticker {0}")]
    NotFound(String),

    #[error(
        "Insufficient historical data for {ticker}. \
         Need at least {required} days, got {available}."
    )]
    InsufficientData {
        ticker: String,
        required: usize,
        available: usize,
    },

    /// Engine-level inconsistency (e.g. feature/label length mismatch)
    #[error("Data preparation error: {0}")]
    DataIntegrity(String),

    #[error("Model error: {0}")]
    Model(String),

    /// No tracked index could be fetched or forecast
    #[error("Unable to fetch market data")]
    MarketDataUnavailable,

    #[error("Collaborator failure: {0}")]
    Collaborator(#[from] ProviderError),
}

impl ForecastError {
    /// True for the not-found / insufficient-history family
    pub fn is_data_unavailable(&self) -> bool {
        matches!(
            self,
            ForecastError::NotFound(_)
                | ForecastError::InsufficientData { .. }
                | ForecastError::MarketDataUnavailable
        )
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
