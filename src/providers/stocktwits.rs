//! StockTwits symbol stream as a social sentiment source

use async_trait::async_trait;
use serde::Deserialize;

use super::{http_client, ProviderResult, SentimentProvider};
use crate::error::ProviderError;
use crate::types::Ticker;

pub struct StockTwitsClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    entities: Option<Entities>,
}

#[derive(Debug, Deserialize)]
struct Entities {
    #[serde(default)]
    sentiment: Option<SentimentTag>,
}

#[derive(Debug, Deserialize)]
struct SentimentTag {
    basic: Option<String>,
}

/// Bullish = +1, Bearish = -1, averaged over tagged messages; 0 when none are tagged
fn score_messages(messages: &[Message]) -> f64 {
    let votes: Vec<f64> = messages
        .iter()
        .filter_map(|m| m.entities.as_ref()?.sentiment.as_ref()?.basic.as_deref())
        .filter_map(|label| match label {
            "Bullish" => Some(1.0),
            "Bearish" => Some(-1.0),
            _ => None,
        })
        .collect();

    if votes.is_empty() {
        0.0
    } else {
        votes.iter().sum::<f64>() / votes.len() as f64
    }
}

impl StockTwitsClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SentimentProvider for StockTwitsClient {
    async fn sentiment_score(&self, ticker: &Ticker) -> ProviderResult<f64> {
        let url = format!("{}/{}.json", self.base_url, ticker.as_str());
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(ticker.to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::Network(format!("StockTwits returned {}", status)));
        }

        let stream: StreamResponse = response.json().await?;
        let score = score_messages(&stream.messages);
        tracing::debug!(
            ticker = %ticker,
            messages = stream.messages.len(),
            score,
            "Social sentiment"
        );
        Ok(score)
    }
}
