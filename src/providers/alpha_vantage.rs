//! Alpha Vantage NEWS_SENTIMENT feed

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;

use super::{http_client, NewsProvider, ProviderResult};
use crate::error::ProviderError;
use crate::types::{NewsItem, Ticker};

pub struct AlphaVantageNewsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    feed: Vec<FeedItem>,
    /// Rate limit / usage notices come back with status 200
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    title: String,
    #[serde(default)]
    summary: String,
    url: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    time_published: String,
    banner_image: Option<String>,
    overall_sentiment_label: Option<String>,
}

fn topics_for(ticker: Option<&Ticker>) -> String {
    match ticker {
        Some(t) => format!("{},stocks,market", t.as_str()),
        None => "market,finance,stocks".to_string(),
    }
}

/// "20240102T153000" → "2024-01-02T15:30:00"
fn format_published(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S")
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn sentiment_label(label: Option<&str>) -> Option<String> {
    let label = label?.to_ascii_lowercase();
    let mapped = if label.contains("bullish") {
        "positive"
    } else if label.contains("bearish") {
        "negative"
    } else {
        "neutral"
    };
    Some(mapped.to_string())
}

fn to_news_item(item: FeedItem) -> NewsItem {
    NewsItem {
        title: item.title,
        description: item.summary,
        url: item.url,
        source: item.source,
        published_at: format_published(&item.time_published),
        image_url: item.banner_image.filter(|u| !u.is_empty()),
        sentiment: sentiment_label(item.overall_sentiment_label.as_deref()),
    }
}

impl AlphaVantageNewsClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64, limit: usize) -> Self {
        Self {
            client: http_client(timeout_secs),
            base_url: base_url.to_string(),
            api_key,
            limit,
        }
    }
}

#[async_trait]
impl NewsProvider for AlphaVantageNewsClient {
    async fn recent_items(&self, ticker: Option<Ticker>) -> ProviderResult<Vec<NewsItem>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("ALPHA_VANTAGE_API_KEY".to_string()))?;

        let params = [
            ("function", "NEWS_SENTIMENT".to_string()),
            ("topics", topics_for(ticker.as_ref())),
            ("apikey", api_key.to_string()),
        ];
        let response = self.client.get(&self.base_url).query(&params).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Network(format!(
                "Alpha Vantage returned {}",
                response.status()
            )));
        }

        let body: NewsResponse = response.json().await?;
        if body.feed.is_empty() {
            if let Some(notice) = body.information.or(body.note) {
                return Err(ProviderError::Network(notice));
            }
        }

        let items: Vec<NewsItem> = body
            .feed
            .into_iter()
            .take(self.limit)
            .map(to_news_item)
            .collect();
        tracing::debug!(items = items.len(), "Fetched news feed");
        Ok(items)
    }
}
