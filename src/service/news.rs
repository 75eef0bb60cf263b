//! Cached news feed

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::error::Result;
use crate::providers::NewsProvider;
use crate::types::{NewsItem, Ticker};

pub struct NewsService {
    provider: Arc<dyn NewsProvider>,
    cache: TtlCache<Option<Ticker>, Arc<Vec<NewsItem>>>,
}

impl NewsService {
    pub fn new(provider: Arc<dyn NewsProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            cache: TtlCache::new(None, Some(ttl)),
        }
    }

    /// General market news, or news about `symbol`. Feed failures yield an empty list.
    pub async fn news(&self, symbol: Option<&str>) -> Result<Arc<Vec<NewsItem>>> {
        let ticker = match symbol.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(Ticker::parse(raw)?),
            None => None,
        };

        if let Some(hit) = self.cache.get(&ticker).await {
            debug!(ticker = ?ticker, "News cache hit");
            return Ok(hit);
        }

        match self.provider.recent_items(ticker.clone()).await {
            Ok(items) => {
                let items = Arc::new(items);
                self.cache.insert(ticker, Arc::clone(&items)).await;
                Ok(items)
            }
            Err(e) => {
                warn!(ticker = ?ticker, error = %e, "News feed unavailable");
                Ok(Arc::new(Vec::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ForecastError, ProviderError};
    use crate::providers::MockNewsProvider;

    fn item(title: &str) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            description: String::new(),
            url: format!("https://example.com/{}", title),
            source: "Wire".to_string(),
            published_at: "2024-01-02T15:30:00".to_string(),
            image_url: None,
            sentiment: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_news_cached_per_symbol() {
        let mut provider = MockNewsProvider::new();
        provider
            .expect_recent_items()
            .times(3)
            .returning(|ticker| match ticker {
                Some(t) => Ok(vec![item(t.as_str())]),
                None => Ok(vec![item("market"), item("rates")]),
            });

        let svc = NewsService::new(Arc::new(provider), Duration::from_secs(900));
        assert_eq!(svc.news(None).await.unwrap().len(), 2);
        assert_eq!(svc.news(Some("")).await.unwrap().len(), 2);
        let tsla = svc.news(Some("tsla")).await.unwrap();
        assert_eq!(tsla[0].title, "TSLA");
        svc.news(Some("TSLA")).await.unwrap();

        tokio::time::advance(Duration::from_secs(901)).await;
        svc.news(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_feed_failure_is_empty_and_not_cached() {
        let mut provider = MockNewsProvider::new();
        provider
            .expect_recent_items()
            .times(2)
            .returning(|_| Err(ProviderError::NotConfigured("ALPHA_VANTAGE_API_KEY".to_string())));

        let svc = NewsService::new(Arc::new(provider), Duration::from_secs(900));
        assert!(svc.news(None).await.unwrap().is_empty());
        assert!(svc.news(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_symbol_rejected() {
        let mut provider = MockNewsProvider::new();
        provider.expect_recent_items().times(0);

        let svc = NewsService::new(Arc::new(provider), Duration::from_secs(900));
        let err = svc.news(Some("BR K")).await.unwrap_err();
        assert!(matches!(err, ForecastError::Validation(_)));
    }
}
