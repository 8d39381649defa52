// src/pipeline/crawl.rs

//! Full crawl-filter-deliver pipeline.

use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::models::{AppConfig, CrawlStats, Listing, SearchConfig};
use crate::notify::ListingSink;
use crate::services::{CrawlOutcome, HttpFetcher, ListingCrawler, PageFetcher};
use crate::storage::{self, MarkerStore};

/// Run one complete crawl: fetch all result pages, drop already-notified
/// listings, deliver the rest.
pub async fn run_crawler(
    config: &AppConfig,
    client: &reqwest::Client,
    store: &dyn MarkerStore,
    sink: &dyn ListingSink,
) -> Result<CrawlStats> {
    run_with(
        &config.search,
        HttpFetcher::new(client.clone()),
        store,
        sink,
    )
    .await
}

/// Pipeline body, generic over the page fetcher.
pub async fn run_with<F: PageFetcher>(
    search: &SearchConfig,
    fetcher: F,
    store: &dyn MarkerStore,
    sink: &dyn ListingSink,
) -> Result<CrawlStats> {
    let start_time = Utc::now();

    // Reject bad criteria before the first network round trip.
    search.validate()?;

    let crawler = ListingCrawler::new(Arc::new(search.clone()), fetcher);
    let CrawlOutcome {
        listings,
        pages_fetched,
    } = crawler.fetch_all().await?;
    let listings_found = listings.len();

    let fresh = storage::filter_new(store, search.retention(), listings).await?;
    let fresh: Vec<Listing> = fresh.into_values().collect();

    sink.deliver(&fresh).await?;

    let stats = CrawlStats {
        start_time,
        end_time: Utc::now(),
        pages_fetched,
        listings_found,
        listings_delivered: fresh.len(),
    };
    log::info!(
        "crawl finished: {} pages, {} listings matched, {} delivered",
        stats.pages_fetched,
        stats.listings_found,
        stats.listings_delivered
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use url::Url;

    use super::*;
    use crate::error::AppError;
    use crate::services::parse::SERP_PAYLOAD_PREFIX;
    use crate::storage::LocalMarkerStore;

    fn offer(id: u64) -> Value {
        json!({
            "cianId": id,
            "roomsCount": 2,
            "description": "",
            "totalArea": 50.0,
            "livingArea": 30.0,
            "floorNumber": 5,
            "building": { "floorsCount": 9 },
            "bargainTerms": { "price": 5_000_000.0, "saleType": "free" },
            "geo": { "address": [{ "title": "city" }] },
            "phones": [{ "countryCode": "7", "number": "9210000000" }],
            "photos": []
        })
    }

    fn page_body(ids: &[u64]) -> String {
        let offers: Vec<Value> = ids.iter().map(|id| offer(*id)).collect();
        let payload = json!([
            { "key": "initialState", "value": { "results": { "offers": offers } } }
        ]);
        format!("<html>\n{SERP_PAYLOAD_PREFIX}{payload};\n</html>")
    }

    struct StubFetcher {
        pages: Vec<String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let page: usize = url
                .query_pairs()
                .find(|(key, _)| key == "p")
                .map(|(_, value)| value.parse().unwrap())
                .unwrap_or(1);
            Ok(self
                .pages
                .get(page - 1)
                .cloned()
                .unwrap_or_else(|| "<html></html>".to_string()))
        }
    }

    fn fetcher() -> StubFetcher {
        StubFetcher {
            pages: vec![page_body(&[1, 2]), page_body(&[2, 3]), page_body(&[])],
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl ListingSink for RecordingSink {
        async fn deliver(&self, listings: &[Listing]) -> Result<()> {
            self.delivered
                .lock()
                .unwrap()
                .extend(listings.iter().map(|listing| listing.id));
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_each_listing_once_per_retention_window() {
        let tmp = TempDir::new().unwrap();
        let store = LocalMarkerStore::new(tmp.path());
        let search = SearchConfig::default();

        let sink = RecordingSink::default();
        let stats = run_with(&search, fetcher(), &store, &sink).await.unwrap();

        assert_eq!(stats.pages_fetched, 3);
        assert_eq!(stats.listings_found, 3);
        assert_eq!(stats.listings_delivered, 3);
        let mut ids = sink.delivered.lock().unwrap().clone();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);

        // A second run over the same upstream delivers nothing.
        let sink = RecordingSink::default();
        let stats = run_with(&search, fetcher(), &store, &sink).await.unwrap();
        assert_eq!(stats.listings_found, 3);
        assert_eq!(stats.listings_delivered, 0);
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_retention_redelivers_every_run() {
        let tmp = TempDir::new().unwrap();
        let store = LocalMarkerStore::new(tmp.path());
        let search = SearchConfig {
            retention_hours: 0,
            ..SearchConfig::default()
        };
        assert_eq!(search.retention(), Duration::ZERO);

        for _ in 0..2 {
            let sink = RecordingSink::default();
            let stats = run_with(&search, fetcher(), &store, &sink).await.unwrap();
            assert_eq!(stats.listings_delivered, 3);
        }
    }

    #[tokio::test]
    async fn invalid_criteria_fail_before_any_fetch() {
        let tmp = TempDir::new().unwrap();
        let store = LocalMarkerStore::new(tmp.path());
        let search = SearchConfig {
            min_price: 10,
            max_price: 5,
            ..SearchConfig::default()
        };

        let sink = RecordingSink::default();
        let fetcher = fetcher();
        let calls = Arc::clone(&fetcher.calls);
        let result = run_with(&search, fetcher, &store, &sink).await;
        assert!(matches!(result, Err(AppError::Config(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(sink.delivered.lock().unwrap().is_empty());
    }
}
