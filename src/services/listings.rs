// src/services/listings.rs

//! Listing crawler service.
//!
//! Walks the paginated search results for one configured search, merging
//! parsed listings into a collection keyed by listing ID.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ListingCollection, SearchConfig};
use crate::services::parse;

/// Marker the upstream serves instead of results when it demands a captcha.
pub const CAPTCHA_MARKER: &str = "<div id=\"captcha\"></div>";

/// Summary of a crawl run.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub listings: ListingCollection,
    pub pages_fetched: usize,
}

/// One page fetch, behind a trait so the crawl loop runs without a network
/// in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// HTTP-backed page fetcher. One GET per call, no retries.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(AppError::HttpStatus {
                code: status.as_u16(),
                status: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Service crawling all result pages for one search.
pub struct ListingCrawler<F> {
    config: Arc<SearchConfig>,
    fetcher: F,
}

impl<F: PageFetcher> ListingCrawler<F> {
    pub fn new(config: Arc<SearchConfig>, fetcher: F) -> Self {
        Self { config, fetcher }
    }

    /// Crawl pages starting at 1 until a page contributes no new listings.
    ///
    /// Pagination has no explicit end marker; a page whose listings are all
    /// already known (or that has none) is taken to be the last. Pages are
    /// fetched strictly one at a time since the termination check depends
    /// on everything accumulated so far.
    pub async fn fetch_all(&self) -> Result<CrawlOutcome> {
        let mut outcome = CrawlOutcome::default();
        for page in 1u32.. {
            let url = self.config.page_url(page)?;
            let body = self.fetcher.fetch(&url).await?;
            outcome.pages_fetched += 1;

            if body.contains(CAPTCHA_MARKER) {
                return Err(AppError::CaptchaRequired);
            }

            let offers = parse::extract_offers(&body)?;
            let parsed = parse::parse_offers(offers, &self.config)?;

            let before = outcome.listings.len();
            for listing in parsed {
                outcome.listings.insert(listing.id, listing);
            }
            let added = outcome.listings.len() - before;

            if added == 0 {
                log::info!("parsed page {page}, it was the last one");
                break;
            }
            log::info!("parsed page {page}, {added} new listings from here");
        }
        Ok(outcome)
    }
}
