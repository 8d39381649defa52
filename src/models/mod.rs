// src/models/mod.rs

//! Domain models for the watcher application.

mod config;
mod listing;

// Re-export all public types
pub use config::{AppConfig, CrawlerConfig, DealType, Region, SearchConfig, TelegramConfig};
pub use listing::{Listing, ListingCollection};

/// Statistics for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlStats {
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub pages_fetched: usize,
    pub listings_found: usize,
    pub listings_delivered: usize,
}
