//! Service layer for the watcher application.
//!
//! This module contains the business logic for:
//! - Payload extraction and parsing (`parse`)
//! - Paginated listing crawling (`ListingCrawler`)

pub mod parse;

mod listings;

pub use listings::{CAPTCHA_MARKER, CrawlOutcome, HttpFetcher, ListingCrawler, PageFetcher};
