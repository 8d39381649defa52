//! Pipeline entry points for watcher operations.
//!
//! - `run_crawler`: one complete crawl-filter-deliver run over HTTP

pub mod crawl;

pub use crawl::{run_crawler, run_with};
