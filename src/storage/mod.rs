//! Storage abstractions for already-notified listing markers.
//!
//! A marker records "this listing ID was already delivered" together with
//! the time it was first seen. Markers expire after the configured
//! retention window, after which the listing becomes eligible for
//! re-notification.

pub mod local;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ListingCollection;

// Re-export for convenience
pub use local::LocalMarkerStore;

/// Trait for marker storage backends.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Remove every marker older than the retention window.
    ///
    /// Returns the number of purged markers.
    async fn purge_expired(&self, retention: Duration) -> Result<usize>;

    /// Whether a live marker exists for the listing ID.
    async fn contains(&self, id: u64) -> Result<bool>;

    /// Record the listing ID as seen now.
    async fn mark(&self, id: u64) -> Result<()>;
}

/// Reduce a crawl result to listings never delivered within the retention
/// window, recording each returned listing as delivered.
///
/// A zero retention disables the cache entirely: the input is returned
/// unchanged and no markers are written.
pub async fn filter_new(
    store: &dyn MarkerStore,
    retention: Duration,
    listings: ListingCollection,
) -> Result<ListingCollection> {
    if retention.is_zero() {
        return Ok(listings);
    }

    let purged = store.purge_expired(retention).await?;
    if purged > 0 {
        log::debug!("purged {purged} expired listing markers");
    }

    let mut fresh = ListingCollection::new();
    for (id, listing) in listings {
        if store.contains(id).await? {
            // Already delivered within the retention window.
            continue;
        }
        store.mark(id).await?;
        fresh.insert(id, listing);
    }
    Ok(fresh)
}
