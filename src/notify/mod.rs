//! Notification sinks for delivering new listings.

pub mod telegram;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Listing;

// Re-export for convenience
pub use telegram::TelegramNotifier;

/// Trait for listing delivery backends.
///
/// The contract is "deliver exactly these listings, in any order";
/// formatting for the destination medium belongs to the implementation.
#[async_trait]
pub trait ListingSink: Send + Sync {
    async fn deliver(&self, listings: &[Listing]) -> Result<()>;
}

/// Sink that logs listings instead of sending them anywhere. Used for dry
/// runs and when no Telegram credentials are configured.
#[derive(Debug, Default)]
pub struct ConsoleSink;

#[async_trait]
impl ListingSink for ConsoleSink {
    async fn deliver(&self, listings: &[Listing]) -> Result<()> {
        for listing in listings {
            log::info!(
                "{} | {} | {}₽ | {} rooms | floor {}",
                listing.url,
                listing.address,
                listing.price,
                listing.rooms,
                listing.floor_info
            );
        }
        Ok(())
    }
}
