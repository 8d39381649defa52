//! Listing data structure.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Accumulated crawl result, keyed by listing ID.
pub type ListingCollection = HashMap<u64, Listing>;

/// One parsed flat listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    /// Upstream listing ID, stable across crawls
    pub id: u64,

    /// Number of rooms
    pub rooms: u32,

    /// Free-text description
    pub description: String,

    /// Total area in square meters
    pub total_area: f64,

    /// Living area in square meters
    pub living_area: f64,

    /// Floor position rendered as "floor/total"
    pub floor_info: String,

    /// Street address, joined from the upstream address components
    pub address: String,

    /// Sale subtype tag as reported upstream
    pub sale_type: String,

    /// Price in the smallest currency unit
    pub price: i64,

    /// Photo URLs in upstream order
    pub photo_urls: Vec<String>,

    /// Contact phone, "+<country code><number>"
    pub phone: String,

    /// Listing page URL
    pub url: String,
}

impl Listing {
    /// Human-readable sale subtype.
    pub fn sale_type_label(&self) -> &str {
        match self.sale_type.as_str() {
            "free" => "свободная",
            "alternative" => "альтернативная",
            other => other,
        }
    }
}
