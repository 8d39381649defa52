//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// The only currency code the upstream search accepts (ruble).
pub const CURRENCY_RUBLE: u8 = 2;

/// Search engine versions the upstream still serves.
pub const ENGINE_VERSION_LEGACY: u8 = 1;
pub const ENGINE_VERSION_NEW: u8 = 2;

/// Domain-wide room count bounds used for range normalization.
pub const MIN_ROOMS: u32 = 1;
pub const MAX_ROOMS: u32 = 6;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding already-notified listing markers
    #[serde(default = "defaults::cache_dir")]
    pub cache_dir: PathBuf,

    /// Minutes between crawl runs in watch mode
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_minutes: u64,

    /// HTTP client behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Listing search criteria
    #[serde(default)]
    pub search: SearchConfig,

    /// Telegram delivery settings
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, writing a default file first if none exists.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        let config = Self::default();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(&config)?)?;
        log::warn!(
            "No configuration found, wrote defaults to {}",
            path.display()
        );
        Ok(config)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::config("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::config("crawler.timeout_secs must be > 0"));
        }
        if self.poll_interval_minutes == 0 {
            return Err(AppError::config("poll_interval_minutes must be > 0"));
        }
        self.search.validate()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: defaults::cache_dir(),
            poll_interval_minutes: defaults::poll_interval(),
            crawler: CrawlerConfig::default(),
            search: SearchConfig::default(),
            telegram: TelegramConfig::default(),
        }
    }
}

/// HTTP client behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Telegram delivery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token
    #[serde(default)]
    pub token: String,

    /// Chat IDs that receive new listings
    #[serde(default)]
    pub chat_ids: Vec<i64>,
}

/// Upstream region, selecting the search hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Moscow,
    SaintPetersburg,
}

impl Region {
    pub fn host(&self) -> &'static str {
        match self {
            Region::Moscow => "cian.ru",
            Region::SaintPetersburg => "spb.cian.ru",
        }
    }
}

/// Deal type: buying or renting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealType {
    Sale,
    Rent,
}

impl DealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealType::Sale => "sale",
            DealType::Rent => "rent",
        }
    }
}

/// Listing search criteria.
///
/// Zero means "unbounded" for every numeric range bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "defaults::region")]
    pub region: Region,

    #[serde(default = "defaults::currency")]
    pub currency: u8,

    #[serde(default = "defaults::deal_type")]
    pub deal_type: DealType,

    #[serde(default = "defaults::engine_version")]
    pub engine_version: u8,

    #[serde(default)]
    pub min_price: u64,
    #[serde(default)]
    pub max_price: u64,

    #[serde(default)]
    pub min_rooms: u32,
    #[serde(default)]
    pub max_rooms: u32,

    /// Total area bounds in square meters
    #[serde(default)]
    pub min_area: u64,
    #[serde(default)]
    pub max_area: u64,

    /// Living area bounds in square meters
    #[serde(default)]
    pub min_living_area: u64,
    #[serde(default)]
    pub max_living_area: u64,

    /// Minimum ceiling height in meters, 0.0 = unset
    #[serde(default)]
    pub min_ceiling_height: f32,

    #[serde(default)]
    pub allow_first_floor: bool,
    #[serde(default)]
    pub allow_second_floor: bool,

    /// Only listings where a mortgage is possible
    #[serde(default)]
    pub mortgage_possible: bool,

    /// Free-form query-string tail, appended verbatim
    #[serde(default)]
    pub extra_params: String,

    /// Marker lifetime in hours; 0 disables the already-notified cache
    #[serde(default = "defaults::retention_hours")]
    pub retention_hours: u64,
}

impl SearchConfig {
    /// Marker retention window.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 3600)
    }

    /// Effective room-count range.
    ///
    /// A single set bound is widened to the domain bound on the other side;
    /// both bounds zero means no room restriction at all.
    pub fn normalized_rooms(&self) -> Option<(u32, u32)> {
        match (self.min_rooms, self.max_rooms) {
            (0, 0) => None,
            (min, 0) => Some((min, MAX_ROOMS)),
            (0, max) => Some((MIN_ROOMS, max)),
            (min, max) => Some((min, max)),
        }
    }

    /// Validate search criteria.
    pub fn validate(&self) -> Result<()> {
        if self.currency != CURRENCY_RUBLE {
            return Err(AppError::config(format!(
                "unsupported currency code {}",
                self.currency
            )));
        }
        if self.engine_version != ENGINE_VERSION_LEGACY
            && self.engine_version != ENGINE_VERSION_NEW
        {
            return Err(AppError::config(format!(
                "unknown engine version {}",
                self.engine_version
            )));
        }
        Self::check_range("price", self.min_price, self.max_price)?;
        Self::check_range("area", self.min_area, self.max_area)?;
        Self::check_range("living area", self.min_living_area, self.max_living_area)?;
        if let Some((min, max)) = self.normalized_rooms() {
            if min > max {
                return Err(AppError::config(format!(
                    "rooms range {min}..{max} is empty"
                )));
            }
        }
        Ok(())
    }

    fn check_range(name: &str, min: u64, max: u64) -> Result<()> {
        if min != 0 && max != 0 && min > max {
            return Err(AppError::config(format!(
                "min {name} {min} exceeds max {name} {max}"
            )));
        }
        Ok(())
    }

    /// Build the search URL for a 1-based page number.
    pub fn page_url(&self, page: u32) -> Result<Url> {
        self.validate()?;
        if page < 1 {
            return Err(AppError::config(format!("invalid page number {page}")));
        }

        let mut url = Url::parse(&format!("https://{}/cat.php", self.region.host()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("currency", &self.currency.to_string());
            query.append_pair("deal_type", self.deal_type.as_str());
            query.append_pair("engine_version", &self.engine_version.to_string());
            query.append_pair("offer_type", "flat");
            query.append_pair("sort", "price_object_order");

            if page > 1 {
                query.append_pair("p", &page.to_string());
            }

            if self.min_price != 0 {
                query.append_pair("minprice", &self.min_price.to_string());
            }
            if self.max_price != 0 {
                query.append_pair("maxprice", &self.max_price.to_string());
            }

            if let Some((min, max)) = self.normalized_rooms() {
                for rooms in min..=max {
                    query.append_pair(&format!("room{rooms}"), "1");
                }
            }

            if self.min_area != 0 {
                query.append_pair("mintarea", &self.min_area.to_string());
            }
            if self.max_area != 0 {
                query.append_pair("maxtarea", &self.max_area.to_string());
            }
            if self.min_living_area != 0 {
                query.append_pair("minlarea", &self.min_living_area.to_string());
            }
            if self.max_living_area != 0 {
                query.append_pair("maxlarea", &self.max_living_area.to_string());
            }
            if self.min_ceiling_height != 0.0 {
                query.append_pair("min_ceiling_height", &self.min_ceiling_height.to_string());
            }

            // The upstream allows first floors by default; the parameter
            // only ever turns them off.
            if !self.allow_first_floor {
                query.append_pair("is_first_floor", "0");
            }
            if self.mortgage_possible {
                query.append_pair("ipoteka", "1");
            }
        }

        if !self.extra_params.is_empty() {
            let combined = match url.query() {
                Some(existing) => format!("{existing}&{}", self.extra_params),
                None => self.extra_params.clone(),
            };
            url.set_query(Some(&combined));
        }

        Ok(url)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            region: defaults::region(),
            currency: defaults::currency(),
            deal_type: defaults::deal_type(),
            engine_version: defaults::engine_version(),
            min_price: 0,
            max_price: 0,
            min_rooms: 0,
            max_rooms: 0,
            min_area: 0,
            max_area: 0,
            min_living_area: 0,
            max_living_area: 0,
            min_ceiling_height: 0.0,
            allow_first_floor: false,
            allow_second_floor: false,
            mortgage_possible: false,
            extra_params: String::new(),
            retention_hours: defaults::retention_hours(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{DealType, Region};

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_6) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/85.0.4183.83 Safari/537.36"
            .into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Search defaults
    pub fn region() -> Region {
        Region::SaintPetersburg
    }
    pub fn currency() -> u8 {
        super::CURRENCY_RUBLE
    }
    pub fn deal_type() -> DealType {
        DealType::Sale
    }
    pub fn engine_version() -> u8 {
        super::ENGINE_VERSION_NEW
    }
    pub fn retention_hours() -> u64 {
        24 * 7
    }

    // Application defaults
    pub fn cache_dir() -> PathBuf {
        PathBuf::from("cache")
    }
    pub fn poll_interval() -> u64 {
        30
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn page_url_contains_mandatory_params() {
        let search = SearchConfig::default();
        let url = search.page_url(1).unwrap();
        let params = query_map(&url);

        assert_eq!(params.get("currency").map(String::as_str), Some("2"));
        assert_eq!(params.get("deal_type").map(String::as_str), Some("sale"));
        assert_eq!(params.get("engine_version").map(String::as_str), Some("2"));
        assert_eq!(params.get("offer_type").map(String::as_str), Some("flat"));
        assert_eq!(
            params.get("sort").map(String::as_str),
            Some("price_object_order")
        );
        assert_eq!(url.host_str(), Some("spb.cian.ru"));
    }

    #[test]
    fn page_one_is_implicit() {
        let search = SearchConfig::default();
        assert!(!query_map(&search.page_url(1).unwrap()).contains_key("p"));
        assert_eq!(
            query_map(&search.page_url(4).unwrap())
                .get("p")
                .map(String::as_str),
            Some("4")
        );
    }

    #[test]
    fn zero_bounds_are_omitted() {
        let search = SearchConfig::default();
        let params = query_map(&search.page_url(1).unwrap());
        for key in ["minprice", "maxprice", "mintarea", "maxtarea", "minlarea",
            "maxlarea", "min_ceiling_height"]
        {
            assert!(!params.contains_key(key), "{key} should be absent");
        }
    }

    #[test]
    fn price_bounds_are_forwarded() {
        let search = SearchConfig {
            min_price: 3_000_000,
            max_price: 9_000_000,
            ..SearchConfig::default()
        };
        let params = query_map(&search.page_url(1).unwrap());
        assert_eq!(params.get("minprice").map(String::as_str), Some("3000000"));
        assert_eq!(params.get("maxprice").map(String::as_str), Some("9000000"));
    }

    #[test]
    fn single_room_bound_widens_to_domain_limit() {
        let search = SearchConfig {
            min_rooms: 2,
            ..SearchConfig::default()
        };
        assert_eq!(search.normalized_rooms(), Some((2, 6)));

        let params = query_map(&search.page_url(1).unwrap());
        assert!(!params.contains_key("room1"));
        for rooms in 2..=6 {
            assert_eq!(
                params.get(&format!("room{rooms}")).map(String::as_str),
                Some("1")
            );
        }
    }

    #[test]
    fn no_room_bounds_means_no_room_params() {
        let search = SearchConfig::default();
        assert_eq!(search.normalized_rooms(), None);

        let params = query_map(&search.page_url(1).unwrap());
        assert!(!params.keys().any(|k| k.starts_with("room")));
    }

    #[test]
    fn floor_and_mortgage_flags() {
        let search = SearchConfig::default();
        let params = query_map(&search.page_url(1).unwrap());
        assert_eq!(params.get("is_first_floor").map(String::as_str), Some("0"));
        assert!(!params.contains_key("ipoteka"));

        let search = SearchConfig {
            allow_first_floor: true,
            mortgage_possible: true,
            ..SearchConfig::default()
        };
        let params = query_map(&search.page_url(1).unwrap());
        assert!(!params.contains_key("is_first_floor"));
        assert_eq!(params.get("ipoteka").map(String::as_str), Some("1"));
    }

    #[test]
    fn extra_params_are_appended_verbatim() {
        let search = SearchConfig {
            extra_params: "foot_min=20&only_flat=1".into(),
            ..SearchConfig::default()
        };
        let url = search.page_url(1).unwrap();
        assert!(url.query().unwrap().ends_with("foot_min=20&only_flat=1"));
    }

    #[test]
    fn rejects_bad_configuration() {
        let search = SearchConfig {
            currency: 1,
            ..SearchConfig::default()
        };
        assert!(search.page_url(1).is_err());

        let search = SearchConfig {
            engine_version: 3,
            ..SearchConfig::default()
        };
        assert!(search.page_url(1).is_err());

        let search = SearchConfig::default();
        assert!(search.page_url(0).is_err());
    }

    #[test]
    fn rejects_inverted_ranges() {
        let search = SearchConfig {
            min_price: 10,
            max_price: 5,
            ..SearchConfig::default()
        };
        assert!(search.validate().is_err());

        let search = SearchConfig {
            min_rooms: 5,
            max_rooms: 2,
            ..SearchConfig::default()
        };
        assert!(search.validate().is_err());
    }

    #[test]
    fn default_app_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn load_or_init_writes_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let config = AppConfig::load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.poll_interval_minutes, 30);

        // Second load reads the file back unchanged.
        let reloaded = AppConfig::load_or_init(&path).unwrap();
        assert_eq!(reloaded.search.retention_hours, 24 * 7);
    }
}
