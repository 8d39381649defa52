// src/services/parse.rs

//! Embedded payload extraction and listing parsing.
//!
//! Search result pages embed their data as a JSON array assigned to a
//! frontend config variable on a single line. The array mixes unrelated
//! frontend state with the actual search results; only entries carrying
//! the offers path are consumed.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Listing, SearchConfig};

/// Line prefix carrying the embedded search-result payload.
pub const SERP_PAYLOAD_PREFIX: &str = "window._cianConfig['frontend-serp'] = ";

/// JSON path inside a payload entry that holds the offers array.
const OFFERS_POINTER: &str = "/value/results/offers";

/// Pull every offer object out of a page body.
///
/// A page without the payload line contributes zero offers. A payload that
/// is present but does not decode as a JSON array fails the whole page.
pub fn extract_offers(body: &str) -> Result<Vec<Value>> {
    let Some(line) = body
        .lines()
        .find(|line| line.starts_with(SERP_PAYLOAD_PREFIX))
    else {
        return Ok(Vec::new());
    };

    // The payload is an assignment statement, so the array ends with `;`.
    let payload = line[SERP_PAYLOAD_PREFIX.len()..]
        .trim()
        .trim_end_matches(';');
    let entries: Vec<Value> = serde_json::from_str(payload)
        .map_err(|e| AppError::payload(format!("embedded payload is not a JSON array: {e}")))?;

    let mut offers = Vec::new();
    for entry in entries {
        if let Some(Value::Array(items)) = entry.pointer(OFFERS_POINTER) {
            offers.extend(items.iter().cloned());
        }
    }
    Ok(offers)
}

/// Decode offers and keep those matching the search criteria.
///
/// An offer that does not match the expected schema fails the whole page;
/// the upstream structure has changed and every record is suspect.
pub fn parse_offers(offers: Vec<Value>, search: &SearchConfig) -> Result<Vec<Listing>> {
    let mut listings = Vec::new();
    for offer in offers {
        let raw: RawOffer = serde_json::from_value(offer)
            .map_err(|e| AppError::payload(format!("offer does not match schema: {e}")))?;
        if !raw.passes_filter(search) {
            continue;
        }
        listings.push(raw.into_listing(search));
    }
    Ok(listings)
}

/// Offer record as embedded in the page payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOffer {
    cian_id: u64,
    rooms_count: u32,
    #[serde(default)]
    description: String,
    #[serde(deserialize_with = "number_or_string")]
    total_area: f64,
    #[serde(default, deserialize_with = "opt_number_or_string")]
    living_area: Option<f64>,
    floor_number: i32,
    #[serde(default)]
    building: RawBuilding,
    bargain_terms: RawBargainTerms,
    #[serde(default)]
    geo: RawGeo,
    #[serde(default)]
    phones: Vec<RawPhone>,
    #[serde(default)]
    photos: Vec<RawPhoto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuilding {
    floors_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBargainTerms {
    #[serde(deserialize_with = "number_or_string")]
    price: f64,
    #[serde(default)]
    sale_type: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawGeo {
    #[serde(default)]
    address: Vec<RawAddressComponent>,
}

#[derive(Debug, Deserialize)]
struct RawAddressComponent {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPhone {
    country_code: String,
    number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPhoto {
    full_url: String,
}

impl RawOffer {
    /// Range and floor checks, run before the address/phone/photo work.
    fn passes_filter(&self, search: &SearchConfig) -> bool {
        let rooms_ok = match search.normalized_rooms() {
            Some((min, max)) => (min..=max).contains(&self.rooms_count),
            None => true,
        };
        let living_area = self.living_area.unwrap_or(0.0);

        in_range(search.min_price, self.bargain_terms.price as i64, search.max_price)
            && rooms_ok
            && in_range(search.min_area, self.total_area as i64, search.max_area)
            && in_range(
                search.min_living_area,
                living_area as i64,
                search.max_living_area,
            )
            && !(self.floor_number == 1 && !search.allow_first_floor)
            && !(self.floor_number == 2 && !search.allow_second_floor)
    }

    fn into_listing(self, search: &SearchConfig) -> Listing {
        let floor_info = match self.building.floors_count {
            Some(total) => format!("{}/{}", self.floor_number, total),
            None => self.floor_number.to_string(),
        };
        let address = self
            .geo
            .address
            .iter()
            .map(|part| part.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let phone = self
            .phones
            .first()
            .map(|p| format!("+{}{}", p.country_code, p.number))
            .unwrap_or_default();
        let photo_urls = self
            .photos
            .into_iter()
            .map(|p| p.full_url.replace("\\u002F", "/"))
            .collect();
        let url = format!(
            "https://{}/{}/flat/{}",
            search.region.host(),
            search.deal_type.as_str(),
            self.cian_id
        );

        Listing {
            id: self.cian_id,
            rooms: self.rooms_count,
            description: self.description,
            total_area: self.total_area,
            living_area: self.living_area.unwrap_or(0.0),
            floor_info,
            address,
            sale_type: self.bargain_terms.sale_type,
            price: self.bargain_terms.price as i64,
            photo_urls,
            phone,
            url,
        }
    }
}

/// Zero bounds mean "unbounded" on that side.
fn in_range(min: u64, value: i64, max: u64) -> bool {
    (min == 0 || value >= min as i64) && (max == 0 || value <= max as i64)
}

/// The upstream emits numeric fields both as numbers and as decimal strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid numeric string {s:?}"))),
    }
}

fn opt_number_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid numeric string {s:?}"))),
    }
}
