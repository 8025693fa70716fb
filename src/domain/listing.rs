// src/domain/listing.rs

use crate::scraper::models::{ApiVersion, RawEstate, RawListing, Seo};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

const DETAIL_BASE: &str = "https://www.sreality.cz/detail";
const DEFAULT_CATEGORY_PATH: &str = "prodej/dum/rodinny";
const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Error)]
#[error("malformed record: {0}")]
pub struct MalformedRecordError(pub String);

/// A real-estate listing normalized from one of the API payload shapes.
///
/// Everything except `first_seen`/`last_seen`/`group` comes straight from the
/// source. Those three are provenance and are managed by the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub link: String,
    // older writers stored these under `images` / `labels`
    #[serde(default, alias = "images", deserialize_with = "null_as_empty")]
    pub image_ref: String,
    #[serde(default)]
    pub is_auction: Option<bool>,
    #[serde(default, alias = "labels", deserialize_with = "lenient_label")]
    pub label: Option<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub first_seen: i64,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub last_seen: i64,
    /// Query group that first reported the listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Listing {
    /// Builds a listing from an `/api/v1` search result.
    pub fn from_v1(payload: &Value, now: i64) -> Result<Self, MalformedRecordError> {
        let raw = decode_estate(payload)?;
        let price = raw.price.as_ref().and_then(value_as_i64).unwrap_or(0);
        Self::from_estate(raw, price, now)
    }

    /// Builds a listing from an `/api/cs/v2` estate. v2 carries the raw
    /// price separately from the displayed one, so it is preferred.
    pub fn from_v2(payload: &Value, now: i64) -> Result<Self, MalformedRecordError> {
        let raw = decode_estate(payload)?;
        let price = raw
            .price_czk
            .as_ref()
            .and_then(|p| p.value_raw.as_ref())
            .and_then(value_as_i64)
            .or_else(|| raw.price.as_ref().and_then(value_as_i64))
            .unwrap_or(0);
        Self::from_estate(raw, price, now)
    }

    pub fn from_raw(raw: &RawListing, now: i64) -> Result<Self, MalformedRecordError> {
        match raw.api {
            ApiVersion::V1 => Self::from_v1(&raw.payload, now),
            ApiVersion::V2 => Self::from_v2(&raw.payload, now),
        }
    }

    fn from_estate(raw: RawEstate, price: i64, now: i64) -> Result<Self, MalformedRecordError> {
        let id = raw
            .hash_id
            .as_ref()
            .and_then(id_to_string)
            .ok_or_else(|| MalformedRecordError("missing hash_id".to_string()))?;

        let link = raw
            .seo
            .as_ref()
            .map(|seo| detail_link(seo, &id))
            .unwrap_or_default();

        let image_ref = raw
            .links
            .as_ref()
            .and_then(|l| l.images.first())
            .and_then(|img| img.href.clone())
            .unwrap_or_default();

        Ok(Listing {
            id,
            price,
            location: raw.locality.unwrap_or_default(),
            name: raw.name.unwrap_or_default(),
            link,
            image_ref,
            is_auction: raw.is_auction,
            label: raw.labels_all.as_ref().and_then(first_label),
            first_seen: now,
            last_seen: now,
            group: None,
        })
    }

    pub fn days_since_first_seen(&self, now: i64) -> i64 {
        days_between(self.first_seen, now)
    }

    /// Multi-line summary for chat messages; the age is computed against `now`.
    pub fn to_display_text(&self, now: i64) -> String {
        let auction = match self.is_auction {
            Some(true) => "Yes",
            _ => "No",
        };
        format!(
            "*🏠 {name}*\n\
             * *Price*: {price}\n\
             * *Location*: {location}\n\
             * *Auction*: {auction}\n\
             * *Label*: {label}\n\
             * *Photo*: {photo}\n\
             * *Link*: {link}\n\
             * *First seen*: {days} days ago",
            name = self.name,
            price = format_price(self.price),
            location = self.location,
            label = self.label.as_deref().unwrap_or("N/A"),
            photo = self.image_ref,
            link = self.link,
            days = self.days_since_first_seen(now),
        )
    }

    pub fn to_storage_record(&self) -> Result<String, MalformedRecordError> {
        serde_json::to_string(self).map_err(|e| MalformedRecordError(e.to_string()))
    }

    pub fn from_storage_record(record: &str) -> Result<Self, MalformedRecordError> {
        serde_json::from_str(record).map_err(|e| MalformedRecordError(e.to_string()))
    }
}

fn decode_estate(payload: &Value) -> Result<RawEstate, MalformedRecordError> {
    if !payload.is_object() {
        return Err(MalformedRecordError("estate payload is not an object".into()));
    }
    serde_json::from_value(payload.clone()).map_err(|e| MalformedRecordError(e.to_string()))
}

fn id_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `labelsAll` is a list whose first entry is either a label or a list of labels.
fn first_label(v: &Value) -> Option<String> {
    let first = match v {
        Value::Array(items) => items.first()?,
        other => other,
    };
    match first {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(parts) => {
            let joined = parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn detail_link(seo: &Seo, id: &str) -> String {
    let Some(locality) = seo.locality.as_deref().filter(|l| !l.is_empty()) else {
        return String::new();
    };
    let category = category_path(seo).unwrap_or_else(|| DEFAULT_CATEGORY_PATH.to_string());
    format!("{DETAIL_BASE}/{category}/{locality}/{id}")
}

fn category_path(seo: &Seo) -> Option<String> {
    let kind = match seo.category_type_cb? {
        1 => "prodej",
        2 => "pronajem",
        3 => "drazby",
        _ => return None,
    };
    let main = match seo.category_main_cb? {
        1 => "byt",
        2 => "dum",
        3 => "pozemek",
        4 => "komercni",
        5 => "ostatni",
        _ => return None,
    };
    let sub = match seo.category_sub_cb? {
        2 => "1+kk",
        3 => "1+1",
        4 => "2+kk",
        5 => "2+1",
        6 => "3+kk",
        7 => "3+1",
        8 => "4+kk",
        9 => "4+1",
        10 => "5+kk",
        11 => "5+1",
        12 => "6-a-vice",
        16 => "atypicky",
        33 => "chata",
        35 => "pamatka",
        37 => "rodinny",
        39 => "vila",
        40 => "na-klic",
        43 => "chalupa",
        44 => "zemedelska-usedlost",
        54 => "vicegeneracni",
        _ => return None,
    };
    Some(format!("{kind}/{main}/{sub}"))
}

/// "Price on request" listings carry a placeholder price of 0 or 1.
pub fn is_placeholder_price(price: i64) -> bool {
    price == 0 || price == 1
}

/// Renders a price as "By Request" or with thousands separators, e.g. "5,200,000 Kc".
pub fn format_price(price: i64) -> String {
    if is_placeholder_price(price) {
        return "By Request".to_string();
    }
    format!("{} Kc", group_thousands(price))
}

pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Whole days elapsed between two epoch-second timestamps, floored.
pub fn days_between(from: i64, to: i64) -> i64 {
    (to - from).div_euclid(SECONDS_PER_DAY)
}

pub(crate) fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
}

/// Reads an epoch-seconds timestamp written as an integer, a float, or a
/// numeric string.
pub fn parse_timestamp(v: &Value) -> Option<i64> {
    let ts = match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.floor() as i64),
        _ => None,
    };
    ts.filter(|ts| *ts >= 0)
}

fn lenient_timestamp<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    parse_timestamp(&v).ok_or_else(|| serde::de::Error::custom(format!("bad timestamp: {v}")))
}

fn lenient_price<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    match v {
        Value::Null => Ok(0),
        other => value_as_i64(&other)
            .ok_or_else(|| serde::de::Error::custom(format!("bad price: {other}"))),
    }
}

fn lenient_label<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Array(_) => first_label(&Value::Array(vec![v])),
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn null_as_empty<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(d).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn v1_payload() -> Value {
        json!({
            "hash_id": 2_345_678_u64,
            "price": 7_490_000,
            "locality": "Brno - Žabovřesky",
            "name": "Prodej rodinného domu 140 m²",
            "is_auction": false,
            "labelsAll": [["garage", "parking_lots"], ["cellar"]],
            "seo": { "locality": "brno-zabovresky" },
            "_links": { "images": [{ "href": "https://img.example/1.jpg" }, { "href": "https://img.example/2.jpg" }] }
        })
    }

    #[test]
    fn test_from_v1_extracts_fields_and_synthesizes_link() {
        let listing = Listing::from_v1(&v1_payload(), NOW).unwrap();

        assert_eq!(listing.id, "2345678");
        assert_eq!(listing.price, 7_490_000);
        assert_eq!(listing.location, "Brno - Žabovřesky");
        assert_eq!(listing.image_ref, "https://img.example/1.jpg");
        assert_eq!(listing.is_auction, Some(false));
        assert_eq!(listing.label.as_deref(), Some("garage, parking_lots"));
        assert_eq!(
            listing.link,
            "https://www.sreality.cz/detail/prodej/dum/rodinny/brno-zabovresky/2345678"
        );
        assert_eq!(listing.first_seen, NOW);
        assert_eq!(listing.last_seen, NOW);
    }

    #[test]
    fn test_from_v2_prefers_raw_price_and_category_codes() {
        let payload = json!({
            "hash_id": "998877",
            "price": 1,
            "price_czk": { "value_raw": 6_100_000 },
            "locality": "Praha 6",
            "name": "Prodej bytu 3+kk",
            "seo": {
                "locality": "praha-6-dejvice",
                "category_type_cb": 1,
                "category_main_cb": 1,
                "category_sub_cb": 6
            }
        });

        let listing = Listing::from_v2(&payload, NOW).unwrap();

        assert_eq!(listing.id, "998877");
        assert_eq!(listing.price, 6_100_000);
        assert_eq!(
            listing.link,
            "https://www.sreality.cz/detail/prodej/byt/3+kk/praha-6-dejvice/998877"
        );
        assert_eq!(listing.image_ref, "");
        assert_eq!(listing.label, None);
        assert_eq!(listing.is_auction, None);
    }

    #[test]
    fn test_missing_optional_fields_degrade_to_empty() {
        let listing = Listing::from_v1(&json!({ "hash_id": 42 }), NOW).unwrap();

        assert_eq!(listing.price, 0);
        assert!(is_placeholder_price(listing.price));
        assert_eq!(listing.name, "");
        assert_eq!(listing.link, "");
    }

    #[test]
    fn test_missing_id_is_malformed() {
        assert!(Listing::from_v1(&json!({ "price": 100 }), NOW).is_err());
        assert!(Listing::from_v2(&json!({ "hash_id": "  " }), NOW).is_err());
        assert!(Listing::from_v1(&json!([1, 2, 3]), NOW).is_err());
    }

    #[test]
    fn test_storage_record_round_trip_keeps_provenance() {
        let mut listing = Listing::from_v1(&v1_payload(), NOW).unwrap();
        listing.first_seen = NOW - 5 * SECONDS_PER_DAY;

        let record = listing.to_storage_record().unwrap();
        let back = Listing::from_storage_record(&record).unwrap();

        assert_eq!(back, listing);
    }

    #[test]
    fn test_reads_records_from_older_writers() {
        let record = r#"{
            "id": "123", "price": 5000000, "location": "Brno", "is_auction": false,
            "labels": null, "name": "Dum", "link": null, "images": "https://img/1.jpg",
            "last_seen": 1700000123.75, "first_seen": "1699000000.5"
        }"#;

        let listing = Listing::from_storage_record(record).unwrap();

        assert_eq!(listing.image_ref, "https://img/1.jpg");
        assert_eq!(listing.link, "");
        assert_eq!(listing.last_seen, 1_700_000_123);
        assert_eq!(listing.first_seen, 1_699_000_000);
    }

    #[test]
    fn test_unparseable_timestamp_is_rejected() {
        let record = r#"{"id": "1", "price": 10, "first_seen": 1, "last_seen": "yesterday"}"#;
        assert!(Listing::from_storage_record(record).is_err());
    }

    #[test]
    fn test_display_text_renders_price_and_age() {
        let mut listing = Listing::from_v1(&v1_payload(), NOW).unwrap();
        listing.first_seen = NOW - 3 * SECONDS_PER_DAY - 60;

        let text = listing.to_display_text(NOW);
        assert!(text.contains("* *Price*: 7,490,000 Kc"));
        assert!(text.contains("* *Auction*: No"));
        assert!(text.contains("* *First seen*: 3 days ago"));

        listing.price = 1;
        assert!(listing.to_display_text(NOW).contains("* *Price*: By Request"));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(5_200_000), "5,200,000");
        assert_eq!(group_thousands(-12_345), "-12,345");
    }

    #[test]
    fn test_days_between_floors() {
        assert_eq!(days_between(NOW, NOW + SECONDS_PER_DAY - 1), 0);
        assert_eq!(days_between(NOW, NOW + SECONDS_PER_DAY), 1);
        assert_eq!(days_between(NOW, NOW - 1), -1);
    }
}
