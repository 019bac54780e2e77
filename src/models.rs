use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Server-side record identifier.
///
/// The API hands out numeric ids for collections, images and links, but the
/// dispatcher treats them as opaque strings. Ids are compared by their text;
/// serialization writes back the JSON kind the id was read as, so `"007"`
/// stays a string and `7` stays a number.
#[derive(Debug, Clone)]
pub struct RecordId {
    text: String,
    numeric: bool,
}

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            text: id.into(),
            numeric: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the id goes out as a JSON number
    pub fn is_numeric(&self) -> bool {
        self.numeric
    }
}

impl PartialEq for RecordId {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for RecordId {}

impl Hash for RecordId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for RecordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self {
            text: id.to_string(),
            numeric: true,
        }
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.numeric {
            if let Ok(n) = self.text.parse::<i64>() {
                return serializer.serialize_i64(n);
            }
        }
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => Self::from(n),
            RawId::Text(s) => Self::new(s),
        })
    }
}

/// One page of a server listing.
///
/// The collection endpoints are not consistent about the name of the item
/// array (`items` on generic tables, `data` on images/links), so both are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedListing<T> {
    #[serde(alias = "data", default)]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page", deserialize_with = "at_least_one")]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default = "first_page", deserialize_with = "at_least_one")]
    pub total_pages: u32,
}

impl<T> PaginatedListing<T> {
    /// An empty single page, used before the first response arrives
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            page_size: 0,
            total_pages: 1,
        }
    }
}

fn first_page() -> u32 {
    1
}

/// Missing, null and zero page counts all collapse to a single page
fn at_least_one<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Option::<u32>::deserialize(deserializer)?;
    Ok(value.unwrap_or(1).max(1))
}

/// Image stored under an image collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: RecordId,
    /// Data URI or URL the browser can display directly
    pub image: String,
}

/// Collection record carrying images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCollection {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
}

impl ImageCollection {
    pub fn upload_date(&self) -> Option<NaiveDate> {
        self.created_at.as_deref().and_then(parse_date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub id: RecordId,
    pub url: String,
}

/// Collection record carrying external links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkCollection {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub links: Vec<LinkEntry>,
}

/// Parse the date part of a server timestamp.
///
/// Accepts RFC 3339, a naive `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS`,
/// or a bare date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Body for creating an image collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageCreatePayload {
    pub title: String,
    pub description: String,
    /// Complete data URIs, one per image
    pub images: Vec<String>,
}

/// Body for updating an image collection. `images` only present when files were added.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUpdatePayload {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// Body for creating or updating a link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkPayload {
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<RecordId>,
}

/// Body sent with a link deletion so the server can find the owning collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkDeleteBody {
    pub product_id: RecordId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_accepts_data_or_items() {
        let from_data: PaginatedListing<serde_json::Value> = serde_json::from_value(json!({
            "data": [{"id": 1}],
            "total": 11,
            "page": 2,
            "pageSize": 10,
            "totalPages": 2
        }))
        .unwrap();
        assert_eq!(from_data.items.len(), 1);
        assert_eq!(from_data.total_pages, 2);
        assert_eq!(from_data.page_size, 10);

        let from_items: PaginatedListing<serde_json::Value> =
            serde_json::from_value(json!({"items": [{"id": 1}, {"id": 2}]})).unwrap();
        assert_eq!(from_items.items.len(), 2);
        assert_eq!(from_items.page, 1);
        assert_eq!(from_items.total_pages, 1);
    }

    #[test]
    fn test_listing_zero_or_null_total_pages_is_one_page() {
        let listing: PaginatedListing<serde_json::Value> =
            serde_json::from_value(json!({"items": [], "totalPages": 0})).unwrap();
        assert_eq!(listing.total_pages, 1);

        let listing: PaginatedListing<serde_json::Value> =
            serde_json::from_value(json!({"items": [], "totalPages": null})).unwrap();
        assert_eq!(listing.total_pages, 1);
    }

    #[test]
    fn test_record_id_round_trips_numbers_as_numbers() {
        let id: RecordId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(id.as_str(), "42");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!(42));

        let id: RecordId = serde_json::from_value(json!("abc-1")).unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("abc-1"));
    }

    #[test]
    fn test_record_id_keeps_string_kind_of_digit_ids() {
        let id: RecordId = serde_json::from_value(json!("007")).unwrap();
        assert!(!id.is_numeric());
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("007"));

        let body = LinkDeleteBody { product_id: id };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"product_id": "007"})
        );

        // Lookups still match across kinds
        assert_eq!(RecordId::from(7), RecordId::from("7"));
        assert_ne!(RecordId::from(7), RecordId::from("007"));
    }

    #[test]
    fn test_update_payload_omits_images_when_none() {
        let payload = ImageUpdatePayload {
            title: "Bronze".to_string(),
            description: "Cast".to_string(),
            images: None,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"title": "Bronze", "description": "Cast"})
        );
    }

    #[test]
    fn test_parse_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_date("2024-03-09T10:11:12.000Z"), Some(expected));
        assert_eq!(parse_date("2024-03-09 10:11:12"), Some(expected));
        assert_eq!(parse_date("2024-03-09"), Some(expected));
        assert_eq!(parse_date("yesterday"), None);
    }
}
