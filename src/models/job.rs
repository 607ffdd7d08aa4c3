//! Work items issued by the hub.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

use crate::error::Result;

/// A feed to check for new items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", try_from = "RawSiteJob")]
pub struct SiteJob {
    /// Site identifier; the hub's `_id` wins over a plain `id`
    pub id: String,

    /// URL of the RSS/Atom feed
    pub rss_url: String,

    /// Checksum of the feed body the hub last saw
    pub rss_checksum: Option<String>,
}

/// Wire form of a feed job. Document stores send `_id`, sometimes next to
/// an `id` virtual.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSiteJob {
    #[serde(rename = "_id", default, deserialize_with = "optional_id")]
    document_id: Option<String>,

    #[serde(default, deserialize_with = "optional_id")]
    id: Option<String>,

    rss_url: String,

    #[serde(default)]
    rss_checksum: Option<String>,
}

impl TryFrom<RawSiteJob> for SiteJob {
    type Error = String;

    fn try_from(raw: RawSiteJob) -> std::result::Result<Self, Self::Error> {
        let id = raw
            .document_id
            .or(raw.id)
            .ok_or_else(|| "feed job without `_id` or `id`".to_string())?;
        Ok(Self {
            id,
            rss_url: raw.rss_url,
            rss_checksum: raw.rss_checksum,
        })
    }
}

/// A single page to scrape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostJob {
    #[serde(default)]
    pub url: Option<String>,

    /// Selector locating the post body on the page
    #[serde(default)]
    pub xpath: Option<String>,

    #[serde(default, deserialize_with = "lenient_id")]
    pub site: String,

    #[serde(default, deserialize_with = "lenient_id")]
    pub post: String,

    /// Checksum of the text extracted last time
    #[serde(default)]
    pub checksum: Option<String>,
}

impl PostJob {
    /// The page URL and selector, or `None` when either is missing or blank.
    pub fn target(&self) -> Option<(&str, &str)> {
        let url = self.url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let xpath = self
            .xpath
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        Some((url, xpath))
    }
}

/// Identifiers arrive as strings or plain numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Id {
    Text(String),
    Number(Number),
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        match id {
            Id::Text(text) => text,
            Id::Number(number) => number.to_string(),
        }
    }
}

fn optional_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<Id>::deserialize(deserializer)?.map(String::from))
}

fn lenient_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    Ok(optional_id(deserializer)?.unwrap_or_default())
}

/// Decode a job response body.
///
/// Empty bodies and empty JSON values (`null`, `{}`, `[]`, `false`, `""`)
/// mean "no job"; a body that is JSON but not a job is an error.
pub fn decode_job<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(body)?;
    let empty = match &value {
        Value::Null | Value::Bool(false) => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if empty {
        return Ok(None);
    }

    Ok(Some(serde_json::from_value(value)?))
}
