//! Feed record shapes and the store timestamp adapter.
//!
//! The remote store pushes loosely shaped documents (`{id, ...fields}`).
//! Each feed translates them into one of the record types here, normalizing
//! `createdAt`/`updatedAt` from whatever timestamp encoding the store uses
//! into a plain UTC instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Field holding the creation timestamp.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Field holding the last-update timestamp.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// A document as pushed by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Document id within its collection.
    pub id: String,
    /// Every other field, untouched.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawDocument {
    /// Create a document with no fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Add a field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Convert a store timestamp into a UTC instant.
///
/// Accepted encodings:
/// - `{"seconds": i64, "nanoseconds": u32}` (also `_seconds`/`_nanoseconds`)
/// - RFC 3339 strings
/// - integer milliseconds since the Unix epoch
pub fn normalize_timestamp(raw: &Value) -> Result<DateTime<Utc>> {
    match raw {
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)
                .ok_or_else(|| Error::InvalidTimestamp(format!("missing seconds in {}", raw)))?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let nanos = u32::try_from(nanos)
                .map_err(|_| Error::InvalidTimestamp(format!("nanoseconds out of range: {}", nanos)))?;
            DateTime::<Utc>::from_timestamp(seconds, nanos)
                .ok_or_else(|| Error::InvalidTimestamp(format!("out of range: {}", raw)))
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::InvalidTimestamp(format!("{}: {}", s, e))),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| Error::InvalidTimestamp(format!("not epoch millis: {}", n))),
        other => Err(Error::InvalidTimestamp(format!("unsupported value: {}", other))),
    }
}

/// Remove `name` from `fields` and normalize it. Absent or null yields `None`.
fn take_timestamp(
    feed: &str,
    fields: &mut Map<String, Value>,
    name: &str,
) -> Result<Option<DateTime<Utc>>> {
    match fields.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => normalize_timestamp(&raw)
            .map(Some)
            .map_err(|e| Error::malformed(feed, format!("{}: {}", name, e))),
    }
}

fn take_required_string(
    feed: &str,
    fields: &mut Map<String, Value>,
    name: &str,
) -> Result<String> {
    match fields.remove(name) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::malformed(
            feed,
            format!("{} must be a string, got {}", name, other),
        )),
        None => Err(Error::malformed(feed, format!("missing {}", name))),
    }
}

fn take_optional_string(
    feed: &str,
    fields: &mut Map<String, Value>,
    name: &str,
) -> Result<Option<String>> {
    match fields.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::malformed(
            feed,
            format!("{} must be a string, got {}", name, other),
        )),
    }
}

/// A record type a feed delivers.
pub trait FeedRecord: Sized {
    /// Feed name used in errors and logs.
    const FEED: &'static str;

    /// Translate a pushed document.
    fn from_document(doc: RawDocument) -> Result<Self>;
}

/// An image in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Remaining fields (title, prompt, URLs, tag ids, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ImageRecord {
    /// Get a non-timestamp field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl FeedRecord for ImageRecord {
    const FEED: &'static str = "images";

    fn from_document(doc: RawDocument) -> Result<Self> {
        let mut fields = doc.fields;
        let created_at = take_timestamp(Self::FEED, &mut fields, CREATED_AT_FIELD)?;
        let updated_at = take_timestamp(Self::FEED, &mut fields, UPDATED_AT_FIELD)?;
        Ok(Self {
            id: doc.id,
            created_at,
            updated_at,
            fields,
        })
    }
}

/// A tag that can be attached to images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    pub id: String,
    pub name: String,
    /// Owning tag group, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl FeedRecord for TagRecord {
    const FEED: &'static str = "tags";

    fn from_document(doc: RawDocument) -> Result<Self> {
        let mut fields = doc.fields;
        Ok(Self {
            id: doc.id,
            name: take_required_string(Self::FEED, &mut fields, "name")?,
            group_id: take_optional_string(Self::FEED, &mut fields, "groupId")?,
            color: take_optional_string(Self::FEED, &mut fields, "color")?,
            created_at: take_timestamp(Self::FEED, &mut fields, CREATED_AT_FIELD)?,
            updated_at: take_timestamp(Self::FEED, &mut fields, UPDATED_AT_FIELD)?,
            fields,
        })
    }
}

/// A named group of tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagGroupRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl FeedRecord for TagGroupRecord {
    const FEED: &'static str = "tagGroups";

    fn from_document(doc: RawDocument) -> Result<Self> {
        let mut fields = doc.fields;
        Ok(Self {
            id: doc.id,
            name: take_required_string(Self::FEED, &mut fields, "name")?,
            created_at: take_timestamp(Self::FEED, &mut fields, CREATED_AT_FIELD)?,
            updated_at: take_timestamp(Self::FEED, &mut fields, UPDATED_AT_FIELD)?,
            fields,
        })
    }
}

/// Translate every document of a collection snapshot, failing on the first bad one.
pub fn translate_collection<R: FeedRecord>(docs: Vec<RawDocument>) -> Result<Vec<R>> {
    docs.into_iter().map(R::from_document).collect()
}

/// Last known value of a feed, as held in the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedSnapshot {
    Images(Vec<ImageRecord>),
    /// `None` when the document does not exist.
    Image(Option<ImageRecord>),
    Tags(Vec<TagRecord>),
    TagGroups(Vec<TagGroupRecord>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_store_timestamp() {
        let ts = normalize_timestamp(&json!({"seconds": 1_700_000_000, "nanoseconds": 500_000_000}))
            .unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);

        let underscored = normalize_timestamp(&json!({"_seconds": 1_700_000_000})).unwrap();
        assert_eq!(underscored.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_normalize_string_and_millis() {
        let from_str = normalize_timestamp(&json!("2024-03-01T12:00:00+02:00")).unwrap();
        assert_eq!(from_str.to_rfc3339(), "2024-03-01T10:00:00+00:00");

        let from_millis = normalize_timestamp(&json!(1_700_000_000_123i64)).unwrap();
        assert_eq!(from_millis.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_timestamp(&json!("yesterday")).is_err());
        assert!(normalize_timestamp(&json!(true)).is_err());
        assert!(normalize_timestamp(&json!({"nanoseconds": 1})).is_err());
        assert!(normalize_timestamp(&json!(1.5)).is_err());
    }

    #[test]
    fn test_image_record_from_document() {
        let doc = RawDocument::new("a")
            .with_field("name", "x")
            .with_field("createdAt", json!({"seconds": 10, "nanoseconds": 0}))
            .with_field("updatedAt", Value::Null);

        let image = ImageRecord::from_document(doc).unwrap();

        assert_eq!(image.id, "a");
        assert_eq!(image.get("name"), Some(&json!("x")));
        assert_eq!(image.created_at.map(|t| t.timestamp()), Some(10));
        assert!(image.updated_at.is_none());
        assert!(image.get("createdAt").is_none());
    }

    #[test]
    fn test_image_record_bad_timestamp_is_malformed() {
        let doc = RawDocument::new("a").with_field("createdAt", "not a date");
        let err = ImageRecord::from_document(doc).unwrap_err();
        assert!(matches!(err, Error::MalformedSnapshot { ref feed, .. } if feed == "images"));
    }

    #[test]
    fn test_tag_requires_name() {
        let err = TagRecord::from_document(RawDocument::new("t1")).unwrap_err();
        assert_eq!(err, Error::malformed("tags", "missing name"));

        let tag = TagRecord::from_document(
            RawDocument::new("t1")
                .with_field("name", "portrait")
                .with_field("groupId", "g1")
                .with_field("usage", 3),
        )
        .unwrap();
        assert_eq!(tag.name, "portrait");
        assert_eq!(tag.group_id.as_deref(), Some("g1"));
        assert_eq!(tag.fields.get("usage"), Some(&json!(3)));
    }

    #[test]
    fn test_translate_collection_fails_on_first_bad_document() {
        let docs = vec![
            RawDocument::new("g1").with_field("name", "Style"),
            RawDocument::new("g2").with_field("name", 42),
        ];
        assert!(translate_collection::<TagGroupRecord>(docs).is_err());
    }

    #[test]
    fn test_image_record_serializes_flat() {
        let image = ImageRecord::from_document(
            RawDocument::new("a").with_field("name", "x").with_field("createdAt", 0),
        )
        .unwrap();

        let value = serde_json::to_value(&image).unwrap();
        assert_eq!(value["id"], "a");
        assert_eq!(value["name"], "x");
        assert_eq!(value["createdAt"], "1970-01-01T00:00:00Z");
    }
}
