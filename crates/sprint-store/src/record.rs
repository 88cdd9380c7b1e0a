//! Records, ids and pages
//!
//! A [`Record`] is an untyped row: store-assigned metadata plus a JSON field
//! map. Typed entities move in and out of it through [`Record::decode`] and
//! [`encode`].

use crate::error::{InvalidRecordId, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use ulid::Ulid;

/// Field map of a record
pub type Fields = Map<String, Value>;

/// Metadata keys owned by the store, never stored in [`Record::fields`]
pub const META_FIELDS: [&str; 4] = ["id", "collection", "created", "updated"];

const MAX_ID_LEN: usize = 64;

/// Record identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate new record ID (lowercase ULID, sortable by creation)
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }

    /// Parse and validate a record id
    ///
    /// # Errors
    /// Returns [`InvalidRecordId`] for empty, oversized or non `[A-Za-z0-9_-]` input
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidRecordId> {
        let value = value.into();
        let reason = if value.is_empty() {
            Some("empty")
        } else if value.len() > MAX_ID_LEN {
            Some("longer than 64 characters")
        } else if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            Some("only ASCII letters, digits, '_' and '-' are allowed")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InvalidRecordId { value, reason }),
            None => Ok(Self(value)),
        }
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = InvalidRecordId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        Value::String(id.0)
    }
}

impl From<&RecordId> for Value {
    fn from(id: &RecordId) -> Self {
        Value::String(id.0.clone())
    }
}

/// Render a timestamp the way the store stores it
#[inline]
#[must_use]
pub fn time_value(at: &DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// A stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned id
    pub id: RecordId,
    /// Owning collection
    pub collection: String,
    /// Creation time (strictly increasing per store)
    pub created: DateTime<Utc>,
    /// Last update time
    pub updated: DateTime<Utc>,
    /// User fields
    pub fields: Fields,
}

impl Record {
    /// Look up a field, including the metadata fields
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            "id" => Some(Cow::Owned(Value::from(&self.id))),
            "collection" => Some(Cow::Owned(Value::String(self.collection.clone()))),
            "created" => Some(Cow::Owned(time_value(&self.created))),
            "updated" => Some(Cow::Owned(time_value(&self.updated))),
            _ => self.fields.get(name).map(Cow::Borrowed),
        }
    }

    /// Decode into a typed entity
    ///
    /// Metadata fields are merged in, so entities may declare `id` and
    /// `created` members.
    ///
    /// # Errors
    /// Returns [`StoreError::Decode`] if the fields do not match `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut map = self.fields.clone();
        map.insert("id".to_string(), Value::from(&self.id));
        map.insert("created".to_string(), time_value(&self.created));
        map.insert("updated".to_string(), time_value(&self.updated));

        serde_json::from_value(Value::Object(map)).map_err(|source| StoreError::Decode {
            collection: self.collection.clone(),
            source,
        })
    }
}

/// Encode a typed entity into a field map, dropping store metadata
///
/// # Errors
/// Returns [`StoreError::InvalidQuery`] if the value does not serialize to an object
pub fn encode<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(mut map)) => {
            for key in META_FIELDS {
                map.remove(key);
            }
            Ok(map)
        }
        Ok(other) => Err(StoreError::InvalidQuery(format!(
            "entity must serialize to an object, got {other}"
        ))),
        Err(e) => Err(StoreError::InvalidQuery(format!("entity not serializable: {e}"))),
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// 1-based page number
    pub page: u32,
    /// Requested page size
    pub per_page: u32,
    /// Items matching the filter across all pages
    pub total_items: u64,
    /// Number of pages (0 when nothing matched)
    pub total_pages: u32,
}

impl<T> ListPage<T> {
    /// Whether no further page exists
    #[inline]
    #[must_use]
    pub fn is_last_page(&self) -> bool {
        self.page >= self.total_pages
    }

    /// Convert items, keeping page metadata
    ///
    /// # Errors
    /// Propagates the first conversion error
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<ListPage<U>, E> {
        Ok(ListPage {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            page: self.page,
            per_page: self.per_page,
            total_items: self.total_items,
            total_pages: self.total_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Note {
        id: RecordId,
        title: String,
        #[serde(default)]
        pinned: bool,
    }

    fn record(fields: Value) -> Record {
        let now = Utc::now();
        Record {
            id: RecordId::parse("note1").unwrap(),
            collection: "notes".to_string(),
            created: now,
            updated: now,
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn record_id_validation() {
        assert!(RecordId::parse("abc_123-x").is_ok());
        assert!(RecordId::parse("").is_err());
        assert!(RecordId::parse("has space").is_err());
        assert!(RecordId::parse("x".repeat(65)).is_err());
        assert!(RecordId::parse(RecordId::generate().to_string()).is_ok());
    }

    #[test]
    fn decode_merges_metadata() {
        let rec = record(json!({ "title": "hello" }));
        let note: Note = rec.decode().unwrap();
        assert_eq!(note.id.as_str(), "note1");
        assert_eq!(note.title, "hello");
        assert!(!note.pinned);
    }

    #[test]
    fn decode_reports_collection() {
        let rec = record(json!({ "title": 7 }));
        let err = rec.decode::<Note>().unwrap_err();
        assert!(matches!(err, StoreError::Decode { ref collection, .. } if collection == "notes"));
    }

    #[test]
    fn encode_strips_metadata() {
        let note = Note {
            id: RecordId::parse("n").unwrap(),
            title: "t".to_string(),
            pinned: true,
        };
        let fields = encode(&note).unwrap();
        assert!(!fields.contains_key("id"));
        assert_eq!(fields.get("pinned"), Some(&json!(true)));
    }

    #[test]
    fn encode_rejects_non_objects() {
        assert!(encode(&42).is_err());
    }

    #[test]
    fn field_exposes_metadata() {
        let rec = record(json!({ "title": "x" }));
        assert_eq!(rec.field("id").unwrap().as_str(), Some("note1"));
        assert!(rec.field("created").is_some());
        assert!(rec.field("missing").is_none());
    }

    #[test]
    fn list_page_last_page() {
        let page = ListPage::<u8> {
            items: vec![],
            page: 1,
            per_page: 10,
            total_items: 0,
            total_pages: 0,
        };
        assert!(page.is_last_page());
    }
}
