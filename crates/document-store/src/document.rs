use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{DocumentId, Result};

/// Version number of a stored document, used for optimistic concurrency control.
///
/// A missing document is at version 0. The first write produces version 1 and
/// every later write increments it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a document that does not exist (0).
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version after the first write (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// Location of a document: its collection plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey {
    pub collection: String,
    pub id: DocumentId,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, id: impl Into<DocumentId>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A stored document with its store-managed metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub key: DocumentKey,

    /// Version after the last write.
    pub version: Version,

    /// The document body.
    pub data: serde_json::Value,

    /// Set by the store on the first write.
    pub created_at: DateTime<Utc>,

    /// Set by the store on every write.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Returns the document id.
    pub fn id(&self) -> &DocumentId {
        &self.key.id
    }

    /// Deserializes the document body into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Looks up a field by dotted path (`"weather.wind"`).
    pub fn field(&self, path: &str) -> Option<&serde_json::Value> {
        lookup_path(&self.data, path)
    }
}

pub(crate) fn lookup_path<'v>(
    value: &'v serde_json::Value,
    path: &str,
) -> Option<&'v serde_json::Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_sequence() {
        assert_eq!(Version::initial().next(), Version::first());
        assert!(Version::new(3) > Version::first());
    }

    #[test]
    fn key_display_joins_collection_and_id() {
        let key = DocumentKey::new("products", "abc");
        assert_eq!(key.to_string(), "products/abc");
    }

    #[test]
    fn field_lookup_follows_dotted_path() {
        let now = Utc::now();
        let doc = Document {
            key: DocumentKey::new("fumigations", "f1"),
            version: Version::first(),
            data: serde_json::json!({"weather": {"wind": 12}, "status": "pending"}),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(doc.field("weather.wind"), Some(&serde_json::json!(12)));
        assert_eq!(doc.field("status"), Some(&serde_json::json!("pending")));
        assert!(doc.field("weather.rain").is_none());
    }
}
