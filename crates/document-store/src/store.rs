use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{Document, DocumentKey, DocumentQuery, DocumentStoreError, Result, Version};

/// A version check performed atomically with the writes of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    pub key: DocumentKey,

    /// The version the document must still have. `Version::initial()`
    /// requires the document to be absent.
    pub expected: Version,
}

/// A single buffered write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Inserts a new document; fails if it exists.
    Create { key: DocumentKey, data: Value },

    /// Replaces the document body, creating it if needed.
    Set { key: DocumentKey, data: Value },

    /// Shallow-merges top-level fields into an existing document.
    Merge {
        key: DocumentKey,
        fields: Map<String, Value>,
    },

    /// Removes an existing document.
    Delete { key: DocumentKey },
}

impl WriteOp {
    /// Returns the key this write targets.
    pub fn key(&self) -> &DocumentKey {
        match self {
            WriteOp::Create { key, .. }
            | WriteOp::Set { key, .. }
            | WriteOp::Merge { key, .. }
            | WriteOp::Delete { key } => key,
        }
    }
}

/// Everything a transaction wants to apply atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitRequest {
    pub preconditions: Vec<Precondition>,
    pub writes: Vec<WriteOp>,
}

impl CommitRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a version precondition.
    pub fn expect(mut self, key: DocumentKey, expected: Version) -> Self {
        self.preconditions.push(Precondition { key, expected });
        self
    }

    /// Adds a write.
    pub fn write(mut self, op: WriteOp) -> Self {
        self.writes.push(op);
        self
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    /// Time assigned by the store to every write of the commit.
    pub commit_time: DateTime<Utc>,

    /// Version of each written document after the commit (absent after a delete).
    pub versions: HashMap<DocumentKey, Version>,
}

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a single document.
    async fn get(&self, key: &DocumentKey) -> Result<Option<Document>>;

    /// Reads the documents of a collection matching a query.
    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>>;

    /// Applies a commit atomically.
    ///
    /// Every precondition is checked first; a mismatch fails the whole commit
    /// with `ConcurrencyConflict`. Writes are then applied in order. If any
    /// write fails (`AlreadyExists`, `NotFound`) nothing is applied.
    async fn commit(&self, request: CommitRequest) -> Result<CommitReceipt>;
}

/// Extension trait providing single-write convenience methods.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Inserts a new document and returns it.
    async fn create(&self, key: DocumentKey, data: Value) -> Result<Document> {
        self.commit(CommitRequest::new().write(WriteOp::Create {
            key: key.clone(),
            data,
        }))
        .await?;
        self.get(&key).await?.ok_or(DocumentStoreError::NotFound(key))
    }

    /// Replaces (or creates) a document and returns it.
    async fn set(&self, key: DocumentKey, data: Value) -> Result<Document> {
        self.commit(CommitRequest::new().write(WriteOp::Set {
            key: key.clone(),
            data,
        }))
        .await?;
        self.get(&key).await?.ok_or(DocumentStoreError::NotFound(key))
    }

    /// Merges fields into an existing document and returns it.
    async fn merge(&self, key: DocumentKey, fields: Map<String, Value>) -> Result<Document> {
        self.commit(CommitRequest::new().write(WriteOp::Merge {
            key: key.clone(),
            fields,
        }))
        .await?;
        self.get(&key).await?.ok_or(DocumentStoreError::NotFound(key))
    }

    /// Deletes an existing document.
    async fn delete(&self, key: DocumentKey) -> Result<()> {
        self.commit(CommitRequest::new().write(WriteOp::Delete { key }))
            .await?;
        Ok(())
    }

    /// Reads every document of a collection.
    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        self.query(DocumentQuery::collection(collection)).await
    }

    /// Checks if a document exists.
    async fn exists(&self, key: &DocumentKey) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// Validates a commit request before it touches storage.
pub fn validate_commit(request: &CommitRequest) -> Result<()> {
    if request.writes.is_empty() {
        return Err(DocumentStoreError::InvalidCommit(
            "Cannot commit an empty write list".to_string(),
        ));
    }

    let mut expected: HashMap<&DocumentKey, Version> = HashMap::new();
    for precondition in &request.preconditions {
        if let Some(previous) = expected.insert(&precondition.key, precondition.expected)
            && previous != precondition.expected
        {
            return Err(DocumentStoreError::InvalidCommit(format!(
                "Conflicting preconditions for {}: {} and {}",
                precondition.key, previous, precondition.expected
            )));
        }
    }

    let mut created = HashSet::new();
    for write in &request.writes {
        let key = write.key();
        if key.collection.is_empty() || key.id.as_str().is_empty() {
            return Err(DocumentStoreError::InvalidCommit(format!(
                "Invalid document key '{key}'"
            )));
        }
        if matches!(write, WriteOp::Create { .. }) && !created.insert(key) {
            return Err(DocumentStoreError::InvalidCommit(format!(
                "Document {key} is created twice"
            )));
        }
    }

    Ok(())
}

/// Applies a write to the staged state of one document.
///
/// Shared by the in-memory store and tests so both agree on merge/create
/// semantics.
pub(crate) fn apply_write(
    current: Option<Document>,
    op: &WriteOp,
    now: DateTime<Utc>,
) -> Result<Option<Document>> {
    match op {
        WriteOp::Create { key, data } => match current {
            Some(_) => Err(DocumentStoreError::AlreadyExists(key.clone())),
            None => Ok(Some(Document {
                key: key.clone(),
                version: Version::first(),
                data: data.clone(),
                created_at: now,
                updated_at: now,
            })),
        },
        WriteOp::Set { key, data } => Ok(Some(match current {
            Some(doc) => Document {
                version: doc.version.next(),
                data: data.clone(),
                updated_at: now,
                ..doc
            },
            None => Document {
                key: key.clone(),
                version: Version::first(),
                data: data.clone(),
                created_at: now,
                updated_at: now,
            },
        })),
        WriteOp::Merge { key, fields } => {
            let mut doc = current.ok_or_else(|| DocumentStoreError::NotFound(key.clone()))?;
            match doc.data {
                Value::Object(ref mut body) => {
                    for (field, value) in fields {
                        body.insert(field.clone(), value.clone());
                    }
                }
                _ => doc.data = Value::Object(fields.clone()),
            }
            doc.version = doc.version.next();
            doc.updated_at = now;
            Ok(Some(doc))
        }
        WriteOp::Delete { key } => match current {
            Some(_) => Ok(None),
            None => Err(DocumentStoreError::NotFound(key.clone())),
        },
    }
}
