use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::store::{CommitReceipt, CommitRequest, DocumentStore, apply_write, validate_commit};
use crate::{Document, DocumentId, DocumentKey, DocumentQuery, DocumentStoreError, Result, Version};

type Collections = HashMap<String, BTreeMap<DocumentId, Document>>;

/// In-memory document store implementation for testing and local runs.
///
/// Provides the same commit semantics as the PostgreSQL implementation: a
/// commit holds the write lock while it checks preconditions and stages the
/// writes, so it is serializable with respect to other commits.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
    commits: Arc<AtomicU64>,
    injected_conflicts: Arc<AtomicUsize>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Returns the number of successful commits.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Makes the next `count` commits that carry preconditions fail with a
    /// concurrency conflict, as if another writer got there first.
    pub fn inject_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Clears all documents.
    pub async fn clear(&self) {
        self.collections.write().await.clear();
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn current(collections: &Collections, key: &DocumentKey) -> Option<Document> {
    collections
        .get(&key.collection)
        .and_then(|docs| docs.get(&key.id))
        .cloned()
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(current(&collections, key))
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let documents: Vec<Document> = collections
            .get(&query.collection)
            .map(|docs| docs.values().filter(|d| query.matches(d)).cloned().collect())
            .unwrap_or_default();
        Ok(query.arrange(documents))
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitReceipt> {
        validate_commit(&request)?;

        let mut collections = self.collections.write().await;

        if let Some(first) = request.preconditions.first()
            && self.take_injected_conflict()
        {
            let actual = current(&collections, &first.key)
                .map(|d| d.version)
                .unwrap_or(Version::initial());
            return Err(DocumentStoreError::ConcurrencyConflict {
                key: first.key.clone(),
                expected: first.expected,
                actual: actual.next(),
            });
        }

        for precondition in &request.preconditions {
            let actual = current(&collections, &precondition.key)
                .map(|d| d.version)
                .unwrap_or(Version::initial());
            if actual != precondition.expected {
                return Err(DocumentStoreError::ConcurrencyConflict {
                    key: precondition.key.clone(),
                    expected: precondition.expected,
                    actual,
                });
            }
        }

        // Stage every write before touching the collections
        let now = Utc::now();
        let mut staged: HashMap<DocumentKey, Option<Document>> = HashMap::new();
        for op in &request.writes {
            let key = op.key();
            let before = match staged.remove(key) {
                Some(doc) => doc,
                None => current(&collections, key),
            };
            let after = apply_write(before, op, now)?;
            staged.insert(key.clone(), after);
        }

        let mut versions = HashMap::with_capacity(staged.len());
        for (key, doc) in staged {
            let docs = collections.entry(key.collection.clone()).or_default();
            match doc {
                Some(doc) => {
                    versions.insert(key.clone(), doc.version);
                    docs.insert(key.id, doc);
                }
                None => {
                    docs.remove(&key.id);
                }
            }
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(CommitReceipt {
            commit_time: now,
            versions,
        })
    }
}
