//! Optimistic multi-document transactions.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::store::{CommitReceipt, CommitRequest, DocumentStore, Precondition, WriteOp};
use crate::{Document, DocumentKey, DocumentStoreError, Result, Version};

/// A read-then-write unit of work against a [`DocumentStore`].
///
/// Reads go straight to the store and record the observed version; writes
/// are buffered. On commit every observed version becomes a precondition, so
/// the commit fails with `ConcurrencyConflict` if anything the transaction
/// read has changed since.
///
/// All reads must happen before the first write. A document read twice
/// returns the snapshot taken by the first read.
pub struct Transaction<'s> {
    store: &'s dyn DocumentStore,
    reads: HashMap<DocumentKey, Option<Document>>,
    writes: Vec<WriteOp>,
}

impl<'s> Transaction<'s> {
    /// Starts a new transaction against the store.
    pub fn new(store: &'s dyn DocumentStore) -> Self {
        Self {
            store,
            reads: HashMap::new(),
            writes: Vec::new(),
        }
    }

    /// Reads a document, recording its version.
    pub async fn get(&mut self, key: &DocumentKey) -> Result<Option<Document>> {
        if let Some(snapshot) = self.reads.get(key) {
            return Ok(snapshot.clone());
        }
        if !self.writes.is_empty() {
            return Err(DocumentStoreError::ReadAfterWrite(key.clone()));
        }

        let document = self.store.get(key).await?;
        self.reads.insert(key.clone(), document.clone());
        Ok(document)
    }

    /// Reads and deserializes a document.
    pub async fn get_as<T: DeserializeOwned>(&mut self, key: &DocumentKey) -> Result<Option<T>> {
        self.get(key).await?.map(|doc| doc.decode()).transpose()
    }

    /// Buffers the creation of a new document.
    pub fn create(&mut self, key: DocumentKey, data: Value) {
        self.writes.push(WriteOp::Create { key, data });
    }

    /// Buffers the creation of a new document from a serializable value.
    pub fn create_as<T: Serialize>(&mut self, key: DocumentKey, value: &T) -> Result<()> {
        let data = serde_json::to_value(value)?;
        self.create(key, data);
        Ok(())
    }

    /// Buffers a full replacement of a document.
    pub fn set(&mut self, key: DocumentKey, data: Value) {
        self.writes.push(WriteOp::Set { key, data });
    }

    /// Buffers a full replacement of a document from a serializable value.
    pub fn set_as<T: Serialize>(&mut self, key: DocumentKey, value: &T) -> Result<()> {
        let data = serde_json::to_value(value)?;
        self.set(key, data);
        Ok(())
    }

    /// Buffers a shallow merge of top-level fields.
    pub fn merge(&mut self, key: DocumentKey, fields: Map<String, Value>) {
        self.writes.push(WriteOp::Merge { key, fields });
    }

    /// Buffers a deletion.
    pub fn delete(&mut self, key: DocumentKey) {
        self.writes.push(WriteOp::Delete { key });
    }

    /// Returns the number of buffered writes.
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Converts the transaction into the request sent to the store.
    pub fn into_request(self) -> CommitRequest {
        let preconditions = self
            .reads
            .into_iter()
            .map(|(key, snapshot)| Precondition {
                key,
                expected: snapshot.map(|d| d.version).unwrap_or(Version::initial()),
            })
            .collect();

        CommitRequest {
            preconditions,
            writes: self.writes,
        }
    }

    /// Commits the buffered writes.
    ///
    /// A transaction without writes commits nothing and returns `None`.
    pub async fn commit(self) -> Result<Option<CommitReceipt>> {
        if self.writes.is_empty() {
            return Ok(None);
        }
        let store = self.store;
        let request = self.into_request();
        store.commit(request).await.map(Some)
    }
}

/// How many times a conflicting transaction is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Pause between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(10),
        }
    }
}

/// The body of a transaction.
///
/// `run` may be called several times: once per attempt. It must only touch
/// the store through the transaction it is given.
#[async_trait]
pub trait TransactionWork: Send + Sync {
    /// Value produced by a successful attempt.
    type Output: Send;

    /// Error produced by the body. Store errors must convert into it.
    type Error: From<DocumentStoreError> + Send;

    /// Performs the reads and buffers the writes of one attempt.
    async fn run(&self, tx: &mut Transaction<'_>) -> std::result::Result<Self::Output, Self::Error>;
}

/// Runs a transaction body, committing and retrying on conflicts.
///
/// An error returned by the body aborts the transaction: nothing is written
/// and the error is returned unchanged. A `ConcurrencyConflict` at commit
/// time restarts the body with fresh reads until the policy is exhausted.
pub async fn run_transaction<W>(
    store: &dyn DocumentStore,
    policy: &RetryPolicy,
    work: &W,
) -> std::result::Result<W::Output, W::Error>
where
    W: TransactionWork + ?Sized,
{
    let mut attempt = 1;
    loop {
        let mut tx = Transaction::new(store);
        let output = work.run(&mut tx).await?;

        match tx.commit().await {
            Ok(_) => return Ok(output),
            Err(err) if err.is_conflict() && attempt < policy.max_attempts => {
                metrics::counter!("document_store_transaction_retries_total").increment(1);
                tracing::debug!(attempt, error = %err, "transaction conflict, retrying");
                attempt += 1;
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(err) => {
                if err.is_conflict() {
                    tracing::warn!(attempts = attempt, error = %err, "transaction retries exhausted");
                }
                return Err(err.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;
    use crate::InMemoryDocumentStore;
    use crate::store::DocumentStoreExt;

    fn counter() -> DocumentKey {
        DocumentKey::new("counters", "c1")
    }

    struct Increment {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl TransactionWork for Increment {
        type Output = i64;
        type Error = DocumentStoreError;

        async fn run(&self, tx: &mut Transaction<'_>) -> Result<i64> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let doc = tx
                .get(&counter())
                .await?
                .ok_or_else(|| DocumentStoreError::NotFound(counter()))?;
            let value = doc.data["value"].as_i64().unwrap_or(0) + 1;
            tx.set(counter(), json!({ "value": value }));
            Ok(value)
        }
    }

    #[tokio::test]
    async fn read_after_write_is_rejected() {
        let store = InMemoryDocumentStore::new();
        let mut tx = Transaction::new(&store);
        tx.set(counter(), json!({}));

        let result = tx.get(&DocumentKey::new("counters", "other")).await;
        assert!(matches!(result, Err(DocumentStoreError::ReadAfterWrite(_))));
    }

    #[tokio::test]
    async fn reads_become_preconditions() {
        let store = InMemoryDocumentStore::new();
        store.create(counter(), json!({"value": 1})).await.unwrap();

        let mut tx = Transaction::new(&store);
        tx.get(&counter()).await.unwrap();
        tx.get(&DocumentKey::new("counters", "missing")).await.unwrap();
        let request = tx.into_request();

        assert_eq!(request.preconditions.len(), 2);
        assert!(request.preconditions.contains(&Precondition {
            key: DocumentKey::new("counters", "missing"),
            expected: Version::initial(),
        }));
    }

    #[tokio::test]
    async fn concurrent_write_conflicts_at_commit() {
        let store = InMemoryDocumentStore::new();
        store.create(counter(), json!({"value": 1})).await.unwrap();

        let mut tx = Transaction::new(&store);
        tx.get(&counter()).await.unwrap();
        tx.set(counter(), json!({"value": 2}));

        store.set(counter(), json!({"value": 10})).await.unwrap();

        let result = tx.commit().await;
        assert!(matches!(
            result,
            Err(DocumentStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn empty_transaction_commits_nothing() {
        let store = InMemoryDocumentStore::new();
        let tx = Transaction::new(&store);
        assert!(tx.commit().await.unwrap().is_none());
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn runner_retries_conflicts() {
        let store = InMemoryDocumentStore::new();
        store.create(counter(), json!({"value": 1})).await.unwrap();
        store.inject_conflicts(2);

        let work = Increment {
            attempts: AtomicU32::new(0),
        };
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let value = run_transaction(&store, &policy, &work).await.unwrap();

        assert_eq!(value, 2);
        assert_eq!(work.attempts.load(Ordering::SeqCst), 3);
        let doc = store.get(&counter()).await.unwrap().unwrap();
        assert_eq!(doc.data["value"], 2);
    }

    #[tokio::test]
    async fn runner_gives_up_after_max_attempts() {
        let store = InMemoryDocumentStore::new();
        store.create(counter(), json!({"value": 1})).await.unwrap();
        store.inject_conflicts(5);

        let work = Increment {
            attempts: AtomicU32::new(0),
        };
        let result = run_transaction(&store, &RetryPolicy::new(2, Duration::ZERO), &work).await;

        assert!(matches!(
            result,
            Err(DocumentStoreError::ConcurrencyConflict { .. })
        ));
        assert_eq!(work.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn body_error_aborts_without_writing() {
        let store = InMemoryDocumentStore::new();
        let work = Increment {
            attempts: AtomicU32::new(0),
        };

        let result = run_transaction(&store, &RetryPolicy::default(), &work).await;

        assert!(matches!(result, Err(DocumentStoreError::NotFound(_))));
        assert_eq!(work.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(store.commit_count(), 0);
    }
}
