//! In-process document store.
//!
//! Used for dry runs and as a stand-in for a live store in tests. Every
//! call is accounted for, and commits can be made to fail per collection.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::StoreError;
use crate::export::Document;
use crate::store::{auto_id, CommitReceipt, DocumentStore, StoreResult, WriteBatch};

/// A commit that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Collection the batch wrote to.
    pub collection: String,
    /// `collection/id` paths in write order.
    pub paths: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    documents: BTreeMap<String, BTreeMap<String, Document>>,
    commits: Vec<CommitRecord>,
    commit_attempts: usize,
    generated_ids: usize,
    /// Collection -> commits still allowed to succeed before failing.
    failing: HashMap<String, usize>,
}

/// In-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every commit to `collection` fail with [`StoreError::Unavailable`].
    pub fn fail_commits_for(&self, collection: impl Into<String>) {
        self.fail_commits_after(collection, 0);
    }

    /// Lets the next `succeed` commits to `collection` through, then fails
    /// every later one with [`StoreError::Unavailable`].
    pub fn fail_commits_after(&self, collection: impl Into<String>, succeed: usize) {
        self.state().failing.insert(collection.into(), succeed);
    }

    /// Returns the stored document at `collection/id`.
    #[must_use]
    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.state()
            .documents
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// All documents of `collection`, keyed by id.
    #[must_use]
    pub fn documents(&self, collection: &str) -> BTreeMap<String, Document> {
        self.state()
            .documents
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of documents stored in `collection`.
    #[must_use]
    pub fn count(&self, collection: &str) -> usize {
        self.state().documents.get(collection).map_or(0, BTreeMap::len)
    }

    /// Applied commits, oldest first.
    #[must_use]
    pub fn commits(&self) -> Vec<CommitRecord> {
        self.state().commits.clone()
    }

    /// Commits attempted, including failed ones.
    #[must_use]
    pub fn commit_attempts(&self) -> usize {
        self.state().commit_attempts
    }

    /// Set writes applied across all successful commits.
    #[must_use]
    pub fn applied_writes(&self) -> usize {
        self.state().commits.iter().map(|c| c.paths.len()).sum()
    }

    /// Ids handed out by [`DocumentStore::new_document_id`].
    #[must_use]
    pub fn generated_ids(&self) -> usize {
        self.state().generated_ids
    }

    /// Total calls received through [`DocumentStore`].
    #[must_use]
    pub fn calls(&self) -> usize {
        let state = self.state();
        state.commit_attempts + state.generated_ids
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn store_type(&self) -> &'static str {
        "memory"
    }

    fn new_document_id(&self, _collection: &str) -> String {
        self.state().generated_ids += 1;
        auto_id()
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<CommitReceipt> {
        let mut state = self.state();
        state.commit_attempts += 1;

        if let Some(left) = state.failing.get_mut(batch.collection()) {
            if *left == 0 {
                return Err(StoreError::Unavailable(format!(
                    "simulated failure for collection '{}'",
                    batch.collection()
                )));
            }
            *left -= 1;
        }

        let collection = batch.collection().to_string();
        let writes = batch.into_writes();
        let count = writes.len();
        let mut paths = Vec::with_capacity(count);

        let docs = state.documents.entry(collection.clone()).or_default();
        for write in writes {
            paths.push(write.target.path());
            docs.insert(write.target.id, write.fields);
        }

        debug!("memory store committed {} writes to '{}'", count, collection);
        state.commits.push(CommitRecord { collection, paths });

        Ok(CommitReceipt {
            writes: count,
            commit_time: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentRef;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_commit_applies_writes() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new("users");
        batch.set(DocumentRef::explicit("users", "u1"), doc(serde_json::json!({"id": "u1"})));
        batch.set(DocumentRef::explicit("users", "u2"), doc(serde_json::json!({"id": "u2"})));

        let receipt = store.commit(batch).await.unwrap();

        assert_eq!(receipt.writes, 2);
        assert_eq!(store.count("users"), 2);
        assert_eq!(store.commits()[0].paths, vec!["users/u1", "users/u2"]);
        assert_eq!(store.applied_writes(), 2);
    }

    #[tokio::test]
    async fn test_set_replaces_document() {
        let store = MemoryStore::new();
        let target = DocumentRef::explicit("users", "u1");

        let mut first = WriteBatch::new("users");
        first.set(target.clone(), doc(serde_json::json!({"name": "a", "age": 3})));
        store.commit(first).await.unwrap();

        let mut second = WriteBatch::new("users");
        second.set(target, doc(serde_json::json!({"name": "b"})));
        store.commit(second).await.unwrap();

        let stored = store.get("users", "u1").unwrap();
        assert_eq!(stored, doc(serde_json::json!({"name": "b"})));
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let store = MemoryStore::new();
        store.fail_commits_for("users");

        let mut batch = WriteBatch::new("users");
        batch.set(DocumentRef::explicit("users", "u1"), Document::new());

        assert!(store.commit(batch).await.is_err());
        assert_eq!(store.count("users"), 0);
        assert_eq!(store.commit_attempts(), 1);
        assert!(store.commits().is_empty());
    }

    #[tokio::test]
    async fn test_fail_commits_after() {
        let store = MemoryStore::new();
        store.fail_commits_after("users", 2);

        let mut results = Vec::new();
        for id in ["u1", "u2", "u3", "u4"] {
            let mut batch = WriteBatch::new("users");
            batch.set(DocumentRef::explicit("users", id), Document::new());
            results.push(store.commit(batch).await.is_ok());
        }

        assert_eq!(results, vec![true, true, false, false]);
        assert_eq!(store.count("users"), 2);
        assert_eq!(store.commit_attempts(), 4);

        let mut other = WriteBatch::new("logs");
        other.set(DocumentRef::explicit("logs", "l1"), Document::new());
        assert!(store.commit(other).await.is_ok());
    }

    #[test]
    fn test_generated_ids_counted() {
        let store = MemoryStore::new();
        let a = store.new_document_id("logs");
        let b = store.new_document_id("logs");
        assert_ne!(a, b);
        assert_eq!(store.generated_ids(), 2);
        assert_eq!(store.calls(), 2);
    }
}
