//! Target document stores.
//!
//! The migrator talks to a store only through [`DocumentStore`]: it asks
//! for generated ids and commits [`WriteBatch`]es. Implementations decide
//! how a batch becomes durable, but a commit must be all-or-nothing.

pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::export::Document;

pub use firestore::{FirestoreConfig, FirestoreStore};
pub use memory::MemoryStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Length of generated document ids.
pub const AUTO_ID_LEN: usize = 20;

/// Address of one document within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    /// Target collection.
    pub collection: String,
    /// Document id.
    pub id: String,
    /// True if the id was generated rather than taken from the export.
    pub generated: bool,
}

impl DocumentRef {
    /// Reference to an id taken from the document itself.
    pub fn explicit(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            generated: false,
        }
    }

    /// Reference to a store-generated id.
    pub fn generated(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            generated: true,
        }
    }

    /// `collection/id` path.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }
}

/// A staged write that fully replaces the target document.
#[derive(Debug, Clone, PartialEq)]
pub struct SetWrite {
    /// Target document.
    pub target: DocumentRef,
    /// Full field set, written as-is.
    pub fields: Document,
}

/// Ordered writes scoped to a single collection.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    collection: String,
    writes: Vec<SetWrite>,
}

impl WriteBatch {
    /// Opens an empty batch for `collection`.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            writes: Vec::new(),
        }
    }

    /// Stages a set write. The reference must belong to this batch's collection.
    pub fn set(&mut self, target: DocumentRef, fields: Document) {
        debug_assert_eq!(target.collection, self.collection);
        self.writes.push(SetWrite { target, fields });
    }

    /// Collection this batch writes to.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Staged writes in order.
    #[must_use]
    pub fn writes(&self) -> &[SetWrite] {
        &self.writes
    }

    /// Number of staged writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns true if nothing has been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Consumes the batch, returning its writes.
    #[must_use]
    pub fn into_writes(self) -> Vec<SetWrite> {
        self.writes
    }
}

/// Store acknowledgement of a durable commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    /// Number of writes applied.
    pub writes: usize,
    /// Store-reported commit time, if any.
    pub commit_time: Option<String>,
}

/// Trait for target document stores.
///
/// Implement this trait to migrate into a new kind of store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Get the store type name.
    fn store_type(&self) -> &'static str;

    /// Generates a fresh document id within `collection`.
    ///
    /// Generated ids must never repeat within a run.
    fn new_document_id(&self, _collection: &str) -> String {
        auto_id()
    }

    /// Commits a batch atomically, returning once it is durable.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<CommitReceipt>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<S> {
    fn store_type(&self) -> &'static str {
        (**self).store_type()
    }

    fn new_document_id(&self, collection: &str) -> String {
        (**self).new_document_id(collection)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<CommitReceipt> {
        (**self).commit(batch).await
    }
}

/// Random 20-character alphanumeric id, the shape Firestore clients generate.
#[must_use]
pub fn auto_id() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    let mut id = String::with_capacity(AUTO_ID_LEN);
    let mut bits = uuid::Uuid::new_v4().as_u128();
    for _ in 0..AUTO_ID_LEN {
        id.push(ALPHABET[(bits % ALPHABET.len() as u128) as usize] as char);
        bits /= ALPHABET.len() as u128;
    }
    id
}

/// Returns the explicit id of `doc` if `id_field` holds a usable string.
///
/// Empty strings and strings containing `/` cannot name a single document
/// and yield `None`, as do non-string values.
#[must_use]
pub fn explicit_id<'a>(doc: &'a Document, id_field: &str) -> Option<&'a str> {
    match doc.get(id_field) {
        Some(Value::String(id)) if is_usable_id(id) => Some(id.as_str()),
        _ => None,
    }
}

/// Whether `id` can address exactly one document.
#[must_use]
pub fn is_usable_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('/')
}
