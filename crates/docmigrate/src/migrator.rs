//! Migration driver.
//!
//! Collections are migrated one at a time, in export order. Each
//! collection's documents are staged into a [`WriteBatch`] and committed
//! before the next collection is touched. The first failure stops the run;
//! collections committed before it stay in the store.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::export::{collection_from, Document, Export};
use crate::report::{EventSink, MigrationEvent};
use crate::store::firestore::MAX_WRITES_PER_COMMIT;
use crate::store::{explicit_id, DocumentRef, DocumentStore, WriteBatch};

/// Knobs for a migration run.
#[derive(Debug, Clone)]
pub struct MigratorOptions {
    /// Field whose string value becomes the document id.
    pub id_field: String,
    /// Most writes the store accepts in one commit.
    pub max_batch_writes: usize,
    /// Collections to migrate (empty = all).
    pub include: Vec<String>,
    /// Export collection name -> target collection name.
    pub collection_mappings: HashMap<String, String>,
}

impl Default for MigratorOptions {
    fn default() -> Self {
        Self {
            id_field: "id".to_string(),
            max_batch_writes: MAX_WRITES_PER_COMMIT,
            include: Vec::new(),
            collection_mappings: HashMap::new(),
        }
    }
}

/// Outcome for one committed collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    /// Name in the export.
    pub collection: String,
    /// Name in the target store.
    pub target: String,
    /// Documents written.
    pub documents: usize,
    /// Commits issued.
    pub batches: usize,
}

/// Outcome of a complete run, in migration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Committed collections.
    pub collections: Vec<CollectionReport>,
}

impl MigrationReport {
    /// Documents written across all collections.
    #[must_use]
    pub fn total_documents(&self) -> usize {
        self.collections.iter().map(|c| c.documents).sum()
    }

    /// Commits issued across all collections.
    #[must_use]
    pub fn total_batches(&self) -> usize {
        self.collections.iter().map(|c| c.batches).sum()
    }

    /// Report for the export collection `name`.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionReport> {
        self.collections.iter().find(|c| c.collection == name)
    }
}

/// Drives a migration against a store handle.
pub struct Migrator<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
    options: MigratorOptions,
}

impl<'s, S: DocumentStore + ?Sized> Migrator<'s, S> {
    /// Creates a migrator writing to `store`.
    pub fn new(store: &'s S, options: MigratorOptions) -> Self {
        Self { store, options }
    }

    /// Target collection name for the export collection `name`.
    #[must_use]
    pub fn target_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.options
            .collection_mappings
            .get(name)
            .map_or(name, String::as_str)
    }

    fn is_selected(&self, name: &str) -> bool {
        self.options.include.is_empty() || self.options.include.iter().any(|n| n == name)
    }

    /// Migrates every selected collection of `export`.
    ///
    /// # Errors
    ///
    /// Stops at the first shape or commit error. Collections committed
    /// before the error are not rolled back.
    pub async fn migrate(
        &self,
        export: &Export,
        sink: &mut dyn EventSink,
    ) -> Result<MigrationReport> {
        for name in &self.options.include {
            if !export.collection_names().any(|n| n == name) {
                warn!("Collection '{}' is not in the export, skipping", name);
            }
        }

        let mut report = MigrationReport::default();

        for (name, value) in export.entries() {
            if !self.is_selected(name) {
                debug!("Skipping collection '{}'", name);
                continue;
            }
            let collection = self.migrate_collection(name, value, sink).await?;
            report.collections.push(collection);
        }

        info!(
            "Migrated {} documents in {} collections ({} commits)",
            report.total_documents(),
            report.collections.len(),
            report.total_batches()
        );

        Ok(report)
    }

    /// Stages and commits one collection.
    ///
    /// # Errors
    ///
    /// Returns a shape error before any write if `value` is not an array of
    /// objects, [`Error::InvalidDocumentId`] before any write if a string id
    /// cannot name a document, or [`Error::Commit`] if the store rejects a
    /// batch.
    pub async fn migrate_collection(
        &self,
        name: &str,
        value: &Value,
        sink: &mut dyn EventSink,
    ) -> Result<CollectionReport> {
        let collection = collection_from(name, value)?;
        collection.check_ids(&self.options.id_field)?;
        let target = self.target_name(name).to_string();
        let total = collection.documents.len();

        info!("Migrating collection '{}' ({} documents)", name, total);
        sink.on_event(&MigrationEvent::CollectionStarted {
            collection: name.to_string(),
            target: target.clone(),
            documents: total,
        });

        let limit = self.options.max_batch_writes.max(1);
        let chunks: Vec<&[&Document]> = if collection.documents.is_empty() {
            vec![&collection.documents[..]]
        } else {
            collection.documents.chunks(limit).collect()
        };

        let batches = chunks.len();
        let mut committed = 0;
        for (n, chunk) in chunks.iter().enumerate() {
            let mut batch = WriteBatch::new(target.as_str());
            for doc in *chunk {
                let doc_ref = self.resolve_ref(&target, doc);
                batch.set(doc_ref, (*doc).clone());
            }

            let writes = batch.len();
            self.store
                .commit(batch)
                .await
                .map_err(|source| Error::Commit {
                    collection: target.clone(),
                    committed,
                    source,
                })?;
            committed += writes;

            debug!("Committed {} writes to '{}'", writes, target);
            sink.on_event(&MigrationEvent::BatchCommitted {
                target: target.clone(),
                batch: n + 1,
                batches,
                writes,
                committed,
            });
        }

        sink.on_event(&MigrationEvent::CollectionMigrated {
            collection: name.to_string(),
            target: target.clone(),
            documents: total,
        });

        Ok(CollectionReport {
            collection: name.to_string(),
            target,
            documents: total,
            batches,
        })
    }

    /// Picks the document's own id, or a generated one.
    ///
    /// String ids have already passed [`Collection::check_ids`].
    ///
    /// [`Collection::check_ids`]: crate::export::Collection::check_ids
    fn resolve_ref(&self, target: &str, doc: &Document) -> DocumentRef {
        let id_field = &self.options.id_field;
        if let Some(id) = explicit_id(doc, id_field) {
            return DocumentRef::explicit(target, id);
        }

        if let Some(other) = doc.get(id_field) {
            debug!("Non-string id {} in '{}', generating one", other, target);
        }

        DocumentRef::generated(target, self.store.new_document_id(target))
    }
}

/// Migrates `export` into `store` with default options.
///
/// # Errors
///
/// See [`Migrator::migrate`].
pub async fn migrate<S: DocumentStore + ?Sized>(
    export: &Export,
    store: &S,
    sink: &mut dyn EventSink,
) -> Result<MigrationReport> {
    Migrator::new(store, MigratorOptions::default())
        .migrate(export, sink)
        .await
}

#[cfg(test)]
#[path = "migrator_tests.rs"]
mod tests;
