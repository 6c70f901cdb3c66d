// Migration tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # docmigrate
//!
//! `docmigrate` is a CLI tool and library for loading a JSON database export
//! into a document store. Each collection of the export becomes a collection
//! in the store, written as one atomic batch (split only where the store caps
//! writes per commit).
//!
//! ## Export Format
//!
//! ```json
//! {
//!   "data": {
//!     "users": [{ "id": "u1", "name": "Ada" }],
//!     "auditLogs": [{ "action": "login" }]
//!   }
//! }
//! ```
//!
//! A document with a string `id` is written to `collection/id`; the `id`
//! field stays in the document. Documents without one get a generated id.
//!
//! ## Quick Start
//!
//! ```bash
//! docmigrate init --output migration.yaml
//! docmigrate validate --config migration.yaml
//! docmigrate run --config migration.yaml --dry-run
//! docmigrate run --config migration.yaml
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! export:
//!   path: ./database-export.json
//!
//! destination:
//!   type: firestore
//!   project_id: my-project
//!
//! options:
//!   max_batch_writes: 500
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod export;
pub mod migrator;
pub mod pipeline;
pub mod report;
pub mod store;

pub use config::{DestinationConfig, MigrationConfig, MigrationOptions};
pub use error::{Error, LoadError, Result, StoreError};
pub use export::{Collection, CollectionSummary, Document, Export};
pub use migrator::{migrate, CollectionReport, MigrationReport, Migrator, MigratorOptions};
pub use pipeline::Pipeline;
pub use report::{EventSink, ExitStatus, MigrationEvent, Reporter};
pub use store::{DocumentRef, DocumentStore, FirestoreStore, MemoryStore, WriteBatch};
