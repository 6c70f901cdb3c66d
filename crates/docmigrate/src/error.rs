//! Error types for docmigrate.
//!
//! Every error is fatal for the run. Codes follow the pattern `MIGRATE-0xx`
//! so a failed migration can be matched against its log line.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading the export file.
///
/// All of them abort the run before any store write happens.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Export file missing or unreadable (MIGRATE-001).
    #[error("[MIGRATE-001] Cannot read export file '{}': {source}", path.display())]
    FileNotFound {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Export is not valid JSON (MIGRATE-002).
    #[error("[MIGRATE-002] Malformed export: {0}")]
    MalformedInput(#[source] serde_json::Error),

    /// Root has no `data` object (MIGRATE-003).
    #[error("[MIGRATE-003] No 'data' object found in export")]
    MissingDataField,
}

/// Errors reported by a target document store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials rejected (401/403).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Quota or rate limit hit (429).
    #[error("rate limited by store: {0}")]
    RateLimited(String),

    /// Store refused the commit.
    #[error("commit rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Store is unreachable or failed internally.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during a migration run.
#[derive(Error, Debug)]
pub enum Error {
    /// Export could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A `data` entry is not an array (MIGRATE-004).
    #[error("[MIGRATE-004] Collection '{collection}' is not an array (found {found})")]
    CollectionShape {
        /// Collection name as declared in the export.
        collection: String,
        /// JSON type actually found.
        found: &'static str,
    },

    /// An array element is not an object (MIGRATE-005).
    #[error("[MIGRATE-005] Document #{index} in collection '{collection}' is not an object (found {found})")]
    DocumentShape {
        /// Collection name as declared in the export.
        collection: String,
        /// Position of the element in the collection array.
        index: usize,
        /// JSON type actually found.
        found: &'static str,
    },

    /// Batch commit failed (MIGRATE-006).
    ///
    /// When a collection spans several batches, `committed` writes of it are
    /// already durable.
    #[error("[MIGRATE-006] Commit failed for collection '{collection}' ({committed} documents already committed): {source}")]
    Commit {
        /// Target collection of the failed batch.
        collection: String,
        /// Writes of this collection committed before the failure.
        committed: usize,
        /// Store-level cause.
        #[source]
        source: StoreError,
    },

    /// Configuration error (MIGRATE-007).
    #[error("[MIGRATE-007] Configuration error: {0}")]
    Config(String),

    /// IO error (MIGRATE-008).
    #[error("[MIGRATE-008] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration parse error (MIGRATE-009).
    #[error("[MIGRATE-009] Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A string id cannot name a single document (MIGRATE-010).
    #[error("[MIGRATE-010] Document #{index} in collection '{collection}' has invalid id {id:?}")]
    InvalidDocumentId {
        /// Collection name as declared in the export.
        collection: String,
        /// Position of the document in the collection array.
        index: usize,
        /// The rejected id.
        id: String,
    },
}

/// Name of a JSON value's type, used in shape errors.
#[must_use]
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::String(_) => "string",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
        serde_json::Value::Null => "null",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_codes() {
        let err = Error::from(LoadError::MissingDataField);
        assert!(err.to_string().contains("MIGRATE-003"));
        assert!(matches!(err, Error::Load(LoadError::MissingDataField)));
    }

    #[test]
    fn test_commit_error_keeps_source() {
        let err = Error::Commit {
            collection: "users".to_string(),
            committed: 500,
            source: StoreError::Authentication("token expired".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("users"));
        assert!(msg.contains("500 documents already committed"));
        assert!(msg.contains("token expired"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invalid_document_id_message() {
        let err = Error::InvalidDocumentId {
            collection: "teams".to_string(),
            index: 3,
            id: "team/1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("MIGRATE-010"));
        assert!(msg.contains("#3"));
        assert!(msg.contains("\"team/1\""));
    }

    #[test]
    fn test_json_type_name() {
        assert_eq!(json_type_name(&serde_json::json!("x")), "string");
        assert_eq!(json_type_name(&serde_json::json!(1)), "number");
        assert_eq!(json_type_name(&serde_json::json!(false)), "boolean");
        assert_eq!(json_type_name(&serde_json::json!([])), "array");
        assert_eq!(json_type_name(&serde_json::json!({})), "object");
        assert_eq!(json_type_name(&serde_json::json!(null)), "null");
    }
}
