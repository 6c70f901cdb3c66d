//! Cloud Firestore store over the REST API.
//!
//! A [`WriteBatch`] becomes one `documents:commit` request. Firestore
//! applies the writes of a commit atomically. Writes are sent without an
//! update mask, so each one replaces the whole document.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::export::Document;
use crate::store::{CommitReceipt, DocumentRef, DocumentStore, StoreResult, WriteBatch};

/// Firestore rejects commits carrying more writes than this.
pub const MAX_WRITES_PER_COMMIT: usize = 500;

/// Default HTTP timeout for commit requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a Firestore destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirestoreConfig {
    /// Google Cloud project id.
    pub project_id: String,
    /// Database id.
    #[serde(default = "default_database")]
    pub database: String,
    /// REST endpoint root.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// OAuth2 bearer token. Obtaining it is left to the caller.
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_base_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default, rename = "writeResults")]
    write_results: Vec<Value>,
    #[serde(default, rename = "commitTime")]
    commit_time: Option<String>,
}

/// Firestore [`DocumentStore`].
pub struct FirestoreStore {
    config: FirestoreConfig,
    client: Client,
}

impl FirestoreStore {
    /// Creates a Firestore store with a configured HTTP client.
    #[must_use]
    pub fn new(config: FirestoreConfig) -> Self {
        Self {
            config,
            client: create_http_client(),
        }
    }

    /// `projects/{project}/databases/{database}/documents`.
    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.config.project_id, self.config.database
        )
    }

    /// Builds the commit URL.
    fn build_commit_url(&self) -> String {
        format!(
            "{}/{}:commit",
            self.config.base_url.trim_end_matches('/'),
            self.documents_root()
        )
    }

    /// Full resource name of a document.
    fn document_name(&self, target: &DocumentRef) -> String {
        format!("{}/{}/{}", self.documents_root(), target.collection, target.id)
    }

    fn commit_body(&self, batch: &WriteBatch) -> Value {
        let writes: Vec<Value> = batch
            .writes()
            .iter()
            .map(|write| {
                json!({
                    "update": {
                        "name": self.document_name(&write.target),
                        "fields": encode_fields(&write.fields),
                    }
                })
            })
            .collect();

        json!({ "writes": writes })
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn store_type(&self) -> &'static str {
        "firestore"
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<CommitReceipt> {
        let url = self.build_commit_url();
        let body = self.commit_body(&batch);

        debug!(
            "Committing {} writes to '{}' via {}",
            batch.len(),
            batch.collection(),
            url
        );

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(handle_http_error(status.as_u16(), &body));
        }

        let parsed: CommitResponse = response.json().await?;
        info!(
            "Firestore acknowledged {} writes to '{}'",
            parsed.write_results.len(),
            batch.collection()
        );

        Ok(CommitReceipt {
            writes: batch.len(),
            commit_time: parsed.commit_time,
        })
    }
}

/// Creates a configured HTTP client with timeout.
#[must_use]
pub fn create_http_client() -> Client {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Maps an HTTP error response to a store error.
pub fn handle_http_error(status_code: u16, body: &str) -> StoreError {
    match status_code {
        401 | 403 => StoreError::Authentication(body.to_string()),
        429 => StoreError::RateLimited(body.to_string()),
        500..=599 => StoreError::Unavailable(format!("Firestore error {status_code}: {body}")),
        _ => StoreError::Rejected {
            status: status_code,
            body: body.to_string(),
        },
    }
}

/// Encodes a document's fields as Firestore `Value`s.
#[must_use]
pub fn encode_fields(fields: &Document) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect::<Map<_, _>>(),
    )
}

/// Encodes one JSON value in Firestore's typed representation.
#[must_use]
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // int64 travels as a decimal string
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or(f64::NAN) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({
            "mapValue": { "fields": encode_fields(map) }
        }),
    }
}

#[cfg(test)]
#[path = "firestore_tests.rs"]
mod tests;
