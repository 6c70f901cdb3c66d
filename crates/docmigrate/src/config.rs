//! Configuration types for docmigrate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::migrator::MigratorOptions;
use crate::store::firestore::{FirestoreConfig, MAX_WRITES_PER_COMMIT};

/// Environment variable holding a Firestore bearer token.
pub const ACCESS_TOKEN_ENV: &str = "FIRESTORE_ACCESS_TOKEN";

/// Main migration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Export file to read.
    pub export: ExportConfig,
    /// Target document store.
    pub destination: DestinationConfig,
    /// Migration options.
    #[serde(default)]
    pub options: MigrationOptions,
}

/// Export file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Path to the JSON export.
    pub path: PathBuf,
}

/// Target store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DestinationConfig {
    /// Cloud Firestore over REST.
    #[serde(rename = "firestore")]
    Firestore(FirestoreConfig),
    /// In-process store, discarded at exit.
    #[serde(rename = "memory")]
    Memory,
}

impl DestinationConfig {
    /// Short name of the destination type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Firestore(_) => "firestore",
            Self::Memory => "memory",
        }
    }
}

/// Migration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Most writes per commit; larger collections are split.
    #[serde(default = "default_max_batch_writes")]
    pub max_batch_writes: usize,
    /// Dry run mode (stage against an in-memory store).
    #[serde(default)]
    pub dry_run: bool,
    /// Field holding the document id.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Collections to migrate (empty = all).
    #[serde(default)]
    pub include: Vec<String>,
    /// Collection renames (`export_name` -> `target_name`).
    #[serde(default)]
    pub collection_mappings: HashMap<String, String>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            max_batch_writes: default_max_batch_writes(),
            dry_run: false,
            id_field: default_id_field(),
            include: Vec::new(),
            collection_mappings: HashMap::new(),
        }
    }
}

impl MigrationOptions {
    /// Options handed to the migrator.
    #[must_use]
    pub fn migrator_options(&self) -> MigratorOptions {
        MigratorOptions {
            id_field: self.id_field.clone(),
            max_batch_writes: self.max_batch_writes,
            include: self.include.clone(),
            collection_mappings: self.collection_mappings.clone(),
        }
    }
}

fn default_max_batch_writes() -> usize {
    MAX_WRITES_PER_COMMIT
}

fn default_id_field() -> String {
    "id".to_string()
}

impl MigrationConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Fills a missing Firestore token from `token`.
    pub fn apply_access_token(&mut self, token: Option<String>) {
        if let DestinationConfig::Firestore(cfg) = &mut self.destination {
            if cfg.access_token.is_none() {
                cfg.access_token = token;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::Error;

        if self.export.path.as_os_str().is_empty() {
            return Err(Error::Config("export path cannot be empty".to_string()));
        }
        if self.options.max_batch_writes == 0 {
            return Err(Error::Config(
                "max_batch_writes must be greater than 0".to_string(),
            ));
        }
        if self.options.id_field.is_empty() {
            return Err(Error::Config("id_field cannot be empty".to_string()));
        }
        if let Some((from, _)) = self
            .options
            .collection_mappings
            .iter()
            .find(|(_, to)| to.is_empty())
        {
            return Err(Error::Config(format!(
                "collection mapping for '{from}' has an empty target"
            )));
        }
        if let DestinationConfig::Firestore(cfg) = &self.destination {
            if cfg.project_id.is_empty() {
                return Err(Error::Config("project_id cannot be empty".to_string()));
            }
            if self.options.max_batch_writes > MAX_WRITES_PER_COMMIT {
                return Err(Error::Config(format!(
                    "max_batch_writes {} exceeds Firestore's limit of {}",
                    self.options.max_batch_writes, MAX_WRITES_PER_COMMIT
                )));
            }
        }
        Ok(())
    }
}
