//! Migration pipeline orchestration.
//!
//! Loader, migrator and reporter run strictly one after another against a
//! single store handle created once per pipeline.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use tracing::info;

use crate::config::{DestinationConfig, MigrationConfig};
use crate::error::Result;
use crate::export::{CollectionSummary, Export};
use crate::migrator::{MigrationReport, Migrator};
use crate::report::{EventSink, ExitStatus, Reporter};
use crate::store::{DocumentStore, FirestoreStore, MemoryStore};

/// Migration pipeline.
pub struct Pipeline {
    config: MigrationConfig,
    store: Box<dyn DocumentStore>,
}

impl Pipeline {
    /// Create a new migration pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: MigrationConfig) -> Result<Self> {
        config.validate()?;
        let store = create_store(&config.destination, config.options.dry_run);
        Ok(Self { config, store })
    }

    /// Pipeline over an already-built store handle.
    pub fn with_store(config: MigrationConfig, store: Box<dyn DocumentStore>) -> Self {
        Self { config, store }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// The target store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Reads the configured export file.
    ///
    /// # Errors
    ///
    /// Returns a load error if the export cannot be read or has no `data`.
    pub fn load_export(&self) -> Result<Export> {
        info!("Loading export from {:?}", self.config.export.path);
        let export = Export::load(&self.config.export.path)?;
        info!("Export holds {} collections", export.len());
        Ok(export)
    }

    /// Checks every collection's shape without touching the store.
    ///
    /// # Errors
    ///
    /// Returns the first load or shape error.
    pub fn preflight(&self) -> Result<Vec<CollectionSummary>> {
        let export = self.load_export()?;
        export.summary(&self.config.options.id_field)
    }

    /// Migrates an already-loaded export.
    ///
    /// # Errors
    ///
    /// Returns the first shape or commit error.
    pub async fn migrate(
        &self,
        export: &Export,
        sink: &mut dyn EventSink,
    ) -> Result<MigrationReport> {
        if self.config.options.dry_run {
            info!("Dry run mode - not writing to destination");
        }
        Migrator::new(self.store(), self.config.options.migrator_options())
            .migrate(export, sink)
            .await
    }

    /// Loads, migrates and reports, returning the process outcome.
    pub async fn execute<W: Write, E: Write>(
        &self,
        reporter: &mut Reporter<W, E>,
    ) -> ExitStatus {
        let result = match self.load_export() {
            Ok(export) => {
                reporter.set_progress(create_progress_bar(self.documents_to_migrate(&export)));
                self.migrate(&export, reporter).await
            }
            Err(e) => Err(e),
        };
        reporter.finish(&result)
    }

    fn documents_to_migrate(&self, export: &Export) -> u64 {
        let include = &self.config.options.include;
        export
            .entries()
            .filter(|(name, _)| include.is_empty() || include.iter().any(|n| n == name))
            .filter_map(|(_, value)| value.as_array().map(Vec::len))
            .sum::<usize>() as u64
    }
}

/// Builds the store named by `destination`; dry runs always stay in memory.
#[must_use]
pub fn create_store(destination: &DestinationConfig, dry_run: bool) -> Box<dyn DocumentStore> {
    match destination {
        _ if dry_run => Box::new(MemoryStore::new()),
        DestinationConfig::Firestore(cfg) => Box::new(FirestoreStore::new(cfg.clone())),
        DestinationConfig::Memory => Box::new(MemoryStore::new()),
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };

    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    pb
}
