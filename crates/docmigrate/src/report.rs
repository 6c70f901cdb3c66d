//! Progress and outcome reporting.
//!
//! The migrator emits [`MigrationEvent`]s to an [`EventSink`]. The
//! [`Reporter`] turns them into human-readable lines and maps the final
//! result to an [`ExitStatus`].

use console::style;
use indicatif::ProgressBar;
use std::io::{self, Stderr, Stdout, Write};
use tracing::{debug, error};

use crate::error::Result;
use crate::migrator::MigrationReport;

/// Something the migrator did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationEvent {
    /// A collection is about to be staged and committed.
    CollectionStarted {
        /// Name in the export.
        collection: String,
        /// Name in the target store.
        target: String,
        /// Documents to write.
        documents: usize,
    },
    /// One batch of a collection is durable.
    BatchCommitted {
        /// Name in the target store.
        target: String,
        /// 1-based batch number within the collection.
        batch: usize,
        /// Batches the collection is split into.
        batches: usize,
        /// Writes in the batch.
        writes: usize,
        /// Writes of the collection committed so far, this batch included.
        committed: usize,
    },
    /// Every batch of a collection is durable.
    CollectionMigrated {
        /// Name in the export.
        collection: String,
        /// Name in the target store.
        target: String,
        /// Documents written.
        documents: usize,
    },
}

/// Receiver of migration events.
pub trait EventSink {
    /// Handles one event.
    fn on_event(&mut self, event: &MigrationEvent);
}

impl EventSink for () {
    fn on_event(&mut self, _event: &MigrationEvent) {}
}

impl EventSink for Vec<MigrationEvent> {
    fn on_event(&mut self, event: &MigrationEvent) {
        self.push(event.clone());
    }
}

/// Process outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Every collection committed.
    Success,
    /// Load, configuration or migration failure.
    Failure,
}

impl ExitStatus {
    /// Numeric process exit code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        Self::from(status.code())
    }
}

/// Writes progress lines to `out` and failures to `err`.
pub struct Reporter<W: Write, E: Write> {
    out: W,
    err: E,
    progress: Option<ProgressBar>,
    write_failed: bool,
}

/// Writes one line, logging only the first failure of a reporter.
fn write_line<T: Write + ?Sized>(w: &mut T, text: &str, failed: &mut bool) {
    if let Err(e) = writeln!(w, "{text}") {
        if !*failed {
            debug!("Report output unavailable: {}", e);
            *failed = true;
        }
    }
}

impl Reporter<Stdout, Stderr> {
    /// Reporter bound to the process's standard streams.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<W: Write, E: Write> Reporter<W, E> {
    /// Creates a reporter over arbitrary writers.
    pub fn new(out: W, err: E) -> Self {
        Self {
            out,
            err,
            progress: None,
            write_failed: false,
        }
    }

    /// Advances `progress` by each committed batch.
    pub fn set_progress(&mut self, progress: ProgressBar) {
        self.progress = Some(progress);
    }

    fn line(&mut self, text: &str) {
        let out = &mut self.out;
        let failed = &mut self.write_failed;
        match &self.progress {
            Some(pb) => pb.suspend(|| write_line(out, text, failed)),
            None => write_line(out, text, failed),
        }
    }

    fn error_line(&mut self, text: &str) {
        write_line(&mut self.err, text, &mut self.write_failed);
    }

    /// Reports the run's final result and returns the process outcome.
    ///
    /// The success line is only written when every collection committed.
    pub fn finish(&mut self, result: &Result<MigrationReport>) -> ExitStatus {
        if let Some(pb) = self.progress.take() {
            pb.finish_and_clear();
        }

        match result {
            Ok(report) => {
                self.line("");
                self.line(&format!(
                    "{} Data migration completed successfully! ({} collections, {} documents)",
                    style("✔").green().bold(),
                    report.collections.len(),
                    report.total_documents()
                ));
                ExitStatus::Success
            }
            Err(e) => {
                error!("Migration failed: {:?}", e);
                self.error_line(&format!(
                    "{} Error during migration: {}",
                    style("✘").red().bold(),
                    e
                ));
                let mut source = std::error::Error::source(e);
                while let Some(cause) = source {
                    self.error_line(&format!("    caused by: {cause}"));
                    source = cause.source();
                }
                ExitStatus::Failure
            }
        }
    }

    /// Consumes the reporter, returning its writers.
    pub fn into_inner(self) -> (W, E) {
        (self.out, self.err)
    }
}

impl<W: Write, E: Write> EventSink for Reporter<W, E> {
    fn on_event(&mut self, event: &MigrationEvent) {
        match event {
            MigrationEvent::CollectionStarted {
                collection, target, ..
            } => {
                if collection == target {
                    self.line(&format!("Migrating collection: {collection}"));
                } else {
                    self.line(&format!("Migrating collection: {collection} -> {target}"));
                }
            }
            MigrationEvent::BatchCommitted {
                target,
                batch,
                batches,
                writes,
                committed,
            } => {
                if let Some(pb) = &self.progress {
                    pb.inc(*writes as u64);
                }
                if *batches > 1 {
                    self.line(&format!(
                        "  Committed batch #{batch}/{batches} for '{target}' ({committed} documents so far)"
                    ));
                }
            }
            MigrationEvent::CollectionMigrated {
                target, documents, ..
            } => {
                self.line(&format!(
                    "{} {}: {} documents",
                    style("✔").green(),
                    target,
                    documents
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, LoadError, StoreError};
    use crate::migrator::CollectionReport;

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_progress_lines() {
        let mut reporter = Reporter::new(Vec::new(), Vec::new());
        reporter.on_event(&MigrationEvent::CollectionStarted {
            collection: "users".to_string(),
            target: "users".to_string(),
            documents: 2,
        });
        reporter.on_event(&MigrationEvent::CollectionMigrated {
            collection: "users".to_string(),
            target: "users".to_string(),
            documents: 2,
        });

        let (out, err) = reporter.into_inner();
        let out = text(out);
        assert!(out.contains("Migrating collection: users\n"));
        assert!(out.contains("users: 2 documents"));
        assert!(err.is_empty());
    }

    #[test]
    fn test_renamed_collection_line() {
        let mut reporter = Reporter::new(Vec::new(), Vec::new());
        reporter.on_event(&MigrationEvent::CollectionStarted {
            collection: "auditLogs".to_string(),
            target: "audit_logs".to_string(),
            documents: 0,
        });

        let (out, _) = reporter.into_inner();
        assert!(text(out).contains("Migrating collection: auditLogs -> audit_logs"));
    }

    #[test]
    fn test_finish_success() {
        let mut reporter = Reporter::new(Vec::new(), Vec::new());
        let report = MigrationReport {
            collections: vec![CollectionReport {
                collection: "users".to_string(),
                target: "users".to_string(),
                documents: 3,
                batches: 1,
            }],
        };

        let status = reporter.finish(&Ok(report));
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(status.code(), 0);

        let (out, err) = reporter.into_inner();
        assert!(text(out).contains("Data migration completed successfully!"));
        assert!(err.is_empty());
    }

    #[test]
    fn test_finish_failure_prints_cause_chain() {
        let mut reporter = Reporter::new(Vec::new(), Vec::new());
        let result = Err(Error::Commit {
            collection: "B".to_string(),
            committed: 0,
            source: StoreError::Unavailable("backend down".to_string()),
        });

        let status = reporter.finish(&result);
        assert_eq!(status, ExitStatus::Failure);
        assert_eq!(status.code(), 1);

        let (out, err) = reporter.into_inner();
        let err = text(err);
        assert!(!text(out).contains("completed successfully"));
        assert!(err.contains("Error during migration"));
        assert!(err.contains("caused by: store unavailable: backend down"));
    }

    #[test]
    fn test_finish_load_failure() {
        let mut reporter = Reporter::new(Vec::new(), Vec::new());
        let status = reporter.finish(&Err(LoadError::MissingDataField.into()));
        assert_eq!(status, ExitStatus::Failure);

        let (_, err) = reporter.into_inner();
        assert!(text(err).contains("MIGRATE-003"));
    }

    #[test]
    fn test_vec_sink_records_events() {
        let mut sink: Vec<MigrationEvent> = Vec::new();
        sink.on_event(&MigrationEvent::BatchCommitted {
            target: "users".to_string(),
            batch: 1,
            batches: 1,
            writes: 5,
            committed: 5,
        });
        assert_eq!(sink.len(), 1);
    }

    fn batch(batch: usize, batches: usize, committed: usize) -> MigrationEvent {
        MigrationEvent::BatchCommitted {
            target: "big".to_string(),
            batch,
            batches,
            writes: 500,
            committed,
        }
    }

    #[test]
    fn test_batch_lines_only_for_split_collections() {
        let mut reporter = Reporter::new(Vec::new(), Vec::new());
        reporter.on_event(&batch(1, 1, 500));
        reporter.on_event(&batch(1, 3, 500));
        reporter.on_event(&batch(2, 3, 1000));

        let (out, _) = reporter.into_inner();
        let out = text(out);
        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("Committed batch #1/3 for 'big' (500 documents so far)"));
        assert!(out.contains("Committed batch #2/3 for 'big' (1000 documents so far)"));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failures_do_not_change_outcome() {
        let mut reporter = Reporter::new(BrokenPipe, BrokenPipe);
        reporter.on_event(&batch(1, 2, 500));
        assert!(reporter.write_failed);

        let status = reporter.finish(&Err(LoadError::MissingDataField.into()));
        assert_eq!(status, ExitStatus::Failure);
    }
}
