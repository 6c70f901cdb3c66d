//! docmigrate CLI
//!
//! CLI tool for loading a JSON database export into a document store.
//! Pedantic lints relaxed for CLI ergonomics.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Args, Parser, Subcommand};
use console::Term;
use dialoguer::Confirm;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use docmigrate::config::ACCESS_TOKEN_ENV;
use docmigrate::{DestinationConfig, ExitStatus, MigrationConfig, Pipeline, Reporter};

#[derive(Parser)]
#[command(name = "docmigrate")]
#[command(author = "NexusSuite Team")]
#[command(version)]
#[command(about = "Migrate a JSON database export into a document store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dry run mode (stage writes in memory only)
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migration from config file
    Run(RunArgs),

    /// Validate configuration and export without writing
    Validate {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Generate example configuration
    Init {
        /// Google Cloud project id to put in the template
        #[arg(short, long, default_value = "your-project-id")]
        project_id: String,

        /// Output file path
        #[arg(short, long, default_value = "migration.yaml")]
        output: PathBuf,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Export file override
    #[arg(short, long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Writes-per-commit override
    #[arg(long)]
    max_batch_writes: Option<usize>,

    /// Firestore OAuth2 bearer token
    #[arg(long, env = ACCESS_TOKEN_ENV, hide_env_values = true)]
    access_token: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {e}");
    }

    let result = match cli.command {
        Some(Commands::Run(args)) => run_migration(args, cli.dry_run).await,
        Some(Commands::Validate { config }) => validate_config(&config),
        Some(Commands::Init { project_id, output }) => generate_config(&project_id, &output),
        None => {
            // Default: run migration if config provided
            if let Some(config) = cli.config {
                let args = RunArgs {
                    config,
                    access_token: std::env::var(ACCESS_TOKEN_ENV).ok(),
                    ..Default::default()
                };
                run_migration(args, cli.dry_run).await
            } else {
                eprintln!("Usage: docmigrate --config <FILE> or docmigrate <COMMAND>");
                eprintln!("Try 'docmigrate --help' for more information.");
                Ok(ExitStatus::Failure)
            }
        }
    };

    match result {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_migration(args: RunArgs, dry_run: bool) -> anyhow::Result<ExitStatus> {
    let mut reporter = Reporter::stdio();

    let pipeline = match build_pipeline(&args, dry_run) {
        Ok(pipeline) => pipeline,
        Err(e) => return Ok(reporter.finish(&Err(e))),
    };

    if !args.yes && !confirm_destination(pipeline.config(), &Term::stderr())? {
        eprintln!("Migration cancelled.");
        return Ok(ExitStatus::Failure);
    }

    info!("Starting migration...");
    Ok(pipeline.execute(&mut reporter).await)
}

fn build_pipeline(args: &RunArgs, dry_run: bool) -> docmigrate::Result<Pipeline> {
    info!("Loading configuration from {:?}", args.config);

    let mut config = MigrationConfig::from_file(&args.config)?;

    if dry_run {
        config.options.dry_run = true;
    }
    if let Some(path) = &args.export {
        config.export.path = path.clone();
    }
    if let Some(n) = args.max_batch_writes {
        config.options.max_batch_writes = n;
    }
    config.apply_access_token(args.access_token.clone());

    Pipeline::new(config)
}

/// Asks on `term` before writing to a live store; non-terminals skip the prompt.
fn confirm_destination(config: &MigrationConfig, term: &Term) -> anyhow::Result<bool> {
    let project = match &config.destination {
        DestinationConfig::Firestore(cfg) if !config.options.dry_run => &cfg.project_id,
        _ => return Ok(true),
    };
    if !term.is_term() {
        return Ok(true);
    }

    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Write {} into Firestore project '{}'? Existing documents with the same ids are overwritten",
            config.export.path.display(),
            project
        ))
        .default(false)
        .interact_on(term)?;

    Ok(confirmed)
}

fn validate_config(config_path: &Path) -> anyhow::Result<ExitStatus> {
    info!("Validating configuration from {:?}", config_path);

    let config = MigrationConfig::from_file(config_path)?;
    let pipeline = Pipeline::new(config)?;
    let summary = pipeline.preflight()?;

    let config = pipeline.config();
    println!("✅ Configuration is valid!");
    println!("   Export:      {}", config.export.path.display());
    println!("   Destination: {}", config.destination.kind());
    println!("   Batch limit: {} writes", config.options.max_batch_writes);
    println!();
    println!("   {:<24} {:>10} {:>10}", "Collection", "Documents", "With id");
    for entry in &summary {
        println!(
            "   {:<24} {:>10} {:>10}",
            entry.name, entry.documents, entry.with_id
        );
    }
    println!(
        "   {} collections, {} documents",
        summary.len(),
        summary.iter().map(|s| s.documents).sum::<usize>()
    );

    Ok(ExitStatus::Success)
}

fn generate_config(project_id: &str, output: &Path) -> anyhow::Result<ExitStatus> {
    std::fs::write(output, FIRESTORE_TEMPLATE.replace("your-project-id", project_id))?;
    println!("✅ Generated configuration: {:?}", output);
    println!(
        "   Edit the file and run: docmigrate run --config {:?}",
        output
    );

    Ok(ExitStatus::Success)
}

const FIRESTORE_TEMPLATE: &str = r#"# docmigrate configuration - Firestore destination
export:
  path: ./database-export.json

destination:
  type: firestore
  project_id: your-project-id
  # database: "(default)"
  # access_token: ya29...  # or set FIRESTORE_ACCESS_TOKEN

options:
  max_batch_writes: 500  # Firestore accepts at most 500 writes per commit
  dry_run: false
  id_field: id
  include: []  # Empty = all collections
  # collection_mappings:
  #   auditLogs: audit_logs
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use docmigrate::config::ExportConfig;
    use docmigrate::store::firestore::FirestoreConfig;

    fn config(destination: DestinationConfig, dry_run: bool) -> MigrationConfig {
        let mut config = MigrationConfig {
            export: ExportConfig {
                path: PathBuf::from("./export.json"),
            },
            destination,
            options: Default::default(),
        };
        config.options.dry_run = dry_run;
        config
    }

    fn firestore() -> DestinationConfig {
        DestinationConfig::Firestore(FirestoreConfig {
            project_id: "demo".to_string(),
            database: "(default)".to_string(),
            base_url: "http://localhost:8080/v1".to_string(),
            access_token: None,
        })
    }

    #[test]
    fn test_no_prompt_without_live_destination() {
        let term = Term::stderr();
        assert!(confirm_destination(&config(DestinationConfig::Memory, false), &term).unwrap());
        assert!(confirm_destination(&config(firestore(), true), &term).unwrap());
    }

    #[test]
    fn test_no_prompt_when_prompt_stream_is_redirected() {
        let term = Term::stderr();
        if term.is_term() {
            return;
        }
        assert!(confirm_destination(&config(firestore(), false), &term).unwrap());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "docmigrate",
            "run",
            "--config",
            "migration.yaml",
            "--max-batch-writes",
            "100",
            "--yes",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.max_batch_writes, Some(100));
                assert!(args.yes);
            }
            _ => panic!("expected run"),
        }
    }
}
