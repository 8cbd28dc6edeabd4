// ABOUTME: Entry point for the hireledger binary.
// ABOUTME: Loads config, initializes tracing, opens the SQLite store, and dispatches subcommands.

mod cli;
mod config;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use hireledger_core::{BatchResult, EntityType, check_registry};
use hireledger_store::{ContainerOptions, HeaderMode, Operations, SqliteStore};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, IngestOptions};
use crate::config::HireledgerConfig;

const DEFAULT_FILTER: &str = "hireledger=info,hireledger_core=info,hireledger_store=info";

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    check_registry().context("schema registry is inconsistent")?;

    let args = Cli::parse();
    let config = HireledgerConfig::from_env()?;

    let database = args.database.unwrap_or(config.database.clone());
    let backup_dir = args.backup_dir.unwrap_or(config.backup_dir.clone());
    let store = SqliteStore::open(&database)
        .with_context(|| format!("opening database {}", database.display()))?;
    tracing::debug!(database = %database.display(), backup_dir = %backup_dir.display(), "store opened");

    let ops = Operations::new(store, backup_dir).with_container_options(ContainerOptions {
        row_group_size: config.row_group_size.get(),
        ..ContainerOptions::default()
    });

    match args.command {
        Command::Ingest {
            entity,
            csv,
            options,
        } => {
            let mut ops = configure(ops, &options, &config);
            let result = ops.ingest_csv(entity, &csv)?;
            print_result(entity, &result);
            if let Some(report) = &options.report {
                write_report(report, &serde_json::to_value(&result)?)?;
            }
        }
        Command::Load { dir, options } => {
            let mut ops = configure(ops, &options, &config);
            let results = ops.load_directory(&dir)?;
            let mut report = serde_json::Map::new();
            for (entity, result) in &results {
                print_result(*entity, result);
                report.insert(entity.to_string(), serde_json::to_value(result)?);
            }
            if let Some(path) = &options.report {
                write_report(path, &serde_json::Value::Object(report))?;
            }
        }
        Command::Backup { target } => {
            for path in ops.run_backup(target)? {
                println!("wrote {}", path.display());
            }
        }
        Command::Restore { target } => {
            let mut ops = ops;
            for (entity, count) in ops.run_restore(target)? {
                println!("{entity}: restored {count} records");
            }
        }
        Command::Inspect { file } => {
            let inspection = ops.inspect(&file)?;
            println!("{}", serde_json::to_string_pretty(&inspection)?);
        }
    }

    Ok(())
}

fn configure(
    ops: Operations<SqliteStore>,
    options: &IngestOptions,
    config: &HireledgerConfig,
) -> Operations<SqliteStore> {
    ops.with_batch_size(options.batch_size.unwrap_or(config.batch_size))
        .with_header_mode(HeaderMode::from_flag(options.header || config.csv_header))
}

fn print_result(entity: EntityType, result: &BatchResult) {
    println!(
        "{entity}: attempted {}, succeeded {}, failed {} ({} batches)",
        result.attempted, result.succeeded, result.failed, result.batches
    );
    for (candidate, kind, reason) in result.failures() {
        println!("  {} [{kind:?}] {reason}", candidate.origin);
    }
}

fn write_report(path: &Path, report: &serde_json::Value) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    Ok(())
}
