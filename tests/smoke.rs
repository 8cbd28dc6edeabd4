// ABOUTME: End-to-end smoke tests for the full hireledger lifecycle.
// ABOUTME: CSV files are loaded into SQLite, backed up to Parquet, and restored into a fresh database.

use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::process::Command;

use chrono::{TimeZone, Utc};
use hireledger_core::{Department, EntityType, HiredEmployee, Record, RecordStore};
use hireledger_store::{HeaderMode, Operations, SqliteStore, Target};

fn write_inputs(dir: &Path) {
    fs::write(dir.join("departments.csv"), "1,Sales\n2,Engineering\n").unwrap();
    fs::write(dir.join("jobs.csv"), "1,Recruiter\n2,Engineer\n").unwrap();
    fs::write(
        dir.join("hired_employees.csv"),
        "1,Ana,2021-11-07T02:48:42Z,1,2\n\
         2,Bruno,2021-07-27 16:02:08,2,\n\
         3,Carla,2023-01-01,2,1\n",
    )
    .unwrap();
}

#[test]
fn smoke_test_full_lifecycle() {
    let dir = tempfile::TempDir::new().unwrap();
    write_inputs(dir.path());
    let backups = dir.path().join("backups");

    // 1. Load all three CSV files into a file-backed database
    let store = SqliteStore::open(&dir.path().join("source.db")).unwrap();
    let mut ops = Operations::new(store, &backups).with_batch_size(NonZeroUsize::new(2).unwrap());
    let results = ops.load_directory(dir.path()).unwrap();
    for (entity, result) in &results {
        assert_eq!(result.failed, 0, "{entity} had failures: {:?}", result.outcomes);
    }
    assert_eq!(results[2].1.batches, 2);

    // 2. Back up every table
    let paths = ops.run_backup(Target::All).unwrap();
    assert_eq!(paths.len(), 3);
    assert!(paths.iter().all(|p| p.exists()));

    // 3. Restore into a fresh database
    let fresh = SqliteStore::open(&dir.path().join("restored.db")).unwrap();
    let mut restored = Operations::new(fresh, &backups);
    let counts = restored.run_restore(Target::All).unwrap();
    assert_eq!(
        counts,
        vec![(EntityType::Department, 2), (EntityType::Job, 2), (EntityType::HiredEmployee, 3)]
    );

    // 4. Every record matches field for field
    for entity in EntityType::ALL {
        assert_eq!(
            restored.store().fetch_all(entity).unwrap(),
            ops.store().fetch_all(entity).unwrap(),
            "{entity} differs after restore"
        );
    }

    let employees = restored.store().fetch_all(EntityType::HiredEmployee).unwrap();
    let expected: Record = HiredEmployee::new(
        2,
        "Bruno",
        Utc.with_ymd_and_hms(2021, 7, 27, 16, 2, 8).unwrap(),
        2,
        None,
    )
    .unwrap()
    .into();
    assert_eq!(employees[1], expected);
}

#[test]
fn departments_backup_restores_exactly() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut ops = Operations::new(SqliteStore::open_in_memory().unwrap(), dir.path());
    fs::write(dir.path().join("departments.csv"), "1,Sales\n2,Engineering\n").unwrap();
    ops.ingest_csv(EntityType::Department, &dir.path().join("departments.csv")).unwrap();
    ops.run_backup(Target::One(EntityType::Department)).unwrap();

    let mut fresh = Operations::new(SqliteStore::open_in_memory().unwrap(), dir.path());
    assert_eq!(
        fresh.run_restore(Target::One(EntityType::Department)).unwrap(),
        vec![(EntityType::Department, 2)]
    );

    let rows = fresh.store().fetch_all(EntityType::Department).unwrap();
    assert_eq!(
        rows,
        vec![
            Record::from(Department::new(1, "Sales").unwrap()),
            Record::from(Department::new(2, "Engineering").unwrap()),
        ]
    );
}

#[test]
fn restoring_twice_rolls_back_second_attempt() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut ops = Operations::new(SqliteStore::open_in_memory().unwrap(), dir.path());
    fs::write(dir.path().join("jobs.csv"), "1,Recruiter\n").unwrap();
    ops.ingest_csv(EntityType::Job, &dir.path().join("jobs.csv")).unwrap();
    ops.run_backup(Target::One(EntityType::Job)).unwrap();

    let mut fresh = Operations::new(SqliteStore::open_in_memory().unwrap(), dir.path());
    fresh.run_restore(Target::One(EntityType::Job)).unwrap();
    assert!(fresh.run_restore(Target::One(EntityType::Job)).is_err());
    assert_eq!(fresh.store().count(EntityType::Job).unwrap(), 1);
}

#[test]
fn header_mode_maps_columns_by_name() {
    let dir = tempfile::TempDir::new().unwrap();
    let csv = dir.path().join("departments.csv");
    fs::write(&csv, "department,id\nSales,1\n").unwrap();

    let mut ops = Operations::new(SqliteStore::open_in_memory().unwrap(), dir.path())
        .with_header_mode(HeaderMode::Present);
    let result = ops.ingest_csv(EntityType::Department, &csv).unwrap();
    assert_eq!(result.succeeded, 1);
}

#[test]
fn cli_load_backup_restore_inspect() {
    let dir = tempfile::TempDir::new().unwrap();
    write_inputs(dir.path());
    let bin = env!("CARGO_BIN_EXE_hireledger");
    let backups = dir.path().join("backups");
    let report = dir.path().join("report.json");

    let run = |database: &str, args: &[&str]| {
        let output = Command::new(bin)
            .arg("--database")
            .arg(dir.path().join(database))
            .arg("--backup-dir")
            .arg(&backups)
            .args(args)
            .env("RUST_LOG", "off")
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "hireledger {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    };

    let data_dir = dir.path().to_string_lossy().into_owned();
    let report_path = report.to_string_lossy().into_owned();
    let out = run("cli.db", &["load", &data_dir, "--report", &report_path]);
    assert!(out.contains("hired_employees: attempted 3, succeeded 3, failed 0"));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["departments"]["succeeded"], 2);

    run("cli.db", &["backup", "all"]);
    let out = run("cli-restored.db", &["restore"]);
    assert!(out.contains("jobs: restored 2 records"));

    let container = backups.join("jobs.parquet").to_string_lossy().into_owned();
    let out = run("cli.db", &["inspect", &container]);
    let inspection: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(inspection["entity"], "job");
    assert_eq!(inspection["rows"][1]["job"], "Engineer");
}
