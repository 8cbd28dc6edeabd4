// ABOUTME: SQLite-backed RecordStore holding departments, jobs, and hired employees.
// ABOUTME: Inserts run inside rusqlite transactions; constraint failures map to StoreError variants.

use std::path::Path;

use hireledger_core::model::{format_timestamp, parse_timestamp};
use hireledger_core::{Department, EntityType, HiredEmployee, Job, Record, RecordStore, StoreError, UnitOfWork};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, Transaction, params};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS departments (
        id INTEGER PRIMARY KEY,
        department TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS jobs (
        id INTEGER PRIMARY KEY,
        job TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS hired_employees (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        datetime TEXT NOT NULL,
        department_id INTEGER NOT NULL REFERENCES departments(id),
        job_id INTEGER REFERENCES jobs(id)
    );";

/// The relational store. Owns one connection; callers acquire it and pass
/// it explicitly to ingestion, backup, and restore.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a database file and ensure the tables exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| {
            StoreError::Unavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(store_error)?;
        Self::init(conn)
    }

    /// A private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(store_error)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(store_error)?;
        conn.execute_batch(SCHEMA).map_err(store_error)?;
        Ok(Self { conn })
    }

    /// Number of rows stored for an entity type.
    pub fn count(&self, entity: EntityType) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", entity.table_name());
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(store_error)?;
        Ok(count.max(0) as u64)
    }
}

/// Map a rusqlite error onto the store error taxonomy.
fn store_error(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation => StoreError::ConstraintViolation(e.to_string()),
            ErrorCode::CannotOpen
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::ReadOnly
            | ErrorCode::DiskFull => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Backend(e.to_string()),
        },
        _ => StoreError::Backend(e.to_string()),
    }
}

/// A unit of work over [`SqliteStore`]. Rolls back when dropped uncommitted.
pub struct SqliteTx<'a> {
    tx: Transaction<'a>,
}

impl UnitOfWork for SqliteTx<'_> {
    fn insert(&mut self, record: &Record) -> Result<(), StoreError> {
        let result = match record {
            Record::Department(d) => self
                .tx
                .prepare_cached("INSERT INTO departments (id, department) VALUES (?1, ?2)")
                .and_then(|mut stmt| stmt.execute(params![d.id, d.name])),
            Record::Job(j) => self
                .tx
                .prepare_cached("INSERT INTO jobs (id, job) VALUES (?1, ?2)")
                .and_then(|mut stmt| stmt.execute(params![j.id, j.title])),
            Record::HiredEmployee(e) => self
                .tx
                .prepare_cached(
                    "INSERT INTO hired_employees (id, name, datetime, department_id, job_id)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .and_then(|mut stmt| {
                    stmt.execute(params![
                        e.id,
                        e.name,
                        format_timestamp(&e.hired_at),
                        e.department_id,
                        e.job_id,
                    ])
                }),
        };

        result.map(|_| ()).map_err(|e| match store_error(e) {
            StoreError::ConstraintViolation(msg) => StoreError::ConstraintViolation(format!(
                "{} {}: {msg}",
                record.entity(),
                record.id()
            )),
            other => other,
        })
    }

    fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().map_err(store_error)
    }
}

impl RecordStore for SqliteStore {
    type Tx<'a> = SqliteTx<'a>;

    fn begin(&mut self) -> Result<Self::Tx<'_>, StoreError> {
        let tx = self.conn.transaction().map_err(store_error)?;
        Ok(SqliteTx { tx })
    }

    fn fetch_all(&self, entity: EntityType) -> Result<Vec<Record>, StoreError> {
        let records = match entity {
            EntityType::Department => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT id, department FROM departments ORDER BY id ASC")
                    .map_err(store_error)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(Record::Department(Department {
                            id: row.get(0)?,
                            name: row.get(1)?,
                        }))
                    })
                    .map_err(store_error)?;
                rows.collect::<Result<Vec<_>, _>>()
            }
            EntityType::Job => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT id, job FROM jobs ORDER BY id ASC")
                    .map_err(store_error)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(Record::Job(Job {
                            id: row.get(0)?,
                            title: row.get(1)?,
                        }))
                    })
                    .map_err(store_error)?;
                rows.collect::<Result<Vec<_>, _>>()
            }
            EntityType::HiredEmployee => {
                let mut stmt = self
                    .conn
                    .prepare(
                        "SELECT id, name, datetime, department_id, job_id
                         FROM hired_employees ORDER BY id ASC",
                    )
                    .map_err(store_error)?;
                let rows = stmt
                    .query_map([], |row| {
                        let raw: String = row.get(2)?;
                        let hired_at = parse_timestamp(&raw).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
                        })?;
                        Ok(Record::HiredEmployee(HiredEmployee {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            hired_at,
                            department_id: row.get(3)?,
                            job_id: row.get(4)?,
                        }))
                    })
                    .map_err(store_error)?;
                rows.collect::<Result<Vec<_>, _>>()
            }
        };
        records.map_err(store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn department(id: i32, name: &str) -> Record {
        Department::new(id, name).unwrap().into()
    }

    fn employee(id: i32, dept: i32, job: Option<i32>) -> Record {
        let hired = Utc.with_ymd_and_hms(2021, 7, 27, 16, 2, 8).unwrap();
        HiredEmployee::new(id, "Marcelo Gonzalez", hired, dept, job).unwrap().into()
    }

    fn seeded() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        tx.insert(&department(1, "Sales")).unwrap();
        tx.insert(&Job::new(2, "Recruiter").unwrap().into()).unwrap();
        tx.commit().unwrap();
        store
    }

    #[test]
    fn insert_and_fetch_in_identity_order() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        tx.insert(&department(2, "Engineering")).unwrap();
        tx.insert(&department(1, "Sales")).unwrap();
        tx.commit().unwrap();

        let rows = store.fetch_all(EntityType::Department).unwrap();
        assert_eq!(rows, vec![department(1, "Sales"), department(2, "Engineering")]);
        assert_eq!(store.count(EntityType::Department).unwrap(), 2);
    }

    #[test]
    fn duplicate_identity_is_a_constraint_violation() {
        let mut store = seeded();
        let mut tx = store.begin().unwrap();
        let err = tx.insert(&department(1, "Other Sales")).unwrap_err();
        assert!(err.is_constraint(), "unexpected error: {err}");
        assert!(err.to_string().contains("departments 1"));
        drop(tx);

        let rows = store.fetch_all(EntityType::Department).unwrap();
        assert_eq!(rows, vec![department(1, "Sales")]);
    }

    #[test]
    fn missing_reference_is_a_constraint_violation() {
        let mut store = seeded();
        let mut tx = store.begin().unwrap();
        let err = tx.insert(&employee(10, 42, Some(2))).unwrap_err();
        assert!(err.is_constraint());
        let err = tx.insert(&employee(11, 1, Some(42))).unwrap_err();
        assert!(err.is_constraint());
    }

    #[test]
    fn uncommitted_unit_of_work_rolls_back() {
        let mut store = seeded();
        {
            let mut tx = store.begin().unwrap();
            tx.insert(&employee(10, 1, Some(2))).unwrap();
        }
        assert!(store.fetch_all(EntityType::HiredEmployee).unwrap().is_empty());
    }

    #[test]
    fn employee_round_trips_with_null_job() {
        let mut store = seeded();
        let mut tx = store.begin().unwrap();
        tx.insert(&employee(10, 1, None)).unwrap();
        tx.insert(&employee(11, 1, Some(2))).unwrap();
        tx.commit().unwrap();

        let rows = store.fetch_all(EntityType::HiredEmployee).unwrap();
        assert_eq!(rows, vec![employee(10, 1, None), employee(11, 1, Some(2))]);
    }

    #[test]
    fn file_database_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hireledger.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            let mut tx = store.begin().unwrap();
            tx.insert(&department(5, "Legal")).unwrap();
            tx.commit().unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.fetch_all(EntityType::Department).unwrap(), vec![department(5, "Legal")]);
    }

    #[test]
    fn unopenable_path_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("nested").join("db.sqlite");
        let err = SqliteStore::open(&path).err().unwrap();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
