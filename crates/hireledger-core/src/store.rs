// ABOUTME: Store abstraction: a transactional unit of work for inserts plus an ordered full scan.
// ABOUTME: Concrete stores (SQLite, in-memory) implement these traits and are injected by callers.

use thiserror::Error;

use crate::entity::EntityType;
use crate::model::Record;

/// Errors surfaced by a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store rejected a write: duplicate identity, missing referenced
    /// row, or another declared constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The store cannot be reached. Fatal for the current operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Any other store failure. Also fatal.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// True when the failure is attributable to the written data rather than
    /// to the store itself.
    pub fn is_constraint(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation(_))
    }
}

/// A transactional unit of work. Dropping it without calling
/// [`UnitOfWork::commit`] rolls back every insert made through it.
pub trait UnitOfWork {
    fn insert(&mut self, record: &Record) -> Result<(), StoreError>;

    fn commit(self) -> Result<(), StoreError>;
}

/// The persistence collaborator used by ingestion, backup, and restore.
pub trait RecordStore {
    type Tx<'a>: UnitOfWork
    where
        Self: 'a;

    /// Open a new unit of work.
    fn begin(&mut self) -> Result<Self::Tx<'_>, StoreError>;

    /// Every record of one entity type, ordered by identity.
    fn fetch_all(&self, entity: EntityType) -> Result<Vec<Record>, StoreError>;
}
