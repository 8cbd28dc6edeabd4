// ABOUTME: Test utilities for hireledger-core, including an in-memory transactional store.
// ABOUTME: MemoryStore enforces identity uniqueness and references like the SQLite store does.

use std::collections::BTreeMap;

use crate::entity::EntityType;
use crate::model::Record;
use crate::store::{RecordStore, StoreError, UnitOfWork};

/// An in-memory [`RecordStore`].
///
/// Inserts are staged in the unit of work and only become visible on
/// commit. Duplicate identities and dangling department/job references are
/// reported as [`StoreError::ConstraintViolation`]. The store can be flipped
/// to "unavailable" to exercise fatal-error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<EntityType, BTreeMap<i32, Record>>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every operation fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }

    fn contains(&self, entity: EntityType, id: i32) -> bool {
        self.tables.get(&entity).is_some_and(|t| t.contains_key(&id))
    }
}

/// Unit of work over a [`MemoryStore`].
pub struct MemoryTx<'a> {
    store: &'a mut MemoryStore,
    staged: Vec<Record>,
}

impl MemoryTx<'_> {
    fn visible(&self, entity: EntityType, id: i32) -> bool {
        self.store.contains(entity, id)
            || self.staged.iter().any(|r| r.entity() == entity && r.id() == id)
    }
}

impl UnitOfWork for MemoryTx<'_> {
    fn insert(&mut self, record: &Record) -> Result<(), StoreError> {
        self.store.check_available()?;

        let entity = record.entity();
        if self.visible(entity, record.id()) {
            return Err(StoreError::ConstraintViolation(format!(
                "{entity}: identity {} already exists",
                record.id()
            )));
        }

        if let Record::HiredEmployee(e) = record {
            if !self.visible(EntityType::Department, e.department_id) {
                return Err(StoreError::ConstraintViolation(format!(
                    "hired_employees {}: department {} does not exist",
                    e.id, e.department_id
                )));
            }
            if let Some(job_id) = e.job_id
                && !self.visible(EntityType::Job, job_id)
            {
                return Err(StoreError::ConstraintViolation(format!(
                    "hired_employees {}: job {job_id} does not exist",
                    e.id
                )));
            }
        }

        self.staged.push(record.clone());
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.store.check_available()?;
        for record in self.staged {
            self.store
                .tables
                .entry(record.entity())
                .or_default()
                .insert(record.id(), record);
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    type Tx<'a> = MemoryTx<'a>;

    fn begin(&mut self) -> Result<Self::Tx<'_>, StoreError> {
        self.check_available()?;
        Ok(MemoryTx {
            store: self,
            staged: Vec::new(),
        })
    }

    fn fetch_all(&self, entity: EntityType) -> Result<Vec<Record>, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .get(&entity)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }
}
