// ABOUTME: Batch Ingestion Engine: partitions candidates into fixed-size batches and commits each atomically.
// ABOUTME: Accumulates a per-record ledger of inserts and failures; one bad batch never blocks the next.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::entity::EntityType;
use crate::model::{Record, ValidationError};
use crate::store::{RecordStore, StoreError, UnitOfWork};

/// Why a record was not inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The candidate itself was invalid and never reached the store.
    Validation,
    /// The store rejected the batch the record belonged to.
    ConstraintViolation,
}

/// The outcome for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Inserted {
        entity: EntityType,
        id: i32,
    },
    Failed {
        candidate: Candidate,
        kind: FailureKind,
        reason: String,
    },
}

/// Ledger of one ingestion run. Outcomes are kept in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub batches: usize,
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchResult {
    fn push(&mut self, outcome: RecordOutcome) {
        self.attempted += 1;
        match outcome {
            RecordOutcome::Inserted { .. } => self.succeeded += 1,
            RecordOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Failed candidates with their failure kind and reason.
    pub fn failures(&self) -> impl Iterator<Item = (&Candidate, FailureKind, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            RecordOutcome::Failed {
                candidate,
                kind,
                reason,
            } => Some((candidate, *kind, reason.as_str())),
            RecordOutcome::Inserted { .. } => None,
        })
    }

    /// Identities of every inserted record, in input order.
    pub fn inserted_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.outcomes.iter().filter_map(|o| match o {
            RecordOutcome::Inserted { id, .. } => Some(*id),
            RecordOutcome::Failed { .. } => None,
        })
    }
}

/// Ingest candidates of any entity type in batches of at most `batch_size`.
///
/// Each batch is written in a single unit of work. Invalid candidates are
/// marked failed individually and never reach the store. If the store
/// rejects the batch, the whole batch rolls back and every record written
/// through it is marked failed; ingestion continues with the next batch.
/// Only a store that is unavailable (or otherwise broken) aborts the run.
pub fn ingest<S, I>(
    store: &mut S,
    candidates: I,
    batch_size: NonZeroUsize,
) -> Result<BatchResult, StoreError>
where
    S: RecordStore,
    I: IntoIterator<Item = Candidate>,
{
    run(store, None, candidates, batch_size)
}

/// Like [`ingest`], but candidates of any other entity type fail validation.
pub fn ingest_entity<S, I>(
    store: &mut S,
    entity: EntityType,
    candidates: I,
    batch_size: NonZeroUsize,
) -> Result<BatchResult, StoreError>
where
    S: RecordStore,
    I: IntoIterator<Item = Candidate>,
{
    run(store, Some(entity), candidates, batch_size)
}

fn run<S, I>(
    store: &mut S,
    expected: Option<EntityType>,
    candidates: I,
    batch_size: NonZeroUsize,
) -> Result<BatchResult, StoreError>
where
    S: RecordStore,
    I: IntoIterator<Item = Candidate>,
{
    let mut result = BatchResult::default();
    let mut iter = candidates.into_iter();

    loop {
        let batch: Vec<Candidate> = iter.by_ref().take(batch_size.get()).collect();
        if batch.is_empty() {
            break;
        }
        result.batches += 1;
        ingest_one_batch(store, expected, batch, result.batches, &mut result)?;
    }

    tracing::info!(
        attempted = result.attempted,
        succeeded = result.succeeded,
        failed = result.failed,
        batches = result.batches,
        "ingestion finished"
    );
    Ok(result)
}

fn ingest_one_batch<S: RecordStore>(
    store: &mut S,
    expected: Option<EntityType>,
    batch: Vec<Candidate>,
    batch_no: usize,
    result: &mut BatchResult,
) -> Result<(), StoreError> {
    let parsed: Vec<Result<Record, ValidationError>> = batch
        .iter()
        .map(|candidate| match expected {
            Some(expected) if candidate.entity != expected => Err(ValidationError::EntityMismatch {
                expected,
                found: candidate.entity,
            }),
            _ => candidate.to_record(),
        })
        .collect();

    let records: Vec<&Record> = parsed.iter().filter_map(|r| r.as_ref().ok()).collect();
    let rejection = match write_batch(store, &records) {
        Ok(()) => {
            tracing::debug!(batch = batch_no, inserted = records.len(), "batch committed");
            None
        }
        Err(e) if e.is_constraint() => {
            tracing::warn!(
                batch = batch_no,
                records = records.len(),
                error = %e,
                "batch rolled back"
            );
            Some(e.to_string())
        }
        Err(e) => {
            tracing::error!(batch = batch_no, error = %e, "store failure, aborting ingestion");
            return Err(e);
        }
    };

    for (candidate, parsed) in batch.into_iter().zip(parsed) {
        let outcome = match (parsed, &rejection) {
            (Ok(record), None) => RecordOutcome::Inserted {
                entity: record.entity(),
                id: record.id(),
            },
            (Ok(_), Some(reason)) => RecordOutcome::Failed {
                candidate,
                kind: FailureKind::ConstraintViolation,
                reason: reason.clone(),
            },
            (Err(e), _) => {
                tracing::warn!(
                    entity = %candidate.entity,
                    origin = %candidate.origin,
                    id = candidate.raw_id().unwrap_or("-"),
                    error = %e,
                    "rejected candidate"
                );
                RecordOutcome::Failed {
                    candidate,
                    kind: FailureKind::Validation,
                    reason: e.to_string(),
                }
            }
        };
        result.push(outcome);
    }

    Ok(())
}

fn write_batch<S: RecordStore>(store: &mut S, records: &[&Record]) -> Result<(), StoreError> {
    if records.is_empty() {
        return Ok(());
    }
    let mut tx = store.begin()?;
    for record in records {
        tx.insert(record)?;
    }
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    fn batch_size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn employee(id: &str, name: &str, hired: &str, dept: &str, job: &str) -> Candidate {
        Candidate::new(EntityType::HiredEmployee, format!("test:{id}"))
            .with("id", id)
            .with("name", name)
            .with("datetime", hired)
            .with("department_id", dept)
            .with("job_id", job)
    }

    fn seeded_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        let seed = vec![
            Candidate::new(EntityType::Department, "seed")
                .with("id", "1")
                .with("department", "Sales"),
            Candidate::new(EntityType::Job, "seed")
                .with("id", "2")
                .with("job", "Recruiter"),
        ];
        let result = ingest(&mut store, seed, batch_size(10)).unwrap();
        assert_eq!(result.succeeded, 2);
        store
    }

    #[test]
    fn empty_input_yields_all_zeros() {
        let mut store = MemoryStore::new();
        let result = ingest(&mut store, Vec::new(), batch_size(3)).unwrap();
        assert_eq!(result, BatchResult::default());
    }

    #[test]
    fn duplicate_identity_within_batch_fails_whole_batch() {
        let mut store = seeded_store();
        let candidates = vec![
            employee("1", "A", "2023-01-01", "1", "2"),
            employee("1", "B", "2023-01-02", "1", "2"),
        ];
        let result = ingest(&mut store, candidates, batch_size(2)).unwrap();
        assert_eq!(result.batches, 1);
        assert_eq!(result.succeeded, 0);
        assert_eq!(result.failed, 2);
        assert!(result.failures().all(|(_, kind, _)| kind == FailureKind::ConstraintViolation));
        assert!(store.fetch_all(EntityType::HiredEmployee).unwrap().is_empty());
    }

    #[test]
    fn failed_batch_does_not_block_later_batches() {
        let mut store = seeded_store();
        let candidates = vec![
            employee("10", "A", "2023-01-01", "1", "2"),
            employee("11", "B", "2023-01-01", "99", "2"),
            employee("12", "C", "2023-01-01", "1", "2"),
            employee("13", "D", "2023-01-01", "1", ""),
        ];
        let result = ingest(&mut store, candidates, batch_size(2)).unwrap();
        assert_eq!(result.batches, 2);
        assert_eq!(result.attempted, 4);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 2);
        assert_eq!(result.inserted_ids().collect::<Vec<_>>(), vec![12, 13]);

        let stored: Vec<i32> = store
            .fetch_all(EntityType::HiredEmployee)
            .unwrap()
            .iter()
            .map(Record::id)
            .collect();
        assert_eq!(stored, vec![12, 13]);
    }

    #[test]
    fn duplicate_of_existing_row_is_rejected_not_overwritten() {
        let mut store = seeded_store();
        ingest(&mut store, vec![employee("5", "Original", "2022-05-01", "1", "2")], batch_size(1)).unwrap();

        let result = ingest(
            &mut store,
            vec![employee("5", "Impostor", "2022-06-01", "1", "2")],
            batch_size(1),
        )
        .unwrap();
        assert_eq!(result.failed, 1);
        let (candidate, kind, reason) = result.failures().next().unwrap();
        assert_eq!(candidate.fields["name"], "Impostor");
        assert_eq!(kind, FailureKind::ConstraintViolation);
        assert!(reason.contains("5"));

        let stored = store.fetch_all(EntityType::HiredEmployee).unwrap();
        let Record::HiredEmployee(e) = &stored[0] else {
            panic!("expected an employee");
        };
        assert_eq!(e.name, "Original");
    }

    #[test]
    fn invalid_candidate_fails_alone() {
        let mut store = seeded_store();
        let candidates = vec![
            employee("20", "", "2023-01-01", "1", "2"),
            employee("21", "Valid", "2023-01-01", "1", "2"),
            employee("22", "Future", "2999-01-01", "1", "2"),
        ];
        let result = ingest(&mut store, candidates, batch_size(3)).unwrap();
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 2);
        let kinds: Vec<FailureKind> = result.failures().map(|(_, k, _)| k).collect();
        assert_eq!(kinds, vec![FailureKind::Validation, FailureKind::Validation]);
        assert!(matches!(result.outcomes[1], RecordOutcome::Inserted { id: 21, .. }));
    }

    #[test]
    fn last_batch_may_be_smaller() {
        let mut store = MemoryStore::new();
        let candidates: Vec<Candidate> = (1..=5)
            .map(|i| {
                Candidate::new(EntityType::Job, format!("jobs.csv:{i}"))
                    .with("id", i.to_string())
                    .with("job", format!("Job {i}"))
            })
            .collect();
        let result = ingest(&mut store, candidates, batch_size(2)).unwrap();
        assert_eq!(result.batches, 3);
        assert_eq!(result.succeeded, 5);
    }

    #[test]
    fn entity_mismatch_is_a_validation_failure() {
        let mut store = MemoryStore::new();
        let candidates = vec![
            Candidate::new(EntityType::Job, "x").with("id", "1").with("job", "Analyst"),
            Candidate::new(EntityType::Department, "y")
                .with("id", "1")
                .with("department", "Legal"),
        ];
        let result = ingest_entity(&mut store, EntityType::Department, candidates, batch_size(5)).unwrap();
        assert_eq!(result.succeeded, 1);
        let (candidate, kind, _) = result.failures().next().unwrap();
        assert_eq!(candidate.entity, EntityType::Job);
        assert_eq!(kind, FailureKind::Validation);
    }

    #[test]
    fn unavailable_store_aborts() {
        let mut store = MemoryStore::new();
        store.set_unavailable(true);
        let candidates = vec![Candidate::new(EntityType::Job, "x").with("id", "1").with("job", "Analyst")];
        let err = ingest(&mut store, candidates, batch_size(1)).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn result_serializes_with_status_tags() {
        let mut store = MemoryStore::new();
        let candidates = vec![Candidate::new(EntityType::Job, "jobs.csv:1").with("id", "0").with("job", "X")];
        let result = ingest(&mut store, candidates, batch_size(1)).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["failed"], 1);
        assert_eq!(json["outcomes"][0]["status"], "failed");
        assert_eq!(json["outcomes"][0]["kind"], "validation");
        assert_eq!(json["outcomes"][0]["candidate"]["origin"], "jobs.csv:1");
    }
}
