// ABOUTME: Streams Candidates out of a CSV file for one entity type.
// ABOUTME: Cells map to registry field order (no header) or by column name (header); I/O errors surface on finish.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder};
use hireledger_core::{Candidate, EntityType, describe};
use thiserror::Error;

/// Whether the first row of a CSV file names its columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderMode {
    /// Every row is data; cells follow registry field order.
    #[default]
    Absent,
    /// The first row holds column names matching registry field names.
    Present,
}

impl HeaderMode {
    pub fn from_flag(has_header: bool) -> Self {
        if has_header {
            HeaderMode::Present
        } else {
            HeaderMode::Absent
        }
    }
}

/// File-level CSV failures. Row-level problems are never errors here.
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("read failed in {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A lazy iterator of candidates read from a CSV file.
///
/// Short rows and long rows are still yielded; the missing or surplus
/// cells become validation failures during ingestion. An I/O or
/// encoding-level read error ends iteration and is returned by
/// [`CsvSource::finish`].
pub struct CsvSource {
    entity: EntityType,
    path: PathBuf,
    label: String,
    reader: csv::Reader<File>,
    /// Field name per column; `None` for header columns the registry does not declare.
    columns: Vec<Option<String>>,
    header: HeaderMode,
    record: ByteRecord,
    error: Option<csv::Error>,
}

impl CsvSource {
    pub fn open(path: &Path, entity: EntityType, header: HeaderMode) -> Result<Self, CsvError> {
        let open_failed = |source| CsvError::Open {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(header == HeaderMode::Present)
            .flexible(true)
            .from_path(path)
            .map_err(open_failed)?;

        let schema = describe(entity);
        let columns = match header {
            HeaderMode::Absent => schema.fields.iter().map(|f| Some(f.name.to_string())).collect(),
            HeaderMode::Present => reader
                .byte_headers()
                .map_err(open_failed)?
                .iter()
                .map(|cell| {
                    let name = String::from_utf8_lossy(cell).trim().to_string();
                    schema.field(&name).map(|_| name)
                })
                .collect(),
        };

        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            entity,
            path: path.to_path_buf(),
            label,
            reader,
            columns,
            header,
            record: ByteRecord::new(),
            error: None,
        })
    }

    pub fn entity(&self) -> EntityType {
        self.entity
    }

    /// End the stream, reporting any read error that cut it short.
    pub fn finish(self) -> Result<(), CsvError> {
        match self.error {
            Some(source) => Err(CsvError::Read {
                path: self.path,
                source,
            }),
            None => Ok(()),
        }
    }

    fn candidate(&self) -> Candidate {
        let line = self.record.position().map_or(0, |p| p.line());
        let mut candidate = Candidate::new(self.entity, format!("{}:{line}", self.label));

        for (i, cell) in self.record.iter().enumerate() {
            let value = String::from_utf8_lossy(cell).into_owned();
            match self.columns.get(i) {
                Some(Some(name)) => candidate = candidate.with(name, value),
                Some(None) => {}
                // Surplus cell in a headerless row; kept so validation reports it.
                None if self.header == HeaderMode::Absent => {
                    candidate = candidate.with(&format!("column_{}", i + 1), value);
                }
                None => {}
            }
        }
        candidate
    }
}

impl Iterator for CsvSource {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if self.error.is_some() {
            return None;
        }
        match self.reader.read_byte_record(&mut self.record) {
            Ok(true) => Some(self.candidate()),
            Ok(false) => None,
            Err(e) => {
                tracing::error!(entity = %self.entity, path = %self.path.display(), error = %e, "csv read failed");
                self.error = Some(e);
                None
            }
        }
    }
}
