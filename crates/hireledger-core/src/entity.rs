// ABOUTME: Defines EntityType, the closed set of record kinds hireledger ingests and backs up.
// ABOUTME: Maps each kind to its table name, record name, and parses user-facing names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a string does not name a known entity type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown entity type: {0} (expected departments, jobs, or hired_employees)")]
pub struct UnknownEntity(pub String);

/// The kinds of records managed by hireledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Department,
    Job,
    HiredEmployee,
}

impl EntityType {
    /// All entity types in dependency order: referenced tables come first,
    /// so restoring in this order never trips a foreign key.
    pub const ALL: [EntityType; 3] = [EntityType::Department, EntityType::Job, EntityType::HiredEmployee];

    /// Name of the backing table, also used for container file names.
    pub fn table_name(self) -> &'static str {
        match self {
            EntityType::Department => "departments",
            EntityType::Job => "jobs",
            EntityType::HiredEmployee => "hired_employees",
        }
    }

    /// Record name written into container schema descriptors.
    pub fn record_name(self) -> &'static str {
        match self {
            EntityType::Department => "Department",
            EntityType::Job => "Job",
            EntityType::HiredEmployee => "HiredEmployee",
        }
    }

    /// Resolve an entity type from a descriptor's record name.
    pub fn from_record_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.record_name() == name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for EntityType {
    type Err = UnknownEntity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "department" | "departments" => Ok(EntityType::Department),
            "job" | "jobs" => Ok(EntityType::Job),
            "hired_employee" | "hired_employees" | "employee" | "employees" => {
                Ok(EntityType::HiredEmployee)
            }
            _ => Err(UnknownEntity(s.to_string())),
        }
    }
}
