// ABOUTME: Defines the validated record types: Department, Job, HiredEmployee, and the Record union.
// ABOUTME: Constructors enforce identity, name, and hire-timestamp constraints before a record exists.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::EntityType;

/// Longest accepted name, in characters, for every named record.
pub const MAX_NAME_LEN: usize = 100;

/// A candidate record failed a type, range, or temporal constraint.
/// Always attributable to exactly one record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' has invalid value '{value}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("identities and references must be positive, got {0}")]
    NonPositiveId(i64),

    #[error("field '{0}' must not be blank")]
    BlankName(String),

    #[error("field '{field}' is {len} characters long; the limit is {max}")]
    NameTooLong { field: String, len: usize, max: usize },

    #[error("hire timestamp {hired_at} is later than the current time {now}")]
    HiredInFuture { hired_at: String, now: String },

    #[error("expected a {expected} record, got {found}")]
    EntityMismatch {
        expected: EntityType,
        found: EntityType,
    },

    #[error("malformed record: {0}")]
    Malformed(String),
}

/// An organizational department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: i32,
    pub name: String,
}

impl Department {
    pub fn new(id: i32, name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        check_id(id)?;
        check_name("department", &name)?;
        Ok(Self { id, name })
    }
}

/// A job title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i32,
    pub title: String,
}

impl Job {
    pub fn new(id: i32, title: impl Into<String>) -> Result<Self, ValidationError> {
        let title = title.into();
        check_id(id)?;
        check_name("job", &title)?;
        Ok(Self { id, title })
    }
}

/// A hire event: one employee joining a department, optionally in a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiredEmployee {
    pub id: i32,
    pub name: String,
    pub hired_at: DateTime<Utc>,
    pub department_id: i32,
    pub job_id: Option<i32>,
}

impl HiredEmployee {
    /// Build a validated hire record. The hire timestamp is checked against
    /// the wall clock at the moment of construction.
    pub fn new(
        id: i32,
        name: impl Into<String>,
        hired_at: DateTime<Utc>,
        department_id: i32,
        job_id: Option<i32>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        check_id(id)?;
        check_name("name", &name)?;
        check_id(department_id)?;
        if let Some(job_id) = job_id {
            check_id(job_id)?;
        }

        let now = Utc::now();
        if hired_at > now {
            return Err(ValidationError::HiredInFuture {
                hired_at: format_timestamp(&hired_at),
                now: format_timestamp(&now),
            });
        }

        Ok(Self {
            id,
            name,
            hired_at,
            department_id,
            job_id,
        })
    }
}

/// Any record hireledger stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Record {
    Department(Department),
    Job(Job),
    HiredEmployee(HiredEmployee),
}

impl Record {
    pub fn entity(&self) -> EntityType {
        match self {
            Record::Department(_) => EntityType::Department,
            Record::Job(_) => EntityType::Job,
            Record::HiredEmployee(_) => EntityType::HiredEmployee,
        }
    }

    /// The externally assigned identity of the record.
    pub fn id(&self) -> i32 {
        match self {
            Record::Department(d) => d.id,
            Record::Job(j) => j.id,
            Record::HiredEmployee(e) => e.id,
        }
    }
}

impl From<Department> for Record {
    fn from(value: Department) -> Self {
        Record::Department(value)
    }
}

impl From<Job> for Record {
    fn from(value: Job) -> Self {
        Record::Job(value)
    }
}

impl From<HiredEmployee> for Record {
    fn from(value: HiredEmployee) -> Self {
        Record::HiredEmployee(value)
    }
}

/// Render a timestamp as RFC 3339 in UTC. Sub-second digits are emitted
/// only when present, so parsing the output yields the same instant.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an ISO-8601 timestamp. Accepts RFC 3339 with an offset, naive
/// date-times (read as UTC) with `T` or a space separator, and bare dates
/// (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn check_id(id: i32) -> Result<(), ValidationError> {
    if id <= 0 {
        return Err(ValidationError::NonPositiveId(id.into()));
    }
    Ok(())
}

fn check_name(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankName(field.to_string()));
    }
    let len = value.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            field: field.to_string(),
            len,
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn department_rejects_blank_and_long_names() {
        assert!(Department::new(1, "Sales").is_ok());
        assert_eq!(
            Department::new(1, "   ").unwrap_err(),
            ValidationError::BlankName("department".to_string())
        );
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            Job::new(1, long).unwrap_err(),
            ValidationError::NameTooLong { len: 101, max: 100, .. }
        ));
    }

    #[test]
    fn ids_must_be_positive() {
        assert_eq!(Department::new(0, "Sales").unwrap_err(), ValidationError::NonPositiveId(0));
        assert!(matches!(
            HiredEmployee::new(3, "Ana", Utc::now(), -1, None),
            Err(ValidationError::NonPositiveId(-1))
        ));
    }

    #[test]
    fn hire_in_future_is_rejected() {
        let tomorrow = Utc::now() + Duration::days(1);
        let err = HiredEmployee::new(1, "Ana", tomorrow, 1, Some(2)).unwrap_err();
        assert!(matches!(err, ValidationError::HiredInFuture { .. }));
    }

    #[test]
    fn job_reference_is_optional() {
        let hired = Utc.with_ymd_and_hms(2021, 11, 7, 2, 48, 42).unwrap();
        let employee = HiredEmployee::new(4, "Ana", hired, 2, None).unwrap();
        assert_eq!(employee.job_id, None);
        assert_eq!(Record::from(employee).entity(), EntityType::HiredEmployee);
    }

    #[test]
    fn parse_timestamp_accepts_common_iso_forms() {
        let expected = Utc.with_ymd_and_hms(2021, 11, 7, 2, 48, 42).unwrap();
        assert_eq!(parse_timestamp("2021-11-07T02:48:42Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2021-11-07T02:48:42+00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2021-11-07T02:48:42").unwrap(), expected);
        assert_eq!(parse_timestamp("2021-11-07 02:48:42").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2023-01-01").unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        let ts = parse_timestamp("2021-11-07T04:48:42+02:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2021-11-07T02:48:42Z");
    }

    #[test]
    fn format_keeps_sub_second_precision() {
        let ts = parse_timestamp("2021-11-07T02:48:42.123456Z").unwrap();
        let rendered = format_timestamp(&ts);
        assert_eq!(rendered, "2021-11-07T02:48:42.123456Z");
        assert_eq!(parse_timestamp(&rendered).unwrap(), ts);
    }
}
