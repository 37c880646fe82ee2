//! JSON codec for task records.
//!
//! Converts between the textual representation exchanged with callers and
//! [`TaskRecord`]. New records are parsed with [`parse_new`]; updates are
//! parsed into a [`TaskPatch`] whose absent fields leave the stored record
//! untouched.

use crate::error::{Result, StoreError};
use crate::record::TaskRecord;
use crate::types::{Priority, Status};
use chrono::{Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt::Write as _;

/// Raw payload as sent by callers; every field is optional at this level.
/// Numbers are kept as JSON numbers so floats and out-of-range values can
/// be clamped instead of failing the whole payload.
#[derive(Debug, Default, Deserialize)]
struct TaskPayload {
    id: Option<Number>,
    title: Option<String>,
    description: Option<String>,
    #[serde(alias = "priority")]
    prio: Option<Number>,
    status: Option<Number>,
    due_date: Option<Number>,
    completed_at: Option<Number>,
}

/// The exact integer value of `n`, if it has one that fits an `i64`
fn exact_int(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn priority(n: &Number) -> Priority {
    exact_int(n).and_then(Priority::from_value).unwrap_or_default()
}

fn status(n: &Number) -> Status {
    exact_int(n).and_then(Status::from_value).unwrap_or_default()
}

/// Timestamps truncate fractional seconds and saturate at the `i64` range
fn timestamp(n: &Number) -> i64 {
    exact_int(n)
        .or_else(|| n.as_f64().map(|f| f as i64))
        .unwrap_or(0)
}

fn check_text(field: &str, text: &str) -> Result<()> {
    if text.contains('\0') {
        return Err(StoreError::invalid_payload(format!(
            "'{}' must not contain NUL characters",
            field
        )));
    }
    Ok(())
}

/// Serialized form of a record
#[derive(Debug, Serialize)]
struct TaskView<'a> {
    id: u32,
    title: &'a str,
    description: &'a str,
    prio: u8,
    status: u8,
    created_at: i64,
    due_date: i64,
    completed_at: i64,
}

impl<'a> From<&'a TaskRecord> for TaskView<'a> {
    fn from(record: &'a TaskRecord) -> Self {
        Self {
            id: record.id,
            title: &record.title,
            description: &record.description,
            prio: record.priority as u8,
            status: record.status as u8,
            created_at: record.created_at,
            due_date: record.due_date,
            completed_at: record.completed_at,
        }
    }
}

/// A partial update to an existing record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskPatch {
    pub id: u32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub due_date: Option<i64>,
    pub completed_at: Option<i64>,
}

impl TaskPatch {
    /// Overwrite the fields present in this patch
    ///
    /// The id and creation time of `record` are never changed.
    pub fn apply(&self, record: &mut TaskRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(description) = &self.description {
            record.description = description.clone();
        }
        if let Some(priority) = self.priority {
            record.priority = priority;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(due_date) = self.due_date {
            record.due_date = due_date;
        }
        if let Some(completed_at) = self.completed_at {
            record.completed_at = completed_at;
        }
        record.clamp_text();
    }
}

fn parse_payload(text: &str) -> Result<TaskPayload> {
    Ok(serde_json::from_str(text)?)
}

/// Parse a new record. `title` is required; id is left at 0 for the store
/// to assign and the creation time is set to now.
pub fn parse_new(text: &str) -> Result<TaskRecord> {
    let payload = parse_payload(text)?;
    let title = payload
        .title
        .ok_or_else(|| StoreError::invalid_payload("'title' is required for new tasks"))?;

    let mut record = TaskRecord {
        id: 0,
        title,
        description: payload.description.unwrap_or_default(),
        created_at: now(),
        due_date: payload.due_date.as_ref().map(timestamp).unwrap_or(0),
        completed_at: payload.completed_at.as_ref().map(timestamp).unwrap_or(0),
        priority: payload.prio.as_ref().map(priority).unwrap_or_default(),
        status: payload.status.as_ref().map(status).unwrap_or_default(),
    };
    record.validate()?;
    record.clamp_text();
    Ok(record)
}

/// Parse an update. `id` is required and must name an existing record.
pub fn parse_patch(text: &str) -> Result<TaskPatch> {
    let payload = parse_payload(text)?;
    let id = match payload.id {
        Some(id) => match exact_int(&id) {
            Some(value) if value > 0 && value <= u32::MAX as i64 => value as u32,
            _ => return Err(StoreError::invalid_payload(format!("invalid id {}", id))),
        },
        None => return Err(StoreError::invalid_payload("'id' is required for updates")),
    };
    if let Some(title) = &payload.title {
        check_text("title", title)?;
    }
    if let Some(description) = &payload.description {
        check_text("description", description)?;
    }

    Ok(TaskPatch {
        id,
        title: payload.title,
        description: payload.description,
        priority: payload.prio.as_ref().map(priority),
        status: payload.status.as_ref().map(status),
        due_date: payload.due_date.as_ref().map(timestamp),
        completed_at: payload.completed_at.as_ref().map(timestamp),
    })
}

/// Render one record as a pretty-printed JSON object
pub fn to_json(record: &TaskRecord) -> Result<String> {
    Ok(serde_json::to_string_pretty(&TaskView::from(record))?)
}

/// Render records as a compact JSON array (`[]` when empty)
pub fn to_json_array(records: &[TaskRecord]) -> Result<String> {
    let views: Vec<TaskView<'_>> = records.iter().map(TaskView::from).collect();
    Ok(serde_json::to_string(&views)?)
}

/// Current time as unix seconds
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Format a timestamp in local time, or `N/A` when unset
pub fn readable_time(timestamp: i64) -> String {
    if timestamp == 0 {
        return "N/A".to_string();
    }
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "Invalid Time".to_string(),
    }
}

/// Multi-line, human-readable description of a record
pub fn describe(record: &TaskRecord) -> String {
    let mut out = String::new();
    let description = if record.description.is_empty() {
        "(None)"
    } else {
        &record.description
    };

    // Writing to a String cannot fail
    let _ = writeln!(out, "Task ID: {}", record.id);
    let _ = writeln!(out, "Title: {}", record.title);
    let _ = writeln!(out, "Description: {}", description);
    let _ = writeln!(out, "Status: {}", record.status);
    let _ = writeln!(out, "Priority: {}", record.priority);
    let _ = writeln!(out, "Created At: {}", readable_time(record.created_at));
    let _ = writeln!(out, "Due Date: {}", readable_time(record.due_date));
    let _ = write!(out, "Completed At: {}", readable_time(record.completed_at));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TITLE_CAPACITY;
    use serde_json::Value;

    #[test]
    fn test_parse_new_defaults() {
        let before = now();
        let record = parse_new(r#"{"title": "T1"}"#).unwrap();

        assert_eq!(record.id, 0);
        assert_eq!(record.title, "T1");
        assert_eq!(record.description, "");
        assert_eq!(record.priority, Priority::Medium);
        assert_eq!(record.status, Status::Pending);
        assert_eq!(record.due_date, 0);
        assert!(record.created_at >= before);
    }

    #[test]
    fn test_parse_new_ignores_id_and_clamps_enums() {
        let record = parse_new(
            r#"{"id": 77, "title": "T", "prio": 9, "status": 1, "due_date": 1700000000}"#,
        )
        .unwrap();

        assert_eq!(record.id, 0);
        assert_eq!(record.priority, Priority::Medium);
        assert_eq!(record.status, Status::InProgress);
        assert_eq!(record.due_date, 1_700_000_000);
    }

    #[test]
    fn test_parse_new_rejects_bad_input() {
        assert!(matches!(
            parse_new(r#"{"description": "no title"}"#),
            Err(StoreError::InvalidPayload(_))
        ));
        assert!(matches!(parse_new("{not json"), Err(StoreError::InvalidPayload(_))));
        assert!(parse_new(r#"["title"]"#).is_err());
    }

    #[test]
    fn test_parse_new_clamps_non_integer_numbers() {
        let record = parse_new(r#"{"title": "t", "prio": 1.0, "status": 2.0}"#).unwrap();
        assert_eq!(record.priority, Priority::Important);
        assert_eq!(record.status, Status::Done);

        let record = parse_new(r#"{"title": "t", "prio": 1e30, "status": 1.5}"#).unwrap();
        assert_eq!(record.priority, Priority::Medium);
        assert_eq!(record.status, Status::Pending);

        let record = parse_new(
            r#"{"title": "t", "prio": 18446744073709551615, "due_date": 1700000000.75}"#,
        )
        .unwrap();
        assert_eq!(record.priority, Priority::Medium);
        assert_eq!(record.due_date, 1_700_000_000);
    }

    #[test]
    fn test_nul_in_text_is_rejected() {
        assert!(matches!(
            parse_new(r#"{"title": "a\u0000b"}"#),
            Err(StoreError::InvalidPayload(_))
        ));
        assert!(parse_new(r#"{"title": "ok", "description": "x\u0000y"}"#).is_err());
        assert!(matches!(
            parse_patch(r#"{"id": 1, "description": "x\u0000"}"#),
            Err(StoreError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_parse_new_truncates_long_title() {
        let text = format!(r#"{{"title": "{}"}}"#, "a".repeat(300));
        let record = parse_new(&text).unwrap();
        assert_eq!(record.title.len(), TITLE_CAPACITY - 1);
    }

    #[test]
    fn test_patch_preserves_absent_fields() {
        let mut record = TaskRecord {
            id: 4,
            title: "Old".to_string(),
            description: "Keep me".to_string(),
            created_at: 100,
            due_date: 200,
            priority: Priority::Urgent,
            ..TaskRecord::default()
        };

        let patch = parse_patch(r#"{"id": 4, "title": "New", "status": 2, "completed_at": 300}"#)
            .unwrap();
        assert_eq!(patch.id, 4);
        patch.apply(&mut record);

        assert_eq!(record.title, "New");
        assert_eq!(record.description, "Keep me");
        assert_eq!(record.priority, Priority::Urgent);
        assert_eq!(record.status, Status::Done);
        assert_eq!(record.created_at, 100);
        assert_eq!(record.due_date, 200);
        assert_eq!(record.completed_at, 300);
    }

    #[test]
    fn test_patch_requires_valid_id() {
        assert!(parse_patch(r#"{"title": "x"}"#).is_err());
        assert!(parse_patch(r#"{"id": 0}"#).is_err());
        assert!(parse_patch(r#"{"id": -3}"#).is_err());
        assert!(parse_patch(r#"{"id": 2.5}"#).is_err());
        assert!(parse_patch(r#"{"id": 4294967296}"#).is_err());
        assert_eq!(parse_patch(r#"{"id": 3.0}"#).unwrap().id, 3);
        assert!(parse_patch(r#"{"id": 3}"#).is_ok());
    }

    #[test]
    fn test_to_json_fields() {
        let record = TaskRecord {
            id: 2,
            title: "T2".to_string(),
            priority: Priority::Low,
            status: Status::Done,
            created_at: 5,
            ..TaskRecord::default()
        };

        let value: Value = serde_json::from_str(&to_json(&record).unwrap()).unwrap();
        assert_eq!(value["id"], 2);
        assert_eq!(value["title"], "T2");
        assert_eq!(value["prio"], 3);
        assert_eq!(value["status"], 2);
        assert_eq!(value["created_at"], 5);
        assert_eq!(value["completed_at"], 0);
    }

    #[test]
    fn test_to_json_array() {
        assert_eq!(to_json_array(&[]).unwrap(), "[]");

        let records = vec![TaskRecord::new("a"), TaskRecord::new("b")];
        let value: Value = serde_json::from_str(&to_json_array(&records).unwrap()).unwrap();
        assert_eq!(value.as_array().map(|a| a.len()), Some(2));
        assert_eq!(value[1]["title"], "b");
    }

    #[test]
    fn test_readable_time() {
        assert_eq!(readable_time(0), "N/A");
        let formatted = readable_time(1_700_000_000);
        assert_eq!(formatted.len(), "2023-11-14 22:13:20".len());
        assert!(formatted.starts_with("2023-11-1"));
    }

    #[test]
    fn test_describe() {
        let text = describe(&TaskRecord::new("Plan"));
        assert!(text.contains("Title: Plan"));
        assert!(text.contains("Description: (None)"));
        assert!(text.contains("Completed At: N/A"));
    }
}
