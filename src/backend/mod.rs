//! Tabular persistence for notes and their attendee links.
//!
//! The managed backend owns storage and authorization. This module only
//! describes the rows the client reads and writes, plus the operations the
//! notes views need, as the [`NotesBackend`] trait.

mod memory;
mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;
pub(crate) use rest::error_message;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Table-name spellings tried in order when config does not name one.
pub const NOTES_TABLE_CANDIDATES: &[&str] = &["notes", "Notes"];
pub const ATTENDEES_TABLE_CANDIDATES: &[&str] = &["attendees", "Attendees"];

/// A row of the notes table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRow {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(rename = "note", default, deserialize_with = "de_text")]
    pub text: String,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A row of the attendee join table. `name` is cached at write time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendeeRow {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub note_id: String,
    #[serde(rename = "hubspot_id", default, deserialize_with = "de_opt_id")]
    pub person_id: String,
    #[serde(default, deserialize_with = "de_text")]
    pub name: String,
}

impl AttendeeRow {
    pub fn new(
        note_id: impl Into<String>,
        person_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            note_id: note_id.into(),
            person_id: person_id.into(),
            name: name.into(),
        }
    }
}

/// Attendee payload of the create-note remote procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttendee {
    #[serde(rename = "hubspot_id")]
    pub person_id: String,
    pub name: String,
}

impl NewAttendee {
    pub fn new(person_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            person_id: person_id.into(),
            name: name.into(),
        }
    }

    pub fn into_row(self, note_id: &str) -> AttendeeRow {
        AttendeeRow::new(note_id, self.person_id, self.name)
    }
}

/// Canonical table names, resolved once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub notes: String,
    pub attendees: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            notes: NOTES_TABLE_CANDIDATES[0].to_string(),
            attendees: ATTENDEES_TABLE_CANDIDATES[0].to_string(),
        }
    }
}

/// A configured table name, trimmed; blank means "probe instead".
pub fn configured_table(name: Option<&str>) -> Option<String> {
    name.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Operations the notes views and editors issue against storage.
///
/// Note lists come back ordered by `created_at` descending.
#[async_trait]
pub trait NotesBackend: Send + Sync {
    /// Distinct ids of notes linked to `person_id`.
    async fn note_ids_for_attendee(&self, person_id: &str) -> Result<Vec<String>>;

    /// Ids of every note with at least one attendee row.
    async fn tagged_note_ids(&self) -> Result<Vec<String>>;

    async fn notes_by_ids(&self, ids: &[String]) -> Result<Vec<NoteRow>>;

    async fn recent_notes(&self, limit: usize) -> Result<Vec<NoteRow>>;

    async fn attendees_for_notes(&self, note_ids: &[String]) -> Result<Vec<AttendeeRow>>;

    async fn attendees_for_note(&self, note_id: &str) -> Result<Vec<AttendeeRow>>;

    async fn all_attendees(&self) -> Result<Vec<AttendeeRow>>;

    async fn insert_attendees(&self, rows: &[AttendeeRow]) -> Result<()>;

    async fn delete_attendees_for_note(&self, note_id: &str) -> Result<()>;

    async fn update_note_text(&self, note_id: &str, text: &str) -> Result<()>;

    async fn update_note_created_at(&self, note_id: &str, created_at: DateTime<Utc>)
        -> Result<()>;

    async fn delete_note(&self, note_id: &str) -> Result<()>;

    /// Insert the note and its attendee rows in one transaction; returns the new id.
    async fn create_note_with_attendees(
        &self,
        text: &str,
        attendees: &[NewAttendee],
    ) -> Result<String>;
}

/// Parse the timestamp shapes the backend emits, with or without an offset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn value_to_id(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_id(value).ok_or_else(|| serde::de::Error::custom("expected string or number id"))
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_id(value).unwrap_or_default())
}

fn de_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

fn de_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_note_row_from_backend_json() {
        let row: NoteRow = serde_json::from_value(json!({
            "id": 17,
            "note": "# Hello",
            "created_at": "2025-03-04T12:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(row.id, "17");
        assert_eq!(row.text, "# Hello");
        assert_eq!(row.created_at.unwrap().day(), 4);
    }

    #[test]
    fn test_note_row_tolerates_null_and_bad_fields() {
        let row: NoteRow = serde_json::from_value(json!({
            "id": "a1",
            "note": null,
            "created_at": "yesterday"
        }))
        .unwrap();
        assert_eq!(row.text, "");
        assert!(row.created_at.is_none());
    }

    #[test]
    fn test_attendee_row_numeric_and_missing_ids() {
        let rows: Vec<AttendeeRow> = serde_json::from_value(json!([
            {"note_id": 3, "hubspot_id": 42, "name": "Jane"},
            {"note_id": "4", "hubspot_id": null, "name": null},
            {"hubspot_id": "7"}
        ]))
        .unwrap();
        assert_eq!(rows[0], AttendeeRow::new("3", "42", "Jane"));
        assert_eq!(rows[1], AttendeeRow::new("4", "", ""));
        assert_eq!(rows[2].note_id, "");
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let with_offset = parse_timestamp("2025-01-02T03:04:05.123+02:00").unwrap();
        assert_eq!(with_offset.hour(), 1);

        let naive = parse_timestamp("2025-01-02T03:04:05.123456").unwrap();
        assert_eq!(naive.hour(), 3);

        let spaced = parse_timestamp("2025-01-02 03:04:05.5+00").unwrap();
        assert_eq!(spaced.minute(), 4);

        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_configured_table() {
        assert_eq!(configured_table(Some(" Notes ")).as_deref(), Some("Notes"));
        assert!(configured_table(Some("   ")).is_none());
        assert!(configured_table(None).is_none());
    }

    #[test]
    fn test_new_attendee_wire_shape() {
        let value = serde_json::to_value(NewAttendee::new("42", "Jane")).unwrap();
        assert_eq!(value, json!({"hubspot_id": "42", "name": "Jane"}));
    }
}
