//! Notes tagged with CRM contacts.
//!
//! [`view`] holds the tab/filter state machine, [`loader`] turns a view into a
//! page of notes with attendee chips, and [`service`] owns the write paths.

pub mod loader;
pub mod service;
pub mod view;

pub use loader::{load_notes, NotesBrowser, NotesPage};
pub use service::NotesService;
pub use view::{FilterAction, NotesView, QueryPlan, ViewEvent, ViewMode};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Attendee label shown next to a note.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendeeChip {
    #[serde(rename = "hubspot_id")]
    pub person_id: String,
    pub name: String,
}

impl AttendeeChip {
    pub fn new(person_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            person_id: person_id.into(),
            name: name.into(),
        }
    }

    pub fn is_special(&self) -> bool {
        is_special_person_id(&self.person_id)
    }

    pub fn crm_link(&self, contact_url_base: &str) -> Option<String> {
        crm_contact_url(contact_url_base, &self.person_id)
    }
}

/// Single-digit ids are placeholders (team, internal) rather than CRM contacts.
pub fn is_special_person_id(id: &str) -> bool {
    let id = id.trim();
    id.len() == 1 && id.chars().all(|c| c.is_ascii_digit())
}

/// Contact record link, or `None` for blank and placeholder ids.
pub fn crm_contact_url(contact_url_base: &str, person_id: &str) -> Option<String> {
    let id = person_id.trim();
    if id.is_empty() || is_special_person_id(id) {
        return None;
    }
    Some(format!("{}/{}/", contact_url_base.trim_end_matches('/'), id))
}

/// Unsaved note text plus the ids of the people it will be tagged with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub text: String,
    pub attendee_ids: Vec<String>,
}

impl NoteDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attendee_ids: Vec::new(),
        }
    }

    pub fn with_attendees<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attendee_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Parse a `YYYY-MM-DD` date into noon UTC of that day.
pub fn parse_note_date(raw: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidDate(raw.to_string()))?;
    date.and_hms_opt(12, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AppError::InvalidDate(raw.to_string()))
}

/// Day part for a date picker prefill.
pub fn date_input_value(created_at: Option<DateTime<Utc>>) -> String {
    created_at
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

pub fn format_note_date(created_at: Option<DateTime<Utc>>) -> String {
    match created_at {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}
