//! In-process backend holding rows in memory.
//!
//! Mirrors the managed backend closely enough to drive the views and editors
//! without a network: no cascading deletes, `created_at` ordering, and a
//! call counter so callers can assert how many queries a view issued.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{AttendeeRow, NewAttendee, NoteRow, NotesBackend};
use crate::error::{AppError, Result};

#[derive(Debug, Default)]
struct Tables {
    notes: Vec<NoteRow>,
    attendees: Vec<AttendeeRow>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
    calls: AtomicUsize,
    failing: Mutex<HashSet<&'static str>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a note directly, bypassing the call counter.
    pub fn insert_note(&self, text: &str, created_at: DateTime<Utc>) -> String {
        let id = Uuid::new_v4().to_string();
        self.lock().notes.push(NoteRow {
            id: id.clone(),
            text: text.to_string(),
            created_at: Some(created_at),
        });
        id
    }

    /// Seed an attendee row directly, bypassing the call counter.
    pub fn insert_attendee(&self, row: AttendeeRow) {
        self.lock().attendees.push(row);
    }

    /// Make every later call to `operation` fail with a backend error.
    pub fn fail(&self, operation: &'static str) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_call_count(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    pub fn note(&self, id: &str) -> Option<NoteRow> {
        self.lock().notes.iter().find(|n| n.id == id).cloned()
    }

    pub fn attendee_rows(&self, note_id: &str) -> Vec<AttendeeRow> {
        self.lock()
            .attendees
            .iter()
            .filter(|a| a.note_id == note_id)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and apply any injected failure.
    fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, Tables>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(operation);
        if failing {
            return Err(AppError::Backend {
                status: 500,
                message: format!("{} failed", operation),
            });
        }
        Ok(self.lock())
    }
}

fn newest_first(mut notes: Vec<NoteRow>) -> Vec<NoteRow> {
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notes
}

fn distinct_note_ids<'a>(rows: impl Iterator<Item = &'a AttendeeRow>) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.filter(|r| !r.note_id.is_empty() && seen.insert(r.note_id.clone()))
        .map(|r| r.note_id.clone())
        .collect()
}

#[async_trait]
impl NotesBackend for MemoryBackend {
    async fn note_ids_for_attendee(&self, person_id: &str) -> Result<Vec<String>> {
        let tables = self.enter("note_ids_for_attendee")?;
        Ok(distinct_note_ids(
            tables.attendees.iter().filter(|a| a.person_id == person_id),
        ))
    }

    async fn tagged_note_ids(&self) -> Result<Vec<String>> {
        let tables = self.enter("tagged_note_ids")?;
        Ok(distinct_note_ids(tables.attendees.iter()))
    }

    async fn notes_by_ids(&self, ids: &[String]) -> Result<Vec<NoteRow>> {
        let tables = self.enter("notes_by_ids")?;
        let wanted: HashSet<&String> = ids.iter().collect();
        Ok(newest_first(
            tables
                .notes
                .iter()
                .filter(|n| wanted.contains(&n.id))
                .cloned()
                .collect(),
        ))
    }

    async fn recent_notes(&self, limit: usize) -> Result<Vec<NoteRow>> {
        let tables = self.enter("recent_notes")?;
        let mut notes = newest_first(tables.notes.clone());
        notes.truncate(limit);
        Ok(notes)
    }

    async fn attendees_for_notes(&self, note_ids: &[String]) -> Result<Vec<AttendeeRow>> {
        let tables = self.enter("attendees_for_notes")?;
        let wanted: HashSet<&String> = note_ids.iter().collect();
        Ok(tables
            .attendees
            .iter()
            .filter(|a| wanted.contains(&a.note_id))
            .cloned()
            .collect())
    }

    async fn attendees_for_note(&self, note_id: &str) -> Result<Vec<AttendeeRow>> {
        let tables = self.enter("attendees_for_note")?;
        Ok(tables
            .attendees
            .iter()
            .filter(|a| a.note_id == note_id)
            .cloned()
            .collect())
    }

    async fn all_attendees(&self) -> Result<Vec<AttendeeRow>> {
        let tables = self.enter("all_attendees")?;
        Ok(tables.attendees.clone())
    }

    async fn insert_attendees(&self, rows: &[AttendeeRow]) -> Result<()> {
        let mut tables = self.enter("insert_attendees")?;
        tables.attendees.extend_from_slice(rows);
        Ok(())
    }

    async fn delete_attendees_for_note(&self, note_id: &str) -> Result<()> {
        let mut tables = self.enter("delete_attendees_for_note")?;
        tables.attendees.retain(|a| a.note_id != note_id);
        Ok(())
    }

    async fn update_note_text(&self, note_id: &str, text: &str) -> Result<()> {
        let mut tables = self.enter("update_note_text")?;
        if let Some(note) = tables.notes.iter_mut().find(|n| n.id == note_id) {
            note.text = text.to_string();
        }
        Ok(())
    }

    async fn update_note_created_at(
        &self,
        note_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.enter("update_note_created_at")?;
        if let Some(note) = tables.notes.iter_mut().find(|n| n.id == note_id) {
            note.created_at = Some(created_at);
        }
        Ok(())
    }

    async fn delete_note(&self, note_id: &str) -> Result<()> {
        let mut tables = self.enter("delete_note")?;
        tables.notes.retain(|n| n.id != note_id);
        Ok(())
    }

    async fn create_note_with_attendees(
        &self,
        text: &str,
        attendees: &[NewAttendee],
    ) -> Result<String> {
        let mut tables = self.enter("create_note_with_attendees")?;
        let id = Uuid::new_v4().to_string();
        tables.notes.push(NoteRow {
            id: id.clone(),
            text: text.to_string(),
            created_at: Some(Utc::now()),
        });
        tables
            .attendees
            .extend(attendees.iter().cloned().map(|a| a.into_row(&id)));
        Ok(id)
    }
}
