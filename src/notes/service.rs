//! Note writes: create, edit, delete and re-date, plus attendee lookups.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::{parse_note_date, NoteDraft};
use crate::backend::{AttendeeRow, NewAttendee, NoteRow, NotesBackend};
use crate::error::{AppError, Result};
use crate::people::PersonRecord;

/// Write paths for notes: create, edit, delete, re-date.
pub struct NotesService<'a> {
    backend: &'a dyn NotesBackend,
}

impl<'a> NotesService<'a> {
    pub fn new(backend: &'a dyn NotesBackend) -> Self {
        Self { backend }
    }

    pub async fn get(&self, note_id: &str) -> Result<NoteRow> {
        self.backend
            .notes_by_ids(&[note_id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NoteNotFound(note_id.to_string()))
    }

    /// Create the note and its attendee rows in one call. Returns the new id.
    pub async fn create(&self, draft: &NoteDraft, people: &[PersonRecord]) -> Result<String> {
        let text = draft.text.trim();
        if text.is_empty() {
            return Err(AppError::EmptyNote);
        }
        let attendees = resolve_attendees(&draft.attendee_ids, people);
        let id = self
            .backend
            .create_note_with_attendees(text, &attendees)
            .await?;
        tracing::info!(note_id = %id, attendees = attendees.len(), "created note");
        Ok(id)
    }

    /// Replace the text, then replace the attendee set.
    ///
    /// Not atomic: a failure after the text update leaves the new text with
    /// whatever attendee rows remain.
    pub async fn update(
        &self,
        note_id: &str,
        draft: &NoteDraft,
        people: &[PersonRecord],
    ) -> Result<()> {
        let text = draft.text.trim();
        if text.is_empty() {
            return Err(AppError::EmptyNote);
        }
        self.backend.update_note_text(note_id, text).await?;
        self.backend.delete_attendees_for_note(note_id).await?;

        let rows: Vec<AttendeeRow> = resolve_attendees(&draft.attendee_ids, people)
            .into_iter()
            .map(|a| a.into_row(note_id))
            .collect();
        if !rows.is_empty() {
            self.backend.insert_attendees(&rows).await?;
        }
        tracing::info!(%note_id, attendees = rows.len(), "updated note");
        Ok(())
    }

    /// Remove attendee rows, then the note. Only the note removal can fail.
    pub async fn delete(&self, note_id: &str) -> Result<()> {
        if let Err(e) = self.backend.delete_attendees_for_note(note_id).await {
            tracing::warn!(%note_id, error = %e, "failed to delete attendee rows");
        }
        self.backend.delete_note(note_id).await?;
        tracing::info!(%note_id, "deleted note");
        Ok(())
    }

    /// Move the note to noon UTC of `date` (`YYYY-MM-DD`).
    pub async fn set_date(&self, note_id: &str, date: &str) -> Result<DateTime<Utc>> {
        let created_at = parse_note_date(date)?;
        self.backend
            .update_note_created_at(note_id, created_at)
            .await?;
        tracing::info!(%note_id, %created_at, "re-dated note");
        Ok(created_at)
    }

    pub async fn attendees_for(&self, note_id: &str) -> Result<Vec<AttendeeRow>> {
        self.backend.attendees_for_note(note_id).await
    }

    /// People already tagged on some note, for the attendee filter.
    pub async fn known_attendees(&self) -> Result<Vec<PersonRecord>> {
        let rows = self.backend.all_attendees().await?;
        Ok(crate::people::people_from_attendee_rows(&rows))
    }
}

/// Distinct, non-blank ids paired with a display name; unknown ids name themselves.
pub fn resolve_attendees(ids: &[String], people: &[PersonRecord]) -> Vec<NewAttendee> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(|id| {
            let name = people
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.name.as_str())
                .unwrap_or(id);
            NewAttendee::new(id, name)
        })
        .collect()
}

/// An empty draft preselecting a note's attendees, plus the cached names of
/// those attendees for ids the people list may not know.
pub fn follow_up_draft(rows: &[AttendeeRow]) -> (NoteDraft, Vec<PersonRecord>) {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    let mut fallback = Vec::new();
    for row in rows {
        let id = row.person_id.trim();
        if id.is_empty() || !seen.insert(id) {
            continue;
        }
        ids.push(id.to_string());
        let name = row.name.trim();
        fallback.push(PersonRecord::new(id, if name.is_empty() { id } else { name }));
    }
    (NoteDraft::default().with_attendees(ids), fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn test_create_rejects_blank_text() {
        let backend = MemoryBackend::new();
        let service = NotesService::new(&backend);
        let err = service.create(&NoteDraft::new("   "), &[]).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyNote));
        assert_eq!(err.to_string(), "Please write a note before saving.");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_resolves_names() {
        let backend = MemoryBackend::new();
        let service = NotesService::new(&backend);
        let people = vec![PersonRecord::new("42", "Jane")];
        let draft = NoteDraft::new("  Follow up  ").with_attendees(["42", "99", "42", " "]);

        let id = service.create(&draft, &people).await.unwrap();
        assert_eq!(backend.note(&id).unwrap().text, "Follow up");
        let rows = backend.attendee_rows(&id);
        assert_eq!(
            rows,
            vec![AttendeeRow::new(&id, "42", "Jane"), AttendeeRow::new(&id, "99", "99")]
        );
    }

    #[tokio::test]
    async fn test_update_replaces_attendees() {
        let backend = MemoryBackend::new();
        let service = NotesService::new(&backend);
        let people = vec![PersonRecord::new("1", "Ann"), PersonRecord::new("2", "Bob")];
        let id = service
            .create(&NoteDraft::new("a").with_attendees(["1"]), &people)
            .await
            .unwrap();

        service
            .update(&id, &NoteDraft::new("b").with_attendees(["2"]), &people)
            .await
            .unwrap();
        assert_eq!(backend.note(&id).unwrap().text, "b");
        assert_eq!(backend.attendee_rows(&id), vec![AttendeeRow::new(&id, "2", "Bob")]);

        backend.reset_call_count();
        service.update(&id, &NoteDraft::new("c"), &people).await.unwrap();
        assert!(backend.attendee_rows(&id).is_empty());
        // Text update and attendee delete; nothing to insert.
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_survives_attendee_cleanup_failure() {
        let backend = MemoryBackend::new();
        let service = NotesService::new(&backend);
        let id = service
            .create(&NoteDraft::new("a").with_attendees(["1"]), &[])
            .await
            .unwrap();
        backend.fail("delete_attendees_for_note");

        service.delete(&id).await.unwrap();
        assert!(backend.note(&id).is_none());
    }

    #[tokio::test]
    async fn test_delete_note_failure_is_an_error() {
        let backend = MemoryBackend::new();
        let service = NotesService::new(&backend);
        let id = service.create(&NoteDraft::new("a"), &[]).await.unwrap();
        backend.fail("delete_note");
        assert!(service.delete(&id).await.is_err());
        assert!(backend.note(&id).is_some());
    }

    #[tokio::test]
    async fn test_set_date_and_get() {
        let backend = MemoryBackend::new();
        let service = NotesService::new(&backend);
        let id = service.create(&NoteDraft::new("a"), &[]).await.unwrap();

        let when = service.set_date(&id, "2024-06-01").await.unwrap();
        assert_eq!(service.get(&id).await.unwrap().created_at, Some(when));
        assert!(matches!(
            service.set_date(&id, "June 1st").await,
            Err(AppError::InvalidDate(_))
        ));
        assert!(matches!(
            service.get("missing").await,
            Err(AppError::NoteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_known_attendees() {
        let backend = MemoryBackend::new();
        backend.insert_attendee(AttendeeRow::new("n1", "2", "Zoe"));
        backend.insert_attendee(AttendeeRow::new("n2", "1", "Ann"));
        backend.insert_attendee(AttendeeRow::new("n3", "1", "Ann Renamed"));
        let people = NotesService::new(&backend).known_attendees().await.unwrap();
        let names: Vec<&str> = people.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Zoe"]);
        assert!(people.iter().all(|p| p.email.is_none()));
    }

    #[test]
    fn test_follow_up_draft() {
        let rows = vec![
            AttendeeRow::new("n", "42", "Jane"),
            AttendeeRow::new("n", "42", "Jane"),
            AttendeeRow::new("n", "", "Nobody"),
            AttendeeRow::new("n", "7", ""),
        ];
        let (draft, fallback) = follow_up_draft(&rows);
        assert!(draft.is_blank());
        assert_eq!(draft.attendee_ids, vec!["42", "7"]);
        assert_eq!(fallback[0], PersonRecord::new("42", "Jane"));
        assert_eq!(fallback[1], PersonRecord::new("7", "7"));
    }
}
