//! Runs a view's query plan against the backend and attaches attendee chips.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::view::{NotesView, QueryPlan, ViewEvent};
use super::AttendeeChip;
use crate::backend::{AttendeeRow, NoteRow, NotesBackend};
use crate::error::{AppError, Result};
use crate::fetch::RequestSlot;
use crate::people::locale_cmp;

/// Notes for one view plus the attendee chips of each, keyed by note id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotesPage {
    pub notes: Vec<NoteRow>,
    pub attendees: HashMap<String, Vec<AttendeeChip>>,
}

impl NotesPage {
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn chips_for(&self, note_id: &str) -> &[AttendeeChip] {
        self.attendees.get(note_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn query_error(step: &str, e: AppError) -> AppError {
    AppError::NotesQuery(format!("{}: {}", step, e))
}

async fn fetch_notes(backend: &dyn NotesBackend, plan: &QueryPlan) -> Result<Vec<NoteRow>> {
    match plan {
        QueryPlan::Empty => Ok(Vec::new()),
        QueryPlan::ForAttendee(person_id) => {
            let ids = backend
                .note_ids_for_attendee(person_id)
                .await
                .map_err(|e| query_error("attendee links", e))?;
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            backend
                .notes_by_ids(&ids)
                .await
                .map_err(|e| query_error("notes for attendee", e))
        }
        QueryPlan::Untagged { limit } => {
            let tagged: HashSet<String> = backend
                .tagged_note_ids()
                .await
                .map_err(|e| query_error("tagged notes", e))?
                .into_iter()
                .collect();
            let recent = backend
                .recent_notes(*limit)
                .await
                .map_err(|e| query_error("recent notes", e))?;
            Ok(recent.into_iter().filter(|n| !tagged.contains(&n.id)).collect())
        }
        QueryPlan::Recent { limit } => backend
            .recent_notes(*limit)
            .await
            .map_err(|e| query_error("recent notes", e)),
    }
}

/// Group attendee rows into sorted, deduplicated chips per note.
pub fn group_attendees(rows: Vec<AttendeeRow>) -> HashMap<String, Vec<AttendeeChip>> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut grouped: HashMap<String, Vec<AttendeeChip>> = HashMap::new();
    for row in rows {
        if row.note_id.is_empty() || row.name.trim().is_empty() {
            continue;
        }
        let key = (row.note_id.clone(), row.person_id.clone(), row.name.clone());
        if !seen.insert(key) {
            continue;
        }
        grouped
            .entry(row.note_id)
            .or_default()
            .push(AttendeeChip::new(row.person_id, row.name));
    }
    for chips in grouped.values_mut() {
        chips.sort_by(|a, b| locale_cmp(&a.name, &b.name));
    }
    grouped
}

/// Run the view's query plan and attach attendee chips.
///
/// A failed chip lookup still returns the notes, just without chips.
pub async fn load_notes(backend: &dyn NotesBackend, view: &NotesView) -> Result<NotesPage> {
    let plan = view.plan();
    let notes = fetch_notes(backend, &plan).await?;
    if notes.is_empty() {
        return Ok(NotesPage::default());
    }

    let ids: Vec<String> = notes.iter().map(|n| n.id.clone()).collect();
    let attendees = match backend.attendees_for_notes(&ids).await {
        Ok(rows) => group_attendees(rows),
        Err(e) => {
            tracing::warn!(error = %e, "failed to load attendees for notes");
            HashMap::new()
        }
    };
    tracing::debug!(?plan, notes = notes.len(), "loaded notes page");

    Ok(NotesPage { notes, attendees })
}

/// A notes list: its view state, the last page shown, and the in-flight load.
#[derive(Debug, Default)]
pub struct NotesBrowser {
    view: NotesView,
    page: NotesPage,
    slot: RequestSlot,
}

impl NotesBrowser {
    pub fn new(view: NotesView) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }

    pub fn view(&self) -> &NotesView {
        &self.view
    }

    pub fn page(&self) -> &NotesPage {
        &self.page
    }

    /// Apply a tab or filter event, then reload.
    pub async fn dispatch(
        &mut self,
        backend: &dyn NotesBackend,
        event: &ViewEvent,
    ) -> Result<&NotesPage> {
        self.view.apply(event);
        self.refresh(backend).await
    }

    /// Reload the current view. A failure empties the page.
    pub async fn refresh(&mut self, backend: &dyn NotesBackend) -> Result<&NotesPage> {
        let ticket = self.slot.begin();
        match ticket.run(load_notes(backend, &self.view)).await {
            None => {}
            Some(Ok(page)) => self.page = page,
            Some(Err(e)) => {
                self.page = NotesPage::default();
                return Err(e);
            }
        }
        Ok(&self.page)
    }
}
