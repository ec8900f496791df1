use std::env;
use std::io::{self, BufRead, Read, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::commands::ViewArg;
use super::context::AppContext;
use crate::backend::NoteRow;
use crate::clipboard::{copy_with_fallback, platform_tiers};
use crate::config::Project;
use crate::error::{AppError, Result};
use crate::meetings::filter_meetings;
use crate::notes::loader::group_attendees;
use crate::notes::service::follow_up_draft;
use crate::notes::{
    date_input_value, format_note_date, AttendeeChip, NoteDraft, NotesBrowser, NotesPage,
    NotesService, NotesView, ViewMode,
};
use crate::people::{search_people, PersonRecord};
use crate::shell::{require_session, Page};

fn read_text(text: Option<String>, stdin: bool) -> Result<String> {
    if stdin {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        return Ok(content);
    }
    Ok(text.unwrap_or_default())
}

fn read_password(from_stdin: bool) -> Result<String> {
    if !from_stdin {
        if !atty::is(atty::Stream::Stdin) {
            return Err(AppError::Auth(
                "Use --password-stdin in non-interactive mode".to_string(),
            ));
        }
        eprint!("Password: ");
        io::stderr().flush()?;
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

/// Ask on stderr; `--force` is required when stdin is not a terminal.
fn confirm(prompt: &str) -> Result<bool> {
    eprintln!("{} [y/N] ", prompt);
    if !atty::is(atty::Stream::Stdin) {
        return Err(AppError::Io(io::Error::other(
            "Use --force to delete in non-interactive mode",
        )));
    }
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

#[derive(Serialize)]
struct NoteJson<'a> {
    id: &'a str,
    text: &'a str,
    created_at: Option<DateTime<Utc>>,
    attendees: &'a [AttendeeChip],
}

fn note_json<'a>(note: &'a NoteRow, chips: &'a [AttendeeChip]) -> NoteJson<'a> {
    NoteJson {
        id: &note.id,
        text: &note.text,
        created_at: note.created_at,
        attendees: chips,
    }
}

fn print_note(note: &NoteRow, chips: &[AttendeeChip], highlight: Option<&str>) {
    println!("  {}  [{}]", format_note_date(note.created_at), note.id);
    for line in note.text.trim().lines() {
        println!("      {}", line);
    }
    if !chips.is_empty() {
        let names: Vec<String> = chips
            .iter()
            .map(|c| {
                if Some(c.person_id.as_str()) == highlight {
                    format!("*{}*", c.name)
                } else {
                    c.name.clone()
                }
            })
            .collect();
        println!("      attendees: {}", names.join(", "));
    }
}

fn print_people(people: &[&PersonRecord]) {
    for p in people {
        match &p.email {
            Some(email) => println!("  {:>12}  {} <{}>", p.id, p.name, email),
            None => println!("  {:>12}  {}", p.id, p.name),
        }
    }
}

pub fn handle_init() -> Result<()> {
    let root = env::current_dir()?;

    Project::init(&root)?;

    println!("Initialized meetnotes project in {}", root.display());
    println!("  Set backend.url and backend.anon_key in .meetnotes/config.yaml, then run 'meetnotes login'.");

    Ok(())
}

pub fn handle_config(json: bool) -> Result<()> {
    let project = Project::discover()?;
    let shown = project.config.redacted();

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else {
        println!("Project: {}\n", project.root.display());
        print!("{}", serde_yaml::to_string(&shown)?);
    }

    Ok(())
}

pub async fn handle_login(email: String, password_stdin: bool) -> Result<()> {
    let ctx = AppContext::load()?;
    let password = read_password(password_stdin)?;

    let session = ctx.auth.sign_in_with_password(&email, &password).await?;

    let shown = if session.email().is_empty() {
        email.trim()
    } else {
        session.email()
    };
    println!("Signed in as {}", shown);
    Ok(())
}

pub async fn handle_logout() -> Result<()> {
    let ctx = AppContext::load()?;
    require_session(Page::Home, ctx.auth.current_session().is_some())?;

    ctx.auth.sign_out().await?;

    println!("Signed out.");
    Ok(())
}

pub async fn handle_whoami(json: bool) -> Result<()> {
    let ctx = AppContext::load()?;
    let session = ctx.session_for(Page::Home).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session.user)?);
    } else {
        println!("{}", session.email());
    }
    Ok(())
}

pub async fn handle_people_list(known: bool, json: bool) -> Result<()> {
    let ctx = AppContext::load()?;
    let session = ctx.session_for(Page::Notes).await?;

    let people = if known {
        let backend = ctx.backend(&session).await?;
        NotesService::new(&backend).known_attendees().await?
    } else {
        ctx.people().await.all_people()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&people)?);
    } else if people.is_empty() {
        println!("No people found.");
    } else {
        println!("People:\n");
        print_people(&people.iter().collect::<Vec<_>>());
    }
    Ok(())
}

pub async fn handle_people_search(query: String, limit: usize, json: bool) -> Result<()> {
    let ctx = AppContext::load()?;
    ctx.session_for(Page::Notes).await?;

    let people = ctx.people().await.all_people();
    let matches = search_people(&people, &query, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
    } else if matches.is_empty() {
        println!("No people found for '{}'.", query);
    } else {
        println!("People matching '{}':\n", query);
        print_people(&matches);
    }
    Ok(())
}

pub async fn handle_notes_list(view: ViewArg, attendee: Option<String>, json: bool) -> Result<()> {
    let ctx = AppContext::load()?;
    let session = ctx.session_for(Page::Notes).await?;
    let backend = ctx.backend(&session).await?;

    let mut browser = NotesBrowser::new(NotesView::with(view.into(), attendee));
    browser.refresh(&backend).await?;
    let view = browser.view();
    let page = browser.page();

    if json {
        #[derive(Serialize)]
        struct NotesListJson<'a> {
            view: ViewMode,
            attendee: Option<&'a str>,
            notes: Vec<NoteJson<'a>>,
        }

        let out = NotesListJson {
            view: view.mode(),
            attendee: view.attendee(),
            notes: page
                .notes
                .iter()
                .map(|n| note_json(n, page.chips_for(&n.id)))
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if page.is_empty() {
        println!("{}", view.empty_message());
    } else {
        print_page(page, view);
    }

    Ok(())
}

fn print_page(page: &NotesPage, view: &NotesView) {
    let title = match view.mode() {
        ViewMode::Recent => "Recent notes",
        ViewMode::Untagged => "Untagged notes",
        ViewMode::ByAttendee => "Notes",
    };
    match view.attendee() {
        Some(id) if view.mode() != ViewMode::Untagged => println!("{} for {}:\n", title, id),
        _ => println!("{}:\n", title),
    }
    for note in &page.notes {
        print_note(note, page.chips_for(&note.id), view.highlighted_attendee());
        println!();
    }
}

pub async fn handle_notes_show(id: String, json: bool) -> Result<()> {
    let ctx = AppContext::load()?;
    let session = ctx.session_for(Page::Notes).await?;
    let backend = ctx.backend(&session).await?;
    let service = NotesService::new(&backend);

    let note = service.get(&id).await?;
    let chips = group_attendees(service.attendees_for(&id).await?)
        .remove(&note.id)
        .unwrap_or_default();

    if json {
        println!("{}", serde_json::to_string_pretty(&note_json(&note, &chips))?);
        return Ok(());
    }

    println!("Note {}  ({})\n", note.id, format_note_date(note.created_at));
    println!("{}\n", note.text.trim());
    if chips.is_empty() {
        println!("No attendees.");
    } else {
        println!("Attendees:");
        let base = &ctx.project.config.crm.contact_url_base;
        for chip in &chips {
            match chip.crm_link(base) {
                Some(link) => println!("  {} ({})  {}", chip.name, chip.person_id, link),
                None => println!("  {} ({})", chip.name, chip.person_id),
            }
        }
    }
    Ok(())
}

pub async fn handle_notes_add(
    text: Option<String>,
    attendees: Vec<String>,
    stdin: bool,
    json: bool,
) -> Result<()> {
    let draft = NoteDraft::new(read_text(text, stdin)?).with_attendees(attendees);
    if draft.is_blank() {
        return Err(AppError::EmptyNote);
    }

    let ctx = AppContext::load()?;
    let session = ctx.session_for(Page::Notes).await?;
    let backend = ctx.backend(&session).await?;
    let service = NotesService::new(&backend);

    let people = if draft.attendee_ids.is_empty() {
        Vec::new()
    } else {
        let known = service.known_attendees().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load known attendees");
            Vec::new()
        });
        ctx.people_with(known).await
    };

    let id = service.create(&draft, &people).await?;

    if json {
        println!("{}", serde_json::json!({ "id": id }));
    } else {
        println!("Created note {}", id);
    }
    Ok(())
}

pub async fn handle_notes_edit(
    id: String,
    text: Option<String>,
    attendees: Vec<String>,
    clear_attendees: bool,
    stdin: bool,
) -> Result<()> {
    let text = read_text(text, stdin)?;
    if text.trim().is_empty() {
        return Err(AppError::EmptyNote);
    }

    let ctx = AppContext::load()?;
    let session = ctx.session_for(Page::Notes).await?;
    let backend = ctx.backend(&session).await?;
    let service = NotesService::new(&backend);

    service.get(&id).await?;
    let (existing, cached) = follow_up_draft(&service.attendees_for(&id).await?);

    let (draft, people) = if clear_attendees {
        (NoteDraft::new(text), Vec::new())
    } else if attendees.is_empty() {
        (NoteDraft::new(text).with_attendees(existing.attendee_ids), cached)
    } else {
        (
            NoteDraft::new(text).with_attendees(attendees),
            ctx.people_with(cached).await,
        )
    };

    service.update(&id, &draft, &people).await?;

    println!("Updated note {} ({} attendees)", id, draft.attendee_ids.len());
    Ok(())
}

pub async fn handle_notes_delete(id: String, force: bool) -> Result<()> {
    let ctx = AppContext::load()?;
    let session = ctx.session_for(Page::Notes).await?;
    let backend = ctx.backend(&session).await?;
    let service = NotesService::new(&backend);

    let note = service.get(&id).await?;

    if !force {
        let prompt = format!(
            "Delete note {} ({}) - {}?",
            note.id,
            format_note_date(note.created_at),
            first_line(&note.text)
        );
        if !confirm(&prompt)? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    service.delete(&note.id).await?;

    println!("Deleted note {}", note.id);
    Ok(())
}

pub async fn handle_notes_set_date(id: String, date: String) -> Result<()> {
    let ctx = AppContext::load()?;
    let session = ctx.session_for(Page::Notes).await?;
    let backend = ctx.backend(&session).await?;
    let service = NotesService::new(&backend);

    service.get(&id).await?;
    let created_at = service.set_date(&id, &date).await?;

    println!("Moved note {} to {}", id, date_input_value(Some(created_at)));
    Ok(())
}

pub async fn handle_notes_follow_up(
    id: String,
    text: Option<String>,
    stdin: bool,
    json: bool,
) -> Result<()> {
    let text = read_text(text, stdin)?;
    if text.trim().is_empty() {
        return Err(AppError::EmptyNote);
    }

    let ctx = AppContext::load()?;
    let session = ctx.session_for(Page::Notes).await?;
    let backend = ctx.backend(&session).await?;
    let service = NotesService::new(&backend);

    service.get(&id).await?;
    let (mut draft, cached) = follow_up_draft(&service.attendees_for(&id).await?);
    draft.text = text;
    let people = ctx.people_with(cached).await;

    let new_id = service.create(&draft, &people).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "id": new_id, "follows": id, "attendees": draft.attendee_ids })
        );
    } else {
        println!(
            "Created follow-up note {} ({} attendees)",
            new_id,
            draft.attendee_ids.len()
        );
    }
    Ok(())
}

pub async fn handle_meetings_list(limit: usize, search: Option<String>, json: bool) -> Result<()> {
    let ctx = AppContext::load()?;
    ctx.session_for(Page::Meetings).await?;

    let Some(meetings) = ctx.meetings().list_meetings(limit).await? else {
        return Ok(());
    };
    let term = search.unwrap_or_default();
    let shown = filter_meetings(&meetings, &term);

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else if shown.is_empty() {
        println!("No meetings found.");
    } else {
        println!("Meetings:\n");
        for m in shown {
            println!("  {:<36}  {}", m.id.as_deref().unwrap_or("-"), m.name);
        }
    }
    Ok(())
}

pub async fn handle_meetings_transcript(meeting_id: String, copy: bool) -> Result<()> {
    let ctx = AppContext::load()?;
    ctx.session_for(Page::Meetings).await?;

    let transcript = ctx.meetings().transcript(&meeting_id).await?;

    if copy {
        let tiers = platform_tiers();
        copy_with_fallback(&tiers, &transcript).await?;
        println!("Transcript copied to clipboard ({} characters).", transcript.chars().count());
    } else {
        print!("{}", transcript);
        if !transcript.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

pub async fn handle_meetings_summary(meeting_id: String) -> Result<()> {
    let ctx = AppContext::load()?;
    ctx.session_for(Page::Meetings).await?;

    let client = ctx.meetings();
    let summary = client.summary(&meeting_id).await?;

    println!("{}", summary.trim_end());
    println!("\nMeeting: {}", client.meeting_url(&meeting_id));
    Ok(())
}

pub async fn handle_meetings_url(meeting_id: String) -> Result<()> {
    let ctx = AppContext::load()?;
    ctx.session_for(Page::Meetings).await?;

    println!("{}", ctx.meetings().meeting_url(&meeting_id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line_skips_blank_lines() {
        assert_eq!(first_line("\n\n  # Title  \nbody"), "# Title");
        assert_eq!(first_line(""), "");
    }

    #[test]
    fn test_read_text_from_argument() {
        assert_eq!(read_text(Some("hi".to_string()), false).unwrap(), "hi");
        assert_eq!(read_text(None, false).unwrap(), "");
    }

    #[test]
    fn test_note_json_shape() {
        let note = NoteRow {
            id: "n1".to_string(),
            text: "Follow up".to_string(),
            created_at: None,
        };
        let chips = vec![AttendeeChip::new("42", "Jane")];
        let value = serde_json::to_value(note_json(&note, &chips)).unwrap();
        assert_eq!(value["id"], "n1");
        assert_eq!(value["attendees"][0]["hubspot_id"], "42");
        assert!(value["created_at"].is_null());
    }
}
