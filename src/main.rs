use clap::Parser;
use meetnotes::cli::{
    handle_config, handle_init, handle_login, handle_logout, handle_meetings_list,
    handle_meetings_summary, handle_meetings_transcript, handle_meetings_url, handle_notes_add,
    handle_notes_delete, handle_notes_edit, handle_notes_follow_up, handle_notes_list,
    handle_notes_set_date, handle_notes_show, handle_people_list, handle_people_search,
    handle_whoami, Cli, Commands, MeetingsAction, NotesAction, PeopleAction,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    // stdout is reserved for command output (and --json).
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("meetnotes=warn")),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => handle_init(),
        Commands::Config { json } => handle_config(json),
        Commands::Login {
            email,
            password_stdin,
        } => handle_login(email, password_stdin).await,
        Commands::Logout => handle_logout().await,
        Commands::Whoami { json } => handle_whoami(json).await,
        Commands::People(people) => match people.action {
            PeopleAction::List { known, json } => handle_people_list(known, json).await,
            PeopleAction::Search { query, limit, json } => {
                handle_people_search(query, limit, json).await
            }
        },
        Commands::Notes(notes) => match notes.action {
            NotesAction::List {
                view,
                attendee,
                json,
            } => handle_notes_list(view, attendee, json).await,
            NotesAction::Show { id, json } => handle_notes_show(id, json).await,
            NotesAction::Add {
                text,
                attendees,
                stdin,
                json,
            } => handle_notes_add(text, attendees, stdin, json).await,
            NotesAction::Edit {
                id,
                text,
                attendees,
                clear_attendees,
                stdin,
            } => handle_notes_edit(id, text, attendees, clear_attendees, stdin).await,
            NotesAction::Delete { id, force } => handle_notes_delete(id, force).await,
            NotesAction::SetDate { id, date } => handle_notes_set_date(id, date).await,
            NotesAction::FollowUp {
                id,
                text,
                stdin,
                json,
            } => handle_notes_follow_up(id, text, stdin, json).await,
        },
        Commands::Meetings(meetings) => match meetings.action {
            MeetingsAction::List {
                limit,
                search,
                json,
            } => handle_meetings_list(limit, search, json).await,
            MeetingsAction::Transcript { meeting_id, copy } => {
                handle_meetings_transcript(meeting_id, copy).await
            }
            MeetingsAction::Summary { meeting_id } => handle_meetings_summary(meeting_id).await,
            MeetingsAction::Url { meeting_id } => handle_meetings_url(meeting_id).await,
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
