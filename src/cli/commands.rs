use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::notes::ViewMode;
use crate::people::DEFAULT_SEARCH_LIMIT;

#[derive(Parser, Debug)]
#[command(name = "meetnotes")]
#[command(version, about = "Meeting records, transcripts and CRM-tagged notes")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new meetnotes project in the current directory
    Init,

    /// Show the effective configuration (secrets masked)
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sign in with email and password
    Login {
        /// Account email
        #[arg(long, short = 'e')]
        email: String,

        /// Read the password from stdin instead of prompting
        #[arg(long)]
        password_stdin: bool,
    },

    /// Sign out and forget the saved session
    Logout,

    /// Show the signed-in account
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Browse CRM contacts
    People(PeopleCommand),

    /// Read and write notes
    Notes(NotesCommand),

    /// Meeting records, transcripts and summaries
    Meetings(MeetingsCommand),
}

#[derive(Args, Debug)]
pub struct PeopleCommand {
    #[command(subcommand)]
    pub action: PeopleAction,
}

#[derive(Subcommand, Debug)]
pub enum PeopleAction {
    /// List all known people
    List {
        /// Only people already tagged on some note (contact list and webhook are skipped)
        #[arg(long)]
        known: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search people by name or email
    Search {
        /// Text to match (case-insensitive)
        query: String,

        /// Maximum results
        #[arg(long, short = 'n', default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Notes list tab.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewArg {
    Recent,
    Untagged,
    ByAttendee,
}

impl From<ViewArg> for ViewMode {
    fn from(arg: ViewArg) -> Self {
        match arg {
            ViewArg::Recent => ViewMode::Recent,
            ViewArg::Untagged => ViewMode::Untagged,
            ViewArg::ByAttendee => ViewMode::ByAttendee,
        }
    }
}

#[derive(Args, Debug)]
pub struct NotesCommand {
    #[command(subcommand)]
    pub action: NotesAction,
}

#[derive(Subcommand, Debug)]
pub enum NotesAction {
    /// List notes
    List {
        /// Which notes to show
        #[arg(long, value_enum, default_value_t = ViewArg::ByAttendee)]
        view: ViewArg,

        /// Only notes tagged with this person id (ignored for untagged)
        #[arg(long, short = 'a')]
        attendee: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one note with its attendees
    Show {
        /// Note ID
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a new note
    Add {
        /// Note text (markdown)
        text: Option<String>,

        /// Person ids to tag (can be specified multiple times)
        #[arg(long = "attendee", short = 'a')]
        attendees: Vec<String>,

        /// Read the note text from stdin
        #[arg(long)]
        stdin: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace a note's text and attendees
    Edit {
        /// Note ID
        id: String,

        /// New note text (markdown)
        text: Option<String>,

        /// Person ids to tag; existing attendees are kept when none are given
        #[arg(long = "attendee", short = 'a')]
        attendees: Vec<String>,

        /// Remove every attendee
        #[arg(long, conflicts_with = "attendees")]
        clear_attendees: bool,

        /// Read the note text from stdin
        #[arg(long)]
        stdin: bool,
    },

    /// Delete a note and its attendee links
    Delete {
        /// Note ID
        id: String,

        /// Skip confirmation
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Move a note to another day
    SetDate {
        /// Note ID
        id: String,

        /// New date (YYYY-MM-DD)
        date: String,
    },

    /// Write a new note tagged with the same people as an existing one
    FollowUp {
        /// ID of the note to follow up on
        id: String,

        /// Note text (markdown)
        text: Option<String>,

        /// Read the note text from stdin
        #[arg(long)]
        stdin: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct MeetingsCommand {
    #[command(subcommand)]
    pub action: MeetingsAction,
}

#[derive(Subcommand, Debug)]
pub enum MeetingsAction {
    /// List recorded meetings
    List {
        /// Maximum meetings to request
        #[arg(long, short = 'n', default_value_t = crate::meetings::DEFAULT_MEETINGS_LIMIT)]
        limit: usize,

        /// Only meetings whose name contains this text
        #[arg(long, short = 's')]
        search: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a meeting transcript, or copy it to the clipboard
    Transcript {
        /// Meeting ID
        meeting_id: String,

        /// Copy to the clipboard instead of printing
        #[arg(long, short = 'c')]
        copy: bool,
    },

    /// Print the AI summary of a meeting
    Summary {
        /// Meeting ID
        meeting_id: String,
    },

    /// Print the meeting's page link
    Url {
        /// Meeting ID
        meeting_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_notes_list_defaults_to_by_attendee() {
        let cli = Cli::try_parse_from(["meetnotes", "notes", "list"]).unwrap();
        match cli.command {
            Commands::Notes(NotesCommand {
                action: NotesAction::List { view, attendee, json },
            }) => {
                assert_eq!(view, ViewArg::ByAttendee);
                assert!(attendee.is_none());
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_people_list_known_flag() {
        let cli = Cli::try_parse_from(["meetnotes", "people", "list", "--known"]).unwrap();
        match cli.command {
            Commands::People(PeopleCommand {
                action: PeopleAction::List { known, json },
            }) => {
                assert!(known);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_add_collects_attendees() {
        let cli = Cli::try_parse_from([
            "meetnotes", "notes", "add", "Follow up", "-a", "42", "--attendee", "7",
        ])
        .unwrap();
        match cli.command {
            Commands::Notes(NotesCommand {
                action: NotesAction::Add { text, attendees, .. },
            }) => {
                assert_eq!(text.as_deref(), Some("Follow up"));
                assert_eq!(attendees, vec!["42", "7"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_view_values() {
        let cli = Cli::try_parse_from(["meetnotes", "notes", "list", "--view", "untagged"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Notes(NotesCommand {
                action: NotesAction::List {
                    view: ViewArg::Untagged,
                    ..
                }
            })
        ));
        assert!(Cli::try_parse_from(["meetnotes", "notes", "list", "--view", "all"]).is_err());
        assert_eq!(ViewMode::from(ViewArg::ByAttendee), ViewMode::ByAttendee);
    }

    #[test]
    fn test_edit_clear_conflicts_with_attendees() {
        assert!(Cli::try_parse_from([
            "meetnotes", "notes", "edit", "1", "--clear-attendees", "-a", "42",
        ])
        .is_err());
    }
}
