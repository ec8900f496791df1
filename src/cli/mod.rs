mod commands;
mod context;
mod handlers;

pub use commands::{
    Cli, Commands, MeetingsAction, MeetingsCommand, NotesAction, NotesCommand, PeopleAction,
    PeopleCommand, ViewArg,
};
pub use context::AppContext;
pub use handlers::{
    handle_config, handle_init, handle_login, handle_logout, handle_meetings_list,
    handle_meetings_summary, handle_meetings_transcript, handle_meetings_url, handle_notes_add,
    handle_notes_delete, handle_notes_edit, handle_notes_follow_up, handle_notes_list,
    handle_notes_set_date, handle_notes_show, handle_people_list, handle_people_search,
    handle_whoami,
};
