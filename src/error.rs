use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not in a meetnotes project. Run 'meetnotes init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .meetnotes/ to reinitialize.")]
    AlreadyInitialized,

    #[error("Missing config: set {0}")]
    MissingConfig(&'static str),

    #[error("Not signed in. Run 'meetnotes login' first.")]
    NotAuthenticated,

    #[error("Login failed: {0}")]
    Auth(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Failed to load notes: {0}")]
    NotesQuery(String),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Please write a note before saving.")]
    EmptyNote,

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Meeting service error: {0}")]
    Meeting(String),

    #[error("Empty response from server")]
    EmptyResponse,

    #[error("Summary unavailable (the summarizer is probably rate limited, try again later)")]
    SummaryUnavailable,

    #[error("Failed to copy to clipboard. Please copy manually.")]
    Clipboard,

    #[error("{0}")]
    People(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
