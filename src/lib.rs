pub mod auth;
pub mod backend;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod fetch;
pub mod meetings;
pub mod notes;
pub mod people;
pub mod shell;
pub mod warnings;

pub use backend::{MemoryBackend, NotesBackend, RestBackend};
pub use error::{AppError, Result};
pub use notes::{NotesPage, NotesService, NotesView};
