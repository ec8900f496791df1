//! Page routing and the authentication gate.

use serde::Serialize;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Home,
    Login,
    Notes,
    Meetings,
}

impl Page {
    pub fn path(self) -> &'static str {
        match self {
            Page::Home => "/",
            Page::Login => "/login",
            Page::Notes => "/notes",
            Page::Meetings => "/meetgeek-manager",
        }
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Resolve a location path. Unknown paths land on the home page.
pub fn page_from_path(path: &str) -> Page {
    match path {
        "/login" => Page::Login,
        "/meetgeek-manager" => Page::Meetings,
        "/notes" => Page::Notes,
        p if p.starts_with("/notes/") => Page::Notes,
        _ => Page::Home,
    }
}

/// Page actually shown: signed-out users only see login, signed-in users
/// never do.
pub fn gate(page: Page, signed_in: bool) -> Page {
    match (page, signed_in) {
        (_, false) => Page::Login,
        (Page::Login, true) => Page::Home,
        (page, true) => page,
    }
}

/// Fail with `NotAuthenticated` when the gate would redirect to login.
pub fn require_session(page: Page, signed_in: bool) -> Result<()> {
    if page != Page::Login && gate(page, signed_in) == Page::Login {
        return Err(AppError::NotAuthenticated);
    }
    Ok(())
}

/// Back/forward history of visited pages.
#[derive(Debug, Clone)]
pub struct Navigator {
    entries: Vec<Page>,
    index: usize,
}

impl Navigator {
    pub fn new(initial_path: &str) -> Self {
        Self {
            entries: vec![page_from_path(initial_path)],
            index: 0,
        }
    }

    pub fn current(&self) -> Page {
        self.entries[self.index]
    }

    pub fn active_page(&self, signed_in: bool) -> Page {
        gate(self.current(), signed_in)
    }

    /// Push a page. Signed-out navigation anywhere but login goes to login.
    pub fn navigate(&mut self, page: Page, signed_in: bool) -> Page {
        let next = if !signed_in && page != Page::Login {
            Page::Login
        } else {
            page
        };
        self.entries.truncate(self.index + 1);
        self.entries.push(next);
        self.index = self.entries.len() - 1;
        next
    }

    pub fn back(&mut self) -> Option<Page> {
        self.index = self.index.checked_sub(1)?;
        Some(self.current())
    }

    pub fn forward(&mut self) -> Option<Page> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.current())
    }

    /// Rewrite the current entry after sign-in or sign-out, without pushing.
    pub fn on_session_change(&mut self, signed_in: bool) {
        let current = self.current();
        if !signed_in {
            self.entries[self.index] = Page::Login;
        } else if current == Page::Login {
            self.entries[self.index] = Page::Home;
        }
    }
}
