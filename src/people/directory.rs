//! The signed-in user's view of all known people: a bundled static list that
//! is loaded on first need, plus a remote list refreshed from a webhook.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{merge_people, normalize_people, PersonRecord};
use crate::error::{AppError, Result};
use crate::fetch::RequestSlot;

/// GET the remote people list. Anything but a JSON array normalizes to empty.
pub async fn fetch_remote_people(http: &reqwest::Client, url: &str) -> Result<Vec<PersonRecord>> {
    tracing::debug!(%url, "fetching remote people");
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::People(format!(
            "Failed to fetch people ({}).",
            status.as_u16()
        )));
    }
    let raw: Value = response.json().await?;
    Ok(normalize_people(&raw))
}

#[derive(Debug, Default)]
pub struct PeopleDirectory {
    enabled: bool,
    static_path: Option<PathBuf>,
    static_people: Option<Vec<PersonRecord>>,
    static_error: Option<String>,
    remote_people: Vec<PersonRecord>,
    remote_error: Option<String>,
    remote_slot: RequestSlot,
}

impl PeopleDirectory {
    pub fn new(static_path: Option<PathBuf>) -> Self {
        Self {
            static_path,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Follow the session: enabled while signed in. Disabling drops everything.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.remote_slot.cancel();
            self.static_people = None;
            self.static_error = None;
            self.remote_people.clear();
            self.remote_error = None;
        }
    }

    /// Load the static list unless it is already loaded with entries.
    ///
    /// Holding `&mut self` for the duration means a second load cannot start
    /// while one is running.
    pub async fn ensure_static_loaded(&mut self) {
        if !self.enabled {
            return;
        }
        if self.static_people.as_ref().is_some_and(|p| !p.is_empty()) {
            return;
        }

        let Some(path) = self.static_path.clone() else {
            self.static_people = Some(Vec::new());
            return;
        };

        match read_static_people(&path).await {
            Ok(people) => {
                tracing::debug!(count = people.len(), path = %path.display(), "loaded static people");
                self.static_people = Some(people);
                self.static_error = None;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load static people");
                self.static_people = Some(Vec::new());
                self.static_error = Some(e.to_string());
            }
        }
    }

    /// Refresh the remote list. A fetch superseded by a newer one changes nothing.
    pub async fn load_remote(&mut self, http: &reqwest::Client, url: &str) {
        if !self.enabled {
            return;
        }
        let ticket = self.remote_slot.begin();
        match ticket.run(fetch_remote_people(http, url)).await {
            None => {}
            Some(Ok(people)) => {
                self.remote_people = people;
                self.remote_error = None;
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "failed to fetch remote people");
                self.remote_people.clear();
                self.remote_error = Some(e.to_string());
            }
        }
    }

    #[cfg(test)]
    fn set_remote_people(&mut self, people: Vec<PersonRecord>) {
        self.remote_people = people;
        self.remote_error = None;
    }

    pub fn static_error(&self) -> Option<&str> {
        self.static_error.as_deref()
    }

    pub fn remote_error(&self) -> Option<&str> {
        self.remote_error.as_deref()
    }

    pub fn all_people(&self) -> Vec<PersonRecord> {
        merge_people(
            self.static_people.clone().unwrap_or_default(),
            self.remote_people.clone(),
        )
    }
}

async fn read_static_people(path: &Path) -> Result<Vec<PersonRecord>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let value: Value = serde_json::from_str(&raw)?;
    Ok(normalize_people(&value))
}
