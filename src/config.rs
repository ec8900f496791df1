//! Project configuration stored in `.meetnotes/config.yaml`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const PROJECT_DIR: &str = ".meetnotes";
pub const CONFIG_FILE: &str = "config.yaml";
pub const SESSION_FILE: &str = "session.json";

pub const ENV_BACKEND_URL: &str = "MEETNOTES_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "MEETNOTES_ANON_KEY";
pub const ENV_MEETINGS_TOKEN: &str = "MEETNOTES_MEETINGS_TOKEN";

pub const DEFAULT_CREATE_NOTE_FUNCTION: &str = "create_note_with_attendees";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub people: PeopleConfig,
    pub meetings: MeetingsConfig,
    pub crm: CrmConfig,
    pub http: HttpConfig,
}

/// Managed backend: auth + tables + remote procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub create_note_function: String,
    /// Explicit table names skip the startup probe.
    pub notes_table: Option<String>,
    pub attendees_table: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            create_note_function: DEFAULT_CREATE_NOTE_FUNCTION.to_string(),
            notes_table: None,
            attendees_table: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeopleConfig {
    /// Bundled contact list, relative paths resolve against the project root.
    pub static_path: Option<PathBuf>,
    pub remote_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingsConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub webhook_url: String,
    pub app_url: String,
}

impl Default for MeetingsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.meetgeek.ai/v1".to_string(),
            token: None,
            webhook_url: "https://api.tammer.com".to_string(),
            app_url: "https://app2.meetgeek.ai".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    pub contact_url_base: String,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            contact_url_base: "https://app-eu1.hubspot.com/contacts/143614254/record/0-1"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A located `.meetnotes/` directory and its parsed config.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
}

impl Project {
    /// Create `.meetnotes/config.yaml` under `root`.
    pub fn init(root: &Path) -> Result<Self> {
        let dir = root.join(PROJECT_DIR);
        if dir.exists() {
            return Err(AppError::AlreadyInitialized);
        }
        fs::create_dir_all(&dir)?;

        let config = Config::default();
        fs::write(dir.join(CONFIG_FILE), serde_yaml::to_string(&config)?)?;

        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    /// Open the project at `root`, applying environment overrides.
    pub fn open(root: &Path) -> Result<Self> {
        let dir = root.join(PROJECT_DIR);
        if !dir.is_dir() {
            return Err(AppError::NotInitialized);
        }

        let path = dir.join(CONFIG_FILE);
        let mut config: Config = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                Config::default()
            } else {
                serde_yaml::from_str(&raw)?
            }
        } else {
            Config::default()
        };
        config.apply_env(|key| env::var(key).ok());

        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    /// Walk up from the working directory looking for `.meetnotes/`.
    pub fn discover() -> Result<Self> {
        let cwd = env::current_dir()?;
        let root = find_project_root(&cwd).ok_or(AppError::NotInitialized)?;
        Self::open(&root)
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn session_path(&self) -> PathBuf {
        self.dir().join(SESSION_FILE)
    }

    pub fn static_people_path(&self) -> Option<PathBuf> {
        self.config.people.static_path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.root.join(p)
            }
        })
    }
}

fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(PROJECT_DIR).is_dir() {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}

impl Config {
    /// Overlay non-empty environment values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_BACKEND_URL) {
            self.backend.url = Some(url);
        }
        if let Some(key) = get(ENV_ANON_KEY) {
            self.backend.anon_key = Some(key);
        }
        if let Some(token) = get(ENV_MEETINGS_TOKEN) {
            self.meetings.token = Some(token);
        }
    }

    /// Backend URL and anon key, both required for auth and notes.
    pub fn backend_credentials(&self) -> Result<(&str, &str)> {
        let url = self
            .backend
            .url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(AppError::MissingConfig("backend.url (or MEETNOTES_BACKEND_URL)"))?;
        let key = self
            .backend
            .anon_key
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(AppError::MissingConfig("backend.anon_key (or MEETNOTES_ANON_KEY)"))?;
        Ok((url.trim_end_matches('/'), key))
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let mask = |v: &mut Option<String>| {
            if v.is_some() {
                *v = Some("***".to_string());
            }
        };
        mask(&mut copy.backend.anon_key);
        mask(&mut copy.meetings.token);
        copy
    }
}
