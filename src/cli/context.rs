use crate::auth::{AuthClient, Session, SessionStore};
use crate::backend::RestBackend;
use crate::config::Project;
use crate::error::Result;
use crate::meetings::MeetingClient;
use crate::people::{merge_people, PeopleDirectory, PersonRecord};
use crate::shell::{require_session, Page};
use crate::warnings::{check_people, format_warning};

/// Everything a command needs, built once per invocation and passed down.
pub struct AppContext {
    pub project: Project,
    pub http: reqwest::Client,
    pub auth: AuthClient,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let project = Project::discover()?;
        let http = reqwest::Client::builder()
            .timeout(project.config.http.timeout())
            .build()?;
        let (url, anon_key) = project.config.backend_credentials()?;
        let auth = AuthClient::new(
            http.clone(),
            url,
            anon_key,
            SessionStore::new(project.session_path()),
        );
        Ok(Self {
            project,
            http,
            auth,
        })
    }

    /// Pass the authentication gate for `page`, refreshing the token if needed.
    pub async fn session_for(&self, page: Page) -> Result<Session> {
        require_session(page, self.auth.current_session().is_some())?;
        self.auth.ensure_fresh().await
    }

    pub async fn backend(&self, session: &Session) -> Result<RestBackend> {
        let (url, anon_key) = self.project.config.backend_credentials()?;
        RestBackend::connect(
            self.http.clone(),
            &self.project.config.backend,
            url,
            anon_key,
            Some(session.access_token.clone()),
        )
        .await
    }

    pub fn meetings(&self) -> MeetingClient {
        MeetingClient::new(self.http.clone(), self.project.config.meetings.clone())
    }

    /// Static and remote people, with problems reported on stderr.
    pub async fn people(&self) -> PeopleDirectory {
        let mut directory = PeopleDirectory::new(self.project.static_people_path());
        directory.set_enabled(self.auth.current_session().is_some());
        directory.ensure_static_loaded().await;
        if let Some(url) = self
            .project
            .config
            .people
            .remote_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
        {
            directory.load_remote(&self.http, url).await;
        }
        for warning in check_people(&self.project.config, &directory) {
            eprintln!("{}", format_warning(&warning));
        }
        directory
    }

    /// People for resolving attendee names: the directory wins, `known` fills gaps.
    pub async fn people_with(&self, known: Vec<PersonRecord>) -> Vec<PersonRecord> {
        merge_people(known, self.people().await.all_people())
    }
}
