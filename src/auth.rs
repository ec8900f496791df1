//! Password sign-in against the managed backend's auth endpoints.
//!
//! The active session lives in a `watch` channel so anything holding a
//! receiver sees sign-in and sign-out as they happen. It is also written to
//! `.meetnotes/session.json` so later invocations stay signed in.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;

use crate::backend::error_message;
use crate::error::{AppError, Result};

/// Refresh when fewer than this many seconds remain on the access token.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    pub fn email(&self) -> &str {
        self.user.email.as_deref().unwrap_or_default()
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at - EXPIRY_MARGIN_SECS <= now)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// The session file under the project directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Write the session, readable by the owner only.
    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
                }
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(session)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    store: SessionStore,
    session: watch::Sender<Option<Session>>,
}

impl AuthClient {
    /// Build the client, restoring any saved session. An unreadable session
    /// file counts as signed out.
    pub fn new(http: reqwest::Client, base_url: &str, anon_key: &str, store: SessionStore) -> Self {
        let restored = store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable session file");
            None
        });
        let (session, _) = watch::channel(restored);
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            store,
            session,
        }
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    /// Receiver that observes every later sign-in and sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Auth("Email and password are required.".to_string()));
        }

        let body = json!({ "email": email, "password": password });
        let session = self.token_grant("password", body).await?;
        tracing::info!(email = %email, "signed in");
        self.publish(Some(session.clone()))?;
        Ok(session)
    }

    /// Revoke the token server-side and forget the session locally. The local
    /// session is dropped even when the server call fails.
    pub async fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.current_session() {
            let request = self
                .request(Method::POST, "logout")
                .bearer_auth(&session.access_token);
            if let Err(e) = self.send(request).await {
                tracing::warn!(error = %e, "server-side sign out failed");
            }
        }
        self.publish(None)
    }

    pub async fn refresh(&self) -> Result<Session> {
        let current = self.current_session().ok_or(AppError::NotAuthenticated)?;
        let body = json!({ "refresh_token": current.refresh_token });
        let session = self.token_grant("refresh_token", body).await?;
        tracing::debug!("refreshed session");
        self.publish(Some(session.clone()))?;
        Ok(session)
    }

    /// The current session, refreshed first when its token is about to expire.
    /// Only a rejected refresh grant signs the user out; transport errors
    /// leave the saved session alone.
    pub async fn ensure_fresh(&self) -> Result<Session> {
        let session = self.current_session().ok_or(AppError::NotAuthenticated)?;
        if !session.is_expired_at(Utc::now().timestamp()) {
            return Ok(session);
        }
        match self.refresh().await {
            Ok(session) => Ok(session),
            Err(AppError::Auth(message)) => {
                tracing::warn!(error = %message, "refresh token rejected");
                self.publish(None)?;
                Err(AppError::NotAuthenticated)
            }
            Err(e) => {
                tracing::warn!(error = %e, "session refresh failed");
                Err(e)
            }
        }
    }

    fn publish(&self, session: Option<Session>) -> Result<()> {
        match &session {
            Some(s) => self.store.save(s)?,
            None => self.store.clear()?,
        }
        self.session.send_replace(session);
        Ok(())
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Session> {
        let request = self
            .request(Method::POST, &format!("token?grant_type={}", grant_type))
            .json(&body);
        let response = self.send(request).await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.into_session(Utc::now().timestamp()))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/auth/v1/{}", self.base_url, path);
        tracing::debug!(%method, %url, "auth request");
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Auth(error_message(
            &body,
            status.canonical_reason().unwrap_or("request failed"),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session(expires_at: Option<i64>) -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            user: User {
                id: "u1".to_string(),
                email: Some("jane@example.com".to_string()),
            },
        }
    }

    fn offline_client(tmp: &TempDir) -> AuthClient {
        // Nothing listens on the discard port.
        AuthClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/",
            "anon",
            SessionStore::new(tmp.path().join("session.json")),
        )
    }

    #[test]
    fn test_session_store_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path().join("nested/session.json"));
        assert!(store.load().unwrap().is_none());

        store.save(&session(Some(10))).unwrap();
        assert_eq!(store.load().unwrap(), Some(session(Some(10))));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path().join(".meetnotes/session.json"));
        store.save(&session(Some(10))).unwrap();

        let file_mode = fs::metadata(tmp.path().join(".meetnotes/session.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(file_mode & 0o077, 0);
        let dir_mode = fs::metadata(tmp.path().join(".meetnotes"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o077, 0);
    }

    #[test]
    fn test_token_response_expiry() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "r",
            "user": {"id": "u1", "email": "jane@example.com", "role": "authenticated"}
        }))
        .unwrap();
        let session = token.into_session(1_000);
        assert_eq!(session.expires_at, Some(4_600));
        assert_eq!(session.email(), "jane@example.com");
    }

    #[test]
    fn test_expiry_margin() {
        assert!(!session(None).is_expired_at(i64::MAX));
        assert!(!session(Some(1_000)).is_expired_at(900));
        assert!(session(Some(1_000)).is_expired_at(950));
    }

    #[tokio::test]
    async fn test_blank_credentials_rejected_before_any_call() {
        let tmp = TempDir::new().unwrap();
        let client = offline_client(&tmp);
        let err = client.sign_in_with_password("   ", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
        let err = client.sign_in_with_password("a@b.c", "").await.unwrap_err();
        assert_eq!(err.to_string(), "Login failed: Email and password are required.");
    }

    #[tokio::test]
    async fn test_restores_saved_session_and_signs_out() {
        let tmp = TempDir::new().unwrap();
        SessionStore::new(tmp.path().join("session.json"))
            .save(&session(None))
            .unwrap();

        let client = offline_client(&tmp);
        assert_eq!(client.current_session(), Some(session(None)));

        let mut rx = client.subscribe();
        client.sign_out().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
        assert!(client.current_session().is_none());
        assert!(!tmp.path().join("session.json").exists());
    }

    #[tokio::test]
    async fn test_ensure_fresh_without_session() {
        let tmp = TempDir::new().unwrap();
        let client = offline_client(&tmp);
        assert!(matches!(
            client.ensure_fresh().await,
            Err(AppError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_keeps_expired_session() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("session.json");
        SessionStore::new(&path).save(&session(Some(0))).unwrap();

        let client = offline_client(&tmp);
        let err = client.ensure_fresh().await.unwrap_err();
        assert!(matches!(err, AppError::Http(_)), "{}", err);
        assert_eq!(client.current_session(), Some(session(Some(0))));
        assert!(path.exists());
    }

    #[test]
    fn test_corrupt_session_file_counts_as_signed_out() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("session.json"), "{not json").unwrap();
        assert!(offline_client(&tmp).current_session().is_none());
    }
}
