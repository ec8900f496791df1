//! PostgREST client for the managed backend's `/rest/v1` surface.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

use super::{
    configured_table, AttendeeRow, NewAttendee, NoteRow, NotesBackend, TableNames,
    ATTENDEES_TABLE_CANDIDATES, NOTES_TABLE_CANDIDATES,
};
use crate::config::BackendConfig;
use crate::error::{AppError, Result};

const NOTE_COLUMNS: &str = "id,note,created_at";
const ATTENDEE_COLUMNS: &str = "note_id,hubspot_id,name";

pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    tables: TableNames,
    create_note_function: String,
}

impl RestBackend {
    /// Build a client and settle table names: from config, or by probing once.
    pub async fn connect(
        http: reqwest::Client,
        config: &BackendConfig,
        base_url: &str,
        anon_key: &str,
        access_token: Option<String>,
    ) -> Result<Self> {
        let mut backend = Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token,
            tables: TableNames::default(),
            create_note_function: config.create_note_function.clone(),
        };

        let notes = match configured_table(config.notes_table.as_deref()) {
            Some(name) => name,
            None => backend.probe_table(NOTES_TABLE_CANDIDATES).await?,
        };
        let attendees = match configured_table(config.attendees_table.as_deref()) {
            Some(name) => name,
            None => backend.probe_table(ATTENDEES_TABLE_CANDIDATES).await?,
        };
        backend.tables = TableNames { notes, attendees };
        tracing::debug!(
            notes = %backend.tables.notes,
            attendees = %backend.tables.attendees,
            "resolved table names"
        );

        Ok(backend)
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// First candidate that answers a one-row select.
    async fn probe_table(&self, candidates: &[&str]) -> Result<String> {
        let mut last_error = None;
        for candidate in candidates {
            let url = self.table_url(
                candidate,
                &[("select", "*".to_string()), ("limit", "1".to_string())],
            )?;
            match self.send(self.request(Method::GET, url)).await {
                Ok(_) => return Ok((*candidate).to_string()),
                Err(e) => {
                    tracing::debug!(table = %candidate, error = %e, "table probe failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AppError::Backend {
            status: 0,
            message: "no table candidates".to_string(),
        }))
    }

    fn table_url(&self, table: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.base_url, table))
            .map_err(|e| AppError::Backend {
                status: 0,
                message: format!("invalid backend url: {}", e),
            })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Backend {
            status: status.as_u16(),
            message: error_message(&body, status.canonical_reason().unwrap_or("request failed")),
        })
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = self.table_url(table, params)?;
        tracing::debug!(%url, "select");
        let response = self.send(self.request(Method::GET, url)).await?;
        Ok(response.json().await?)
    }

    async fn mutate(
        &self,
        method: Method,
        table: &str,
        params: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<()> {
        let url = self.table_url(table, params)?;
        tracing::debug!(%method, %url, "mutate");
        let mut request = self
            .request(method, url)
            .header("Prefer", "return=minimal");
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.send(request).await?;
        Ok(())
    }
}

/// Backend error bodies carry `message` (or `msg`); fall back to the raw text.
pub(crate) fn error_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("msg"))
                .or_else(|| v.get("error_description"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| fallback.to_string())
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// `in.("a","b")` with values quoted so commas and parentheses survive.
fn in_list(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

fn dedup_ids(rows: Vec<AttendeeRow>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .map(|r| r.note_id)
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

#[async_trait]
impl NotesBackend for RestBackend {
    async fn note_ids_for_attendee(&self, person_id: &str) -> Result<Vec<String>> {
        let rows: Vec<AttendeeRow> = self
            .select(
                &self.tables.attendees,
                &[("select", "note_id".to_string()), ("hubspot_id", eq(person_id))],
            )
            .await?;
        Ok(dedup_ids(rows))
    }

    async fn tagged_note_ids(&self) -> Result<Vec<String>> {
        let rows: Vec<AttendeeRow> = self
            .select(&self.tables.attendees, &[("select", "note_id".to_string())])
            .await?;
        Ok(dedup_ids(rows))
    }

    async fn notes_by_ids(&self, ids: &[String]) -> Result<Vec<NoteRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            &self.tables.notes,
            &[
                ("select", NOTE_COLUMNS.to_string()),
                ("id", in_list(ids)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn recent_notes(&self, limit: usize) -> Result<Vec<NoteRow>> {
        self.select(
            &self.tables.notes,
            &[
                ("select", NOTE_COLUMNS.to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn attendees_for_notes(&self, note_ids: &[String]) -> Result<Vec<AttendeeRow>> {
        if note_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            &self.tables.attendees,
            &[
                ("select", ATTENDEE_COLUMNS.to_string()),
                ("note_id", in_list(note_ids)),
            ],
        )
        .await
    }

    async fn attendees_for_note(&self, note_id: &str) -> Result<Vec<AttendeeRow>> {
        self.select(
            &self.tables.attendees,
            &[
                ("select", ATTENDEE_COLUMNS.to_string()),
                ("note_id", eq(note_id)),
            ],
        )
        .await
    }

    async fn all_attendees(&self) -> Result<Vec<AttendeeRow>> {
        self.select(
            &self.tables.attendees,
            &[("select", ATTENDEE_COLUMNS.to_string())],
        )
        .await
    }

    async fn insert_attendees(&self, rows: &[AttendeeRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.mutate(
            Method::POST,
            &self.tables.attendees,
            &[],
            Some(serde_json::to_value(rows)?),
        )
        .await
    }

    async fn delete_attendees_for_note(&self, note_id: &str) -> Result<()> {
        self.mutate(
            Method::DELETE,
            &self.tables.attendees,
            &[("note_id", eq(note_id))],
            None,
        )
        .await
    }

    async fn update_note_text(&self, note_id: &str, text: &str) -> Result<()> {
        self.mutate(
            Method::PATCH,
            &self.tables.notes,
            &[("id", eq(note_id))],
            Some(json!({ "note": text })),
        )
        .await
    }

    async fn update_note_created_at(&self, note_id: &str, created_at: DateTime<Utc>) -> Result<()> {
        self.mutate(
            Method::PATCH,
            &self.tables.notes,
            &[("id", eq(note_id))],
            Some(json!({ "created_at": created_at.to_rfc3339_opts(SecondsFormat::Millis, true) })),
        )
        .await
    }

    async fn delete_note(&self, note_id: &str) -> Result<()> {
        self.mutate(
            Method::DELETE,
            &self.tables.notes,
            &[("id", eq(note_id))],
            None,
        )
        .await
    }

    async fn create_note_with_attendees(
        &self,
        text: &str,
        attendees: &[NewAttendee],
    ) -> Result<String> {
        let url = Url::parse(&format!(
            "{}/rest/v1/rpc/{}",
            self.base_url, self.create_note_function
        ))
        .map_err(|e| AppError::Backend {
            status: 0,
            message: format!("invalid backend url: {}", e),
        })?;
        let body = json!({ "note_text": text, "attendees": attendees });
        let response = self
            .send(self.request(Method::POST, url).json(&body))
            .await?;
        let value: Value = response.json().await?;
        match value {
            Value::String(id) => Ok(id),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(AppError::Backend {
                status: 200,
                message: format!("unexpected create-note response: {}", other),
            }),
        }
    }
}
