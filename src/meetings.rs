//! Client for the meeting-recording service and the transcript/summary webhooks.
//!
//! Meeting payloads come from more than one upstream, so the id and display
//! name are looked up through alias lists rather than a fixed schema.

use reqwest::RequestBuilder;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::MeetingsConfig;
use crate::error::{AppError, Result};
use crate::fetch::RequestSlot;

/// Field names that may carry a meeting's id, in lookup order.
pub const MEETING_ID_ALIASES: &[&str] =
    &["id", "meetingId", "_id", "meeting_id", "ID", "MeetingID"];

/// Field names that may carry a meeting's title, in lookup order.
pub const MEETING_NAME_ALIASES: &[&str] = &["name", "title", "meetingName", "subject"];

pub const TRANSCRIPT_PREFIX: &str = "Transcript:\n";

pub const DEFAULT_MEETINGS_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meeting {
    pub id: Option<String>,
    pub name: String,
    #[serde(skip)]
    pub raw: Value,
}

/// A usable scalar: non-empty strings and non-zero numbers.
fn present(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn first_alias(item: &Value, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|alias| item.get(*alias).and_then(present))
}

pub fn meeting_id(item: &Value) -> Option<String> {
    first_alias(item, MEETING_ID_ALIASES)
}

/// Title from the alias list, else `Meeting <n>` with `n` counted from 1.
pub fn meeting_display_name(item: &Value, index: usize) -> String {
    first_alias(item, MEETING_NAME_ALIASES).unwrap_or_else(|| format!("Meeting {}", index + 1))
}

/// The meeting array out of a bare array, `{meetings: [...]}` or `{data: [...]}`.
pub fn extract_meeting_list(data: Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        Value::Object(mut obj) => ["meetings", "data"]
            .iter()
            .find_map(|key| match obj.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

pub fn to_meetings(items: Vec<Value>) -> Vec<Meeting> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, raw)| Meeting {
            id: meeting_id(&raw),
            name: meeting_display_name(&raw, index),
            raw,
        })
        .collect()
}

/// Case-insensitive substring match on the display name; blank matches all.
pub fn filter_meetings<'a>(meetings: &'a [Meeting], term: &str) -> Vec<&'a Meeting> {
    let term = term.trim().to_lowercase();
    meetings
        .iter()
        .filter(|m| term.is_empty() || m.name.to_lowercase().contains(&term))
        .collect()
}

pub fn meeting_url(app_url: &str, meeting_id: &str) -> String {
    format!("{}/meeting/{}", app_url.trim_end_matches('/'), meeting_id)
}

fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path);
    let mut url =
        Url::parse(&raw).map_err(|e| AppError::Meeting(format!("invalid url {}: {}", raw, e)))?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

pub struct MeetingClient {
    http: reqwest::Client,
    config: MeetingsConfig,
    list_slot: RequestSlot,
}

impl MeetingClient {
    pub fn new(http: reqwest::Client, config: MeetingsConfig) -> Self {
        Self {
            http,
            config,
            list_slot: RequestSlot::new(),
        }
    }

    /// Recent meetings. With an API token the service is asked directly,
    /// otherwise the webhook's full listing is used.
    ///
    /// `Ok(None)` means a newer listing superseded this one.
    pub async fn list_meetings(&self, limit: usize) -> Result<Option<Vec<Meeting>>> {
        let request = match self.config.token.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                let limit = limit.to_string();
                let url = endpoint(&self.config.api_url, "meetings", &[("limit", limit.as_str())])?;
                self.http.get(url).bearer_auth(token)
            }
            None => self
                .http
                .get(endpoint(&self.config.webhook_url, "get_all_meetings", &[])?),
        };

        let ticket = self.list_slot.begin();
        let Some(result) = ticket.run(self.fetch_json(request)).await else {
            tracing::debug!("meeting listing superseded");
            return Ok(None);
        };
        let meetings = to_meetings(extract_meeting_list(result?));
        tracing::debug!(count = meetings.len(), "loaded meetings");
        Ok(Some(meetings))
    }

    /// Transcript text, prefixed for pasting into a chat assistant.
    pub async fn transcript(&self, meeting_id: &str) -> Result<String> {
        let url = endpoint(
            &self.config.webhook_url,
            "get_transcript",
            &[("meeting_id", meeting_id)],
        )?;
        let text = self.send(self.http.get(url)).await?.text().await?;
        if text.trim().is_empty() {
            return Err(AppError::EmptyResponse);
        }
        Ok(format!("{}{}", TRANSCRIPT_PREFIX, text))
    }

    /// Markdown summary. An empty summary usually means the summarizer is
    /// rate limited.
    pub async fn summary(&self, meeting_id: &str) -> Result<String> {
        let url = endpoint(
            &self.config.webhook_url,
            "summary_from_id",
            &[("meeting_id", meeting_id)],
        )?;
        let data = self.fetch_json(self.http.get(url)).await?;
        match data.get("summary").and_then(Value::as_str) {
            Some(summary) if !summary.is_empty() => Ok(summary.to_string()),
            _ => Err(AppError::SummaryUnavailable),
        }
    }

    pub fn meeting_url(&self, meeting_id: &str) -> String {
        meeting_url(&self.config.app_url, meeting_id)
    }

    async fn fetch_json(&self, request: RequestBuilder) -> Result<Value> {
        Ok(self.send(request).await?.json().await?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, url = %response.url(), "meeting service error");
            return Err(AppError::Meeting(format!("status {}", status.as_u16())));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_meeting_id_aliases() {
        assert_eq!(meeting_id(&json!({"id": "a"})).as_deref(), Some("a"));
        assert_eq!(meeting_id(&json!({"meetingId": 12})).as_deref(), Some("12"));
        assert_eq!(meeting_id(&json!({"_id": "m"})).as_deref(), Some("m"));
        assert_eq!(meeting_id(&json!({"meeting_id": "x"})).as_deref(), Some("x"));
        assert_eq!(meeting_id(&json!({"ID": "y"})).as_deref(), Some("y"));
        assert_eq!(meeting_id(&json!({"MeetingID": "z"})).as_deref(), Some("z"));
        assert!(meeting_id(&json!({"title": "no id"})).is_none());
    }

    #[test]
    fn test_meeting_id_skips_empty_values() {
        let item = json!({"id": "", "meetingId": 0, "_id": null, "meeting_id": "real"});
        assert_eq!(meeting_id(&item).as_deref(), Some("real"));
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(meeting_display_name(&json!({"subject": "Sync"}), 0), "Sync");
        assert_eq!(meeting_display_name(&json!({"name": "", "title": "T"}), 0), "T");
        assert_eq!(meeting_display_name(&json!({}), 2), "Meeting 3");
    }

    #[test]
    fn test_extract_meeting_list_shapes() {
        assert_eq!(extract_meeting_list(json!([{"id": 1}])).len(), 1);
        assert_eq!(extract_meeting_list(json!({"meetings": [{"id": 1}, {"id": 2}]})).len(), 2);
        assert_eq!(extract_meeting_list(json!({"data": [{"id": 1}]})).len(), 1);
        assert!(extract_meeting_list(json!({"meetings": "nope"})).is_empty());
        assert!(extract_meeting_list(json!("text")).is_empty());
    }

    #[test]
    fn test_filter_meetings() {
        let meetings = to_meetings(vec![
            json!({"id": "1", "name": "Weekly Sync"}),
            json!({"id": "2", "title": "Client call"}),
            json!({"id": "3"}),
        ]);
        assert_eq!(filter_meetings(&meetings, "  ").len(), 3);
        assert_eq!(filter_meetings(&meetings, "SYNC")[0].id.as_deref(), Some("1"));
        assert_eq!(filter_meetings(&meetings, "meeting 3")[0].id.as_deref(), Some("3"));
        assert!(filter_meetings(&meetings, "zzz").is_empty());
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            meeting_url("https://app.example.com/", "abc"),
            "https://app.example.com/meeting/abc"
        );
        let url = endpoint("https://hooks.example.com/", "get_transcript", &[("meeting_id", "a b&c")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://hooks.example.com/get_transcript?meeting_id=a+b%26c"
        );
        assert!(endpoint("not a url", "x", &[]).is_err());
    }
}
