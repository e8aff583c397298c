//! Primary structured-storage sink
//!
//! Posts envelopes as rows to a PostgREST-style API
//! (`POST {url}/rest/v1/{table}` with `Prefer: return=representation`).
//! The returned row carries the storage-assigned id, which flows back to the
//! caller as the dispatch success value.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::config::DatabaseSinkConfig;
use crate::envelope::{Envelope, EventPayload};

use super::{normalize_response, Sink, SinkAttempt, SinkError};

pub struct DatabaseSink {
    client: reqwest::Client,
    config: Option<DatabaseSinkConfig>,
}

impl DatabaseSink {
    pub fn new(client: reqwest::Client, config: Option<DatabaseSinkConfig>) -> Self {
        Self { client, config }
    }

    /// Target table per event kind
    fn table_for(payload: &EventPayload) -> &'static str {
        match payload {
            EventPayload::Lead(_) => "leads",
            EventPayload::BonusSignup(_) => "bonus_signups",
            EventPayload::AnalyticsEvent(_) => "analytics_events",
            EventPayload::PageVisit(_) | EventPayload::PageVisitEnd(_) => "page_visits",
            EventPayload::Unknown { .. } => "capture_events",
        }
    }

    /// Map an envelope to the snake_case row shape of its table
    fn row_for(envelope: &Envelope) -> serde_json::Value {
        match &envelope.payload {
            EventPayload::Lead(lead) => serde_json::json!({
                "first_name": lead.first_name,
                "last_name": lead.last_name,
                "email": lead.email,
                "phone": lead.phone,
                "package_selected": lead.package_bought,
                "grade_selected": lead.grade_selected,
                "source": lead.source.as_str(),
                "session_id": envelope.session_id,
            }),
            EventPayload::BonusSignup(signup) => serde_json::json!({
                "email": signup.email,
                "source": signup.source,
                "session_id": envelope.session_id,
            }),
            EventPayload::AnalyticsEvent(event) => serde_json::json!({
                "event_name": event.event_name,
                "properties": event.properties,
                "session_id": envelope.session_id,
                "page_url": envelope.url,
                "user_agent": envelope.user_agent,
            }),
            EventPayload::PageVisit(visit) | EventPayload::PageVisitEnd(visit) => {
                serde_json::json!({
                    "page": visit.page,
                    "referrer": visit.referrer,
                    "time_spent_ms": visit.time_spent,
                    "session_id": envelope.session_id,
                    "page_url": envelope.url,
                    "user_agent": envelope.user_agent,
                })
            }
            EventPayload::Unknown { kind, data } => serde_json::json!({
                "event_type": kind,
                "payload": data,
                "session_id": envelope.session_id,
                "page_url": envelope.url,
                "user_agent": envelope.user_agent,
            }),
        }
    }

    fn headers(config: &DatabaseSinkConfig) -> Result<HeaderMap, SinkError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| SinkError::new(format!("invalid database api_key: {e}")))?;
        headers.insert("apikey", key);

        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| SinkError::new(format!("invalid database api_key: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);

        Ok(headers)
    }
}

#[async_trait]
impl Sink for DatabaseSink {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn attempt(&self, envelope: &Envelope) -> SinkAttempt {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| SinkError::not_configured("database URL"))?;

        let url = format!(
            "{}/rest/v1/{}",
            config.url.trim_end_matches('/'),
            Self::table_for(&envelope.payload)
        );

        let response = self
            .client
            .post(&url)
            .headers(Self::headers(config)?)
            .json(&Self::row_for(envelope))
            .send()
            .await
            .map_err(|e| SinkError::new(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::new(format!(
                "Database insert failed: {status} - {body}"
            )));
        }

        // PostgREST returns the inserted rows as an array; unwrap the single
        // row so callers can read the assigned id directly.
        let normalized = normalize_response(response, envelope).await;
        match normalized {
            serde_json::Value::Array(mut rows) if !rows.is_empty() => Ok(rows.remove(0)),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{BonusSignupPayload, LeadPayload, LeadSource};

    fn envelope(payload: EventPayload) -> Envelope {
        Envelope {
            payload,
            timestamp: 1_700_000_000_000,
            session_id: "session_test".to_string(),
            url: "https://example.com".to_string(),
            user_agent: "test-agent".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_fails_without_io() {
        let sink = DatabaseSink::new(reqwest::Client::new(), None);
        let err = sink
            .attempt(&envelope(EventPayload::Unknown {
                kind: "x".to_string(),
                data: serde_json::Value::Null,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No database URL configured");
    }

    #[test]
    fn test_lead_row_uses_storage_column_names() {
        let env = envelope(EventPayload::Lead(LeadPayload {
            id: "id-1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "123".to_string(),
            package_bought: "full_prep".to_string(),
            grade_selected: "grade_3".to_string(),
            source: LeadSource::Direct,
        }));

        let row = DatabaseSink::row_for(&env);
        assert_eq!(row["package_selected"], "full_prep");
        assert_eq!(row["source"], "direct");
        assert_eq!(row["session_id"], "session_test");
        assert!(row.get("packageBought").is_none());
    }

    #[test]
    fn test_table_routing() {
        assert_eq!(
            DatabaseSink::table_for(&EventPayload::BonusSignup(BonusSignupPayload {
                id: "id".to_string(),
                email: "a@b.com".to_string(),
                source: "bonus_page".to_string(),
            })),
            "bonus_signups"
        );
        assert_eq!(
            DatabaseSink::table_for(&EventPayload::Unknown {
                kind: "custom".to_string(),
                data: serde_json::Value::Null,
            }),
            "capture_events"
        );
    }
}
