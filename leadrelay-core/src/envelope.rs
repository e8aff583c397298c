//! Capture envelope model and builder
//!
//! Every capture request (lead, bonus signup, analytics event, page visit)
//! is normalized into an [`Envelope`] before dispatch. The wire shape matches
//! what the deployed sinks already accept:
//!
//! ```json
//! { "type": "lead", "data": { ... }, "timestamp": 1700000000000,
//!   "sessionId": "session_...", "url": "...", "userAgent": "..." }
//! ```
//!
//! The payload is a closed sum type over the known event kinds plus an
//! [`EventPayload::Unknown`] variant that carries unrecognized types verbatim.
//! Envelopes are immutable once built.

use std::fmt;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::context::CaptureContext;

/// Sentinel for leads that did not select a grade
pub const GRADE_NOT_SPECIFIED: &str = "not_specified";

/// Default source label for bonus signups
pub const DEFAULT_BONUS_SOURCE: &str = "bonus_page";

/// Where a lead came from (closed set)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    #[default]
    TestPackage,
    BonusAccess,
    Direct,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::TestPackage => "test_package",
            LeadSource::BonusAccess => "bonus_access",
            LeadSource::Direct => "direct",
        }
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lead capture payload. Email and phone are opaque strings; validation
/// is a UI concern, not the capture pipeline's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPayload {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub package_bought: String,
    #[serde(default = "default_grade")]
    pub grade_selected: String,
    #[serde(default)]
    pub source: LeadSource,
}

fn default_grade() -> String {
    GRADE_NOT_SPECIFIED.to_string()
}

/// Bonus-page email signup payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusSignupPayload {
    pub id: String,
    pub email: String,
    #[serde(default = "default_bonus_source")]
    pub source: String,
}

fn default_bonus_source() -> String {
    DEFAULT_BONUS_SOURCE.to_string()
}

/// Free-form analytics event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEventPayload {
    pub id: String,
    pub event_name: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Page visit payload; `time_spent` is filled only on the matching end event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageVisitPayload {
    pub id: String,
    pub page: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<i64>,
}

/// Type-discriminated capture payload.
///
/// Unknown types are preserved verbatim and forwarded opaquely; they are
/// never dropped or coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Lead(LeadPayload),
    BonusSignup(BonusSignupPayload),
    AnalyticsEvent(AnalyticsEventPayload),
    PageVisit(PageVisitPayload),
    PageVisitEnd(PageVisitPayload),
    Unknown {
        kind: String,
        data: serde_json::Value,
    },
}

impl EventPayload {
    /// Wire tag for this payload ("lead", "bonus_signup", ...)
    pub fn kind(&self) -> &str {
        match self {
            EventPayload::Lead(_) => "lead",
            EventPayload::BonusSignup(_) => "bonus_signup",
            EventPayload::AnalyticsEvent(_) => "analytics_event",
            EventPayload::PageVisit(_) => "page_visit",
            EventPayload::PageVisitEnd(_) => "page_visit_end",
            EventPayload::Unknown { kind, .. } => kind,
        }
    }

    /// Source label carried by the payload, if it has one.
    ///
    /// Used by dispatch failure diagnostics.
    pub fn source(&self) -> Option<String> {
        match self {
            EventPayload::Lead(lead) => Some(lead.source.to_string()),
            EventPayload::BonusSignup(signup) => Some(signup.source.clone()),
            EventPayload::Unknown { data, .. } => data
                .get("source")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        }
    }

    /// Payload serialized as the envelope's `data` value
    pub fn data_json(&self) -> serde_json::Value {
        match self {
            EventPayload::Lead(p) => serde_json::to_value(p),
            EventPayload::BonusSignup(p) => serde_json::to_value(p),
            EventPayload::AnalyticsEvent(p) => serde_json::to_value(p),
            EventPayload::PageVisit(p) | EventPayload::PageVisitEnd(p) => serde_json::to_value(p),
            EventPayload::Unknown { data, .. } => Ok(data.clone()),
        }
        .unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for EventPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", self.kind())?;
        map.serialize_entry("data", &self.data_json())?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for EventPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawPayload {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            data: serde_json::Value,
        }

        let raw = RawPayload::deserialize(deserializer)?;
        let payload = match raw.kind.as_str() {
            "lead" => EventPayload::Lead(
                serde_json::from_value(raw.data).map_err(D::Error::custom)?,
            ),
            "bonus_signup" => EventPayload::BonusSignup(
                serde_json::from_value(raw.data).map_err(D::Error::custom)?,
            ),
            "analytics_event" => EventPayload::AnalyticsEvent(
                serde_json::from_value(raw.data).map_err(D::Error::custom)?,
            ),
            "page_visit" => EventPayload::PageVisit(
                serde_json::from_value(raw.data).map_err(D::Error::custom)?,
            ),
            "page_visit_end" => EventPayload::PageVisitEnd(
                serde_json::from_value(raw.data).map_err(D::Error::custom)?,
            ),
            _ => EventPayload::Unknown {
                kind: raw.kind,
                data: raw.data,
            },
        };
        Ok(payload)
    }
}

/// The unit of capture passed through the dispatch pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(flatten)]
    pub payload: EventPayload,
    /// Capture time in epoch milliseconds
    pub timestamp: i64,
    pub session_id: String,
    pub url: String,
    pub user_agent: String,
}

/// Raw lead form fields as submitted by the UI.
///
/// Optional fields are filled with sentinel defaults at build time so the
/// sinks always receive a stable shape.
#[derive(Debug, Clone, Default)]
pub struct LeadForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub package_bought: String,
    pub grade_selected: Option<String>,
    pub source: Option<LeadSource>,
}

/// Builds envelopes from raw capture requests.
///
/// Ambient context (URL, user agent, clock) is read at build time, not at
/// enqueue time, so the envelope reflects the exact moment of capture.
/// Building never fails; absent optional fields degrade to sentinels.
pub struct EnvelopeBuilder {
    ctx: Arc<dyn CaptureContext>,
    session_id: String,
    session_started_ms: i64,
}

impl EnvelopeBuilder {
    pub fn new(ctx: Arc<dyn CaptureContext>, session_id: String) -> Self {
        let session_started_ms = ctx.now_ms();
        Self {
            ctx,
            session_id,
            session_started_ms,
        }
    }

    /// Current time from the injected clock, for dwell-time arithmetic
    pub fn now_ms(&self) -> i64 {
        self.ctx.now_ms()
    }

    fn stamp(&self, payload: EventPayload) -> Envelope {
        Envelope {
            payload,
            timestamp: self.ctx.now_ms(),
            session_id: self.session_id.clone(),
            url: self.ctx.current_url(),
            user_agent: self.ctx.user_agent(),
        }
    }

    pub fn lead(&self, form: LeadForm) -> Envelope {
        self.stamp(EventPayload::Lead(LeadPayload {
            id: self.ctx.new_id(),
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email,
            phone: form.phone,
            package_bought: form.package_bought,
            grade_selected: form
                .grade_selected
                .filter(|g| !g.is_empty())
                .unwrap_or_else(default_grade),
            source: form.source.unwrap_or_default(),
        }))
    }

    pub fn bonus_signup(&self, email: &str, source: Option<&str>) -> Envelope {
        self.stamp(EventPayload::BonusSignup(BonusSignupPayload {
            id: self.ctx.new_id(),
            email: email.to_string(),
            source: source
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(default_bonus_source),
        }))
    }

    /// Analytics events are enriched with session context; the builder's
    /// enrichment keys win over caller-supplied ones on collision.
    pub fn analytics_event(
        &self,
        event_name: &str,
        properties: serde_json::Map<String, serde_json::Value>,
    ) -> Envelope {
        let mut merged = properties;
        merged.insert(
            "sessionDuration".to_string(),
            (self.ctx.now_ms() - self.session_started_ms).into(),
        );

        self.stamp(EventPayload::AnalyticsEvent(AnalyticsEventPayload {
            id: self.ctx.new_id(),
            event_name: event_name.to_string(),
            properties: merged,
        }))
    }

    pub fn page_visit(&self, page: &str) -> Envelope {
        self.stamp(EventPayload::PageVisit(PageVisitPayload {
            id: self.ctx.new_id(),
            page: page.to_string(),
            referrer: self.ctx.referrer(),
            time_spent: None,
        }))
    }

    pub fn page_visit_end(&self, mut visit: PageVisitPayload, time_spent: i64) -> Envelope {
        visit.time_spent = Some(time_spent);
        self.stamp(EventPayload::PageVisitEnd(visit))
    }

    /// Passthrough for types outside the known set; the payload is carried
    /// verbatim.
    pub fn raw(&self, kind: &str, data: serde_json::Value) -> Envelope {
        self.stamp(EventPayload::Unknown {
            kind: kind.to_string(),
            data,
        })
    }
}
