use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::entities::{BookingRecord, QueryFilter};

// Request payload for admin login. Missing fields count as empty credentials.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

// Response payload for a successful admin login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: u64,
}

// Search parameters as they arrive on the query string or in a JSON body.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub keyword: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

const KEYWORD_KEYS: &[&str] = &["q", "query"];
const FROM_KEYS: &[&str] = &["from", "start", "start_date", "from_date"];
const TO_KEYS: &[&str] = &["to", "end", "end_date", "to_date"];
const CURSOR_KEYS: &[&str] = &["cursor", "next_cursor"];
const LIMIT_KEYS: &[&str] = &["limit", "max", "max_results"];

impl SearchParams {
    // First non-empty alias wins; an unusable limit falls back to the default.
    pub fn from_map(raw: &Map<String, Value>) -> Self {
        Self {
            keyword: pick(raw, KEYWORD_KEYS),
            from: pick(raw, FROM_KEYS),
            to: pick(raw, TO_KEYS),
            cursor: pick(raw, CURSOR_KEYS),
            limit: pick(raw, LIMIT_KEYS).and_then(|value| parse_limit(&value)),
        }
    }

    // Body values override query-string values key by key.
    pub fn merged(query: Map<String, Value>, body: Map<String, Value>) -> Self {
        let mut raw = query;
        raw.extend(body);
        Self::from_map(&raw)
    }

    pub fn into_filter(self) -> QueryFilter {
        QueryFilter {
            keyword: self.keyword,
            date_from: self.from,
            date_to: self.to,
            cursor: self.cursor,
            limit: self.limit,
        }
    }
}

fn pick(raw: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let text = match raw.get(*key)? {
            Value::String(text) => text.trim().to_string(),
            Value::Number(number) => number.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    })
}

// Leading integer, like a browser form would send. Zero and negatives clamp to 1 later.
fn parse_limit(value: &str) -> Option<u32> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];
    if digits.is_empty() {
        return None;
    }
    if negative {
        return Some(0);
    }
    match digits.parse::<u64>() {
        Ok(n) => Some(u32::try_from(n).unwrap_or(u32::MAX)),
        Err(_) => Some(u32::MAX),
    }
}

// Response payload for booking search.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub items: Vec<BookingRecord>,
    pub next_cursor: Option<String>,
    pub count: usize,
}

// Request payload for a context update.
#[derive(Debug, Deserialize)]
pub struct UpdateContextRequest {
    #[serde(default)]
    pub context: Value,
}

#[derive(Debug, Serialize)]
pub struct UpdateContextResponse {
    pub ok: bool,
    pub item: BookingRecord,
}

#[derive(Debug, Serialize)]
pub struct DeleteBookingResponse {
    pub success: bool,
    pub deleted_id: String,
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub ok: bool,
    pub now: String,
}

// JSON error envelope shared by every endpoint.
#[derive(Debug, Default, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempted_ids: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
