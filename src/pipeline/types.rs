//! Shared types for the record filtering pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Raw record ──────────────────────────────────────────────────────

/// One row of a tabular dataset: column name → cell value.
///
/// Only `messages` and `users` are interpreted; every other column is kept
/// verbatim so a filtered record can be inspected later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Zero-based position in the source dataset.
    pub row_index: usize,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(row_index: usize, fields: Map<String, Value>) -> Self {
        Self { row_index, fields }
    }

    /// Cell value, treating JSON `null` as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Every non-null column, for the detail snapshot.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

// ── Message ─────────────────────────────────────────────────────────

/// Structured part of a message body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// One message of an embedded conversation.
///
/// Built leniently from JSON: unknown shapes leave fields empty instead of
/// failing, so one odd message never hides the rest of the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub timestamp: Option<String>,
    /// Present only when the message body is an object.
    pub content: Option<MessageContent>,
}

impl Message {
    /// Interpret one element of a `messages` array.
    ///
    /// Accepts both `sender_id`/`receiver_id`/`timestamp` and the exported
    /// `sender_nick`/`receiver_nick`/`time` spellings.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let pick = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
                .map(scalar_to_string)
        };

        let content = obj.get("content").and_then(Value::as_object).map(|c| MessageContent {
            text: c.get("text").filter(|v| !v.is_null()).map(scalar_to_string),
            summary: c.get("summary").filter(|v| !v.is_null()).map(scalar_to_string),
        });

        Self {
            sender_id: pick(&["sender_id", "sender_nick"]),
            receiver_id: pick(&["receiver_id", "receiver_nick"]),
            timestamp: pick(&["timestamp", "time"]),
            content,
        }
    }
}

/// Render a JSON scalar as plain text (strings without quotes).
pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Filter kinds and verdicts ───────────────────────────────────────

/// Why a record was filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FilterKind {
    #[serde(rename = "empty_record")]
    EmptyRecord,
    #[serde(rename = "early_morning")]
    EarlyMorning,
    #[serde(rename = "staff_involvement")]
    StaffInvolved,
    #[serde(rename = "service_assistant")]
    ServiceAssistantOnly,
    #[serde(rename = "address_confirmation")]
    AddressConfirmation,
    #[serde(rename = "parse_error")]
    ParseError,
}

impl FilterKind {
    pub const ALL: [FilterKind; 6] = [
        Self::EmptyRecord,
        Self::EarlyMorning,
        Self::StaffInvolved,
        Self::ServiceAssistantOnly,
        Self::AddressConfirmation,
        Self::ParseError,
    ];

    /// Wire name, as used in query paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyRecord => "empty_record",
            Self::EarlyMorning => "early_morning",
            Self::StaffInvolved => "staff_involvement",
            Self::ServiceAssistantOnly => "service_assistant",
            Self::AddressConfirmation => "address_confirmation",
            Self::ParseError => "parse_error",
        }
    }

    /// Human-readable reason attached to every detail of this kind.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyRecord => "empty record",
            Self::EarlyMorning => "early morning message (00:00-08:00)",
            Self::StaffInvolved => "after-sales staff involved",
            Self::ServiceAssistantOnly => "service assistant messages only",
            Self::AddressConfirmation => "shipping address confirmation",
            Self::ParseError => "parse error",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown filter kind: {s}"))
    }
}

/// What a matching rule (or the pre-rule checks) found.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterMatch {
    EmptyRecord,
    EarlyMorning { timestamp: DateTime<FixedOffset> },
    StaffInvolved { staff_name: String },
    ServiceAssistantOnly { service_text: String },
    AddressConfirmation { address_text: String },
    ParseError { error_message: String },
}

impl FilterMatch {
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::EmptyRecord => FilterKind::EmptyRecord,
            Self::EarlyMorning { .. } => FilterKind::EarlyMorning,
            Self::StaffInvolved { .. } => FilterKind::StaffInvolved,
            Self::ServiceAssistantOnly { .. } => FilterKind::ServiceAssistantOnly,
            Self::AddressConfirmation { .. } => FilterKind::AddressConfirmation,
            Self::ParseError { .. } => FilterKind::ParseError,
        }
    }
}

/// Outcome of classifying one record.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterVerdict {
    NotFiltered,
    Filtered(FilterMatch),
}

impl FilterVerdict {
    pub fn kind(&self) -> Option<FilterKind> {
        match self {
            Self::NotFiltered => None,
            Self::Filtered(m) => Some(m.kind()),
        }
    }
}

// ── Filtered record detail ──────────────────────────────────────────

/// Retained explanation and row snapshot for one filtered record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredRecordDetail {
    /// `CHT_<run date>_<row index>`; stable per run date only.
    pub record_id: String,
    pub filter_kind: FilterKind,
    pub filter_reason: String,
    pub row_index: usize,
    pub raw_row_snapshot: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_text: Option<String>,
}

impl FilteredRecordDetail {
    pub fn new(record_id: String, record: &RawRecord, matched: FilterMatch) -> Self {
        let kind = matched.kind();
        let mut detail = Self {
            record_id,
            filter_kind: kind,
            filter_reason: kind.reason().to_string(),
            row_index: record.row_index,
            raw_row_snapshot: record.snapshot(),
            staff_name: None,
            timestamp: None,
            address_text: None,
            error_message: None,
            service_text: None,
        };

        match matched {
            FilterMatch::EmptyRecord => {}
            FilterMatch::EarlyMorning { timestamp } => detail.timestamp = Some(timestamp),
            FilterMatch::StaffInvolved { staff_name } => detail.staff_name = Some(staff_name),
            FilterMatch::ServiceAssistantOnly { service_text } => {
                detail.service_text = Some(service_text)
            }
            FilterMatch::AddressConfirmation { address_text } => {
                detail.address_text = Some(address_text)
            }
            FilterMatch::ParseError { error_message } => detail.error_message = Some(error_message),
        }

        detail
    }
}
