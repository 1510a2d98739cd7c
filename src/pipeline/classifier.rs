//! Per-record classification.
//!
//! Turns one raw row into exactly one verdict. Nothing that goes wrong inside
//! a single row escapes as an error: malformed input and panicking rules both
//! become a `parse_error` detail so the row is counted, never dropped.

use std::panic::{self, AssertUnwindSafe};

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::error::RecordError;
use crate::pipeline::rules::RuleChain;
use crate::pipeline::types::{
    FilterMatch, FilterVerdict, FilteredRecordDetail, Message, RawRecord, scalar_to_string,
};
use crate::roster::RosterSnapshot;

/// Column holding the serialized conversation.
pub const MESSAGES_FIELD: &str = "messages";
/// Column holding the participant list.
pub const USERS_FIELD: &str = "users";

/// Verdict for one record plus its detail when filtered.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub verdict: FilterVerdict,
    pub detail: Option<FilteredRecordDetail>,
}

/// Parse the `messages` column.
///
/// Missing, null, blank or `null` JSON yields an empty list. Broken JSON and
/// non-array values are errors.
pub fn parse_messages(record: &RawRecord) -> Result<Vec<Message>, RecordError> {
    let Some(value) = record.field(MESSAGES_FIELD) else {
        return Ok(Vec::new());
    };

    let parsed;
    let value = match value {
        Value::String(s) if s.trim().is_empty() => return Ok(Vec::new()),
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s)?;
            &parsed
        }
        other => other,
    };

    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.iter().map(Message::from_value).collect()),
        other => Err(RecordError::MessagesNotArray(json_type_name(other))),
    }
}

/// Parse the `users` column from comma-joined text or a native list.
///
/// Never fails; anything unusable is an empty participant list.
pub fn parse_users(record: &RawRecord) -> Vec<String> {
    let Some(value) = record.field(USERS_FIELD) else {
        return Vec::new();
    };

    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(scalar_to_string)
            .collect(),
        Value::String(s) if s.trim_start().starts_with('[') => {
            match serde_json::from_str::<Vec<Value>>(s) {
                Ok(items) => items.iter().map(scalar_to_string).collect(),
                Err(_) => s.split(',').map(String::from).collect(),
            }
        }
        other => scalar_to_string(other).split(',').map(String::from).collect(),
    };

    raw.into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Classifies records for one run: fixed rule chain, roster snapshot and
/// run date.
#[derive(Debug, Clone)]
pub struct Classifier {
    chain: RuleChain,
    roster: RosterSnapshot,
    run_date: NaiveDate,
}

impl Classifier {
    pub fn new(chain: RuleChain, roster: RosterSnapshot, run_date: NaiveDate) -> Self {
        Self {
            chain,
            roster,
            run_date,
        }
    }

    /// Stable id of a filtered row: `CHT_<YYYYMMDD>_<row index>`.
    pub fn record_id(&self, row_index: usize) -> String {
        format!("CHT_{}_{:06}", self.run_date.format("%Y%m%d"), row_index)
    }

    /// Produce exactly one verdict for `record`.
    pub fn classify(&self, record: &RawRecord) -> Classification {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.evaluate(record)))
            .unwrap_or_else(|payload| Err(RecordError::Panicked(panic_message(payload))));

        let matched = match outcome {
            Ok(Some(matched)) => matched,
            Ok(None) => {
                return Classification {
                    verdict: FilterVerdict::NotFiltered,
                    detail: None,
                };
            }
            Err(e) => {
                debug!(row = record.row_index, error = %e, "Record failed to parse");
                FilterMatch::ParseError {
                    error_message: e.to_string(),
                }
            }
        };

        let detail =
            FilteredRecordDetail::new(self.record_id(record.row_index), record, matched.clone());
        Classification {
            verdict: FilterVerdict::Filtered(matched),
            detail: Some(detail),
        }
    }

    fn evaluate(&self, record: &RawRecord) -> Result<Option<FilterMatch>, RecordError> {
        let messages = parse_messages(record)?;
        if messages.is_empty() {
            return Ok(Some(FilterMatch::EmptyRecord));
        }

        let users = parse_users(record);
        Ok(self.chain.evaluate(&messages, &users, &self.roster))
    }
}
