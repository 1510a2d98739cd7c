//! The fixed, ordered rule chain.
//!
//! Four content rules run in this order, first match wins:
//! - early-morning message (hour in the configured window)
//! - after-sales staff among the participants
//! - conversation consisting only of service-assistant messages
//! - "please confirm shipping address" prompt
//!
//! Each rule is a pure function of the parsed conversation. Rules can be
//! switched off individually but never reordered or composed.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use tracing::debug;

use crate::config::{FilterConfig, FilterRules};
use crate::pipeline::types::{FilterMatch, Message};
use crate::roster::RosterSnapshot;

/// Marker reported when an assistant-only conversation carries no text.
pub const SERVICE_ASSISTANT_PLACEHOLDER: &str = "service assistant message";

/// Parse an ISO-8601 timestamp.
///
/// Offsets (`Z`, `+08:00`) are kept so the hour check sees the local hour
/// as written. Naive timestamps are taken as UTC; a bare date is midnight.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// First message sent inside the early-morning window.
///
/// A message whose timestamp does not parse is skipped, not fatal.
pub fn early_morning(messages: &[Message], config: &FilterConfig) -> Option<DateTime<FixedOffset>> {
    messages.iter().find_map(|message| {
        let raw = message.timestamp.as_deref()?;
        let Some(dt) = parse_timestamp(raw) else {
            debug!(timestamp = raw, "Skipping unparseable message timestamp");
            return None;
        };
        let hour = dt.hour();
        (hour >= config.early_start_hour && hour < config.early_end_hour).then_some(dt)
    })
}

/// First participant who is an operator account or on the staff roster.
pub fn staff_involved(
    participants: &[String],
    roster: &RosterSnapshot,
    config: &FilterConfig,
) -> Option<String> {
    participants
        .iter()
        .find(|user| user.contains(config.operator_marker.as_str()) || roster.contains(user))
        .cloned()
}

/// Joined assistant texts if every sender is the service assistant.
///
/// All-or-nothing: any other sender means no match. Messages without a sender
/// do not break the match.
pub fn service_assistant_only(messages: &[Message], config: &FilterConfig) -> Option<String> {
    if messages.is_empty() {
        return None;
    }

    let mut texts = Vec::new();
    for message in messages {
        let Some(sender) = message.sender_id.as_deref() else {
            continue;
        };
        if sender != config.assistant_account {
            return None;
        }
        if let Some(text) = message.content.as_ref().and_then(|c| c.text.clone()) {
            texts.push(text);
        }
    }

    if texts.is_empty() {
        return Some(SERVICE_ASSISTANT_PLACEHOLDER.to_string());
    }
    // Blank joined text is no match.
    let joined = texts.join("; ");
    (!joined.is_empty()).then_some(joined)
}

/// Text of the first shipping-address confirmation prompt. An empty prompt
/// text is no match.
pub fn address_confirmation(messages: &[Message], config: &FilterConfig) -> Option<String> {
    let content = messages.iter().find_map(|message| {
        message
            .content
            .as_ref()
            .filter(|c| c.summary.as_deref() == Some(config.address_confirm_tag.as_str()))
    })?;
    match &content.text {
        Some(text) if text.is_empty() => None,
        Some(text) => Some(text.clone()),
        None => Some(config.address_confirm_tag.clone()),
    }
}

/// The ordered rule chain, bound to one run's configuration.
#[derive(Debug, Clone)]
pub struct RuleChain {
    config: FilterConfig,
    rules: FilterRules,
}

impl RuleChain {
    pub fn new(config: FilterConfig, rules: FilterRules) -> Self {
        Self { config, rules }
    }

    /// Evaluate the enabled rules in fixed order; first match wins.
    pub fn evaluate(
        &self,
        messages: &[Message],
        participants: &[String],
        roster: &RosterSnapshot,
    ) -> Option<FilterMatch> {
        if self.rules.early_morning
            && let Some(timestamp) = early_morning(messages, &self.config)
        {
            return Some(FilterMatch::EarlyMorning { timestamp });
        }

        if self.rules.staff
            && let Some(staff_name) = staff_involved(participants, roster, &self.config)
        {
            return Some(FilterMatch::StaffInvolved { staff_name });
        }

        if self.rules.service_assistant
            && let Some(service_text) = service_assistant_only(messages, &self.config)
        {
            return Some(FilterMatch::ServiceAssistantOnly { service_text });
        }

        if self.rules.address_confirm
            && let Some(address_text) = address_confirmation(messages, &self.config)
        {
            return Some(FilterMatch::AddressConfirmation { address_text });
        }

        None
    }
}

impl Default for RuleChain {
    fn default() -> Self {
        Self::new(FilterConfig::default(), FilterRules::default())
    }
}
