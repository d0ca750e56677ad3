//! Raw message records as they arrive from upstream exports
//!
//! A `RawRecord` is the permissive form straight out of a JSON or CSV export:
//! every field optional, unknown fields ignored. Validation promotes it to a
//! `RawMessage` or quarantines it with a reason.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel a raw message arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceChannel {
    #[default]
    SocialMedia,
    Email,
    Phone,
}

impl std::fmt::Display for SourceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceChannel::SocialMedia => write!(f, "social_media"),
            SourceChannel::Email => write!(f, "email"),
            SourceChannel::Phone => write!(f, "phone"),
        }
    }
}

/// Who sent the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    /// Inbound from the customer
    Customer,
    /// Outbound from the company
    Company,
}

/// A single raw record from an export, prior to validation.
///
/// Unknown fields are ignored by serde; missing mandatory fields are caught
/// during promotion to [`RawMessage`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// RFC 3339 or the legacy tweet-export format
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub channel: Option<SourceChannel>,
    /// True when the message came from the customer
    #[serde(default)]
    pub inbound: Option<bool>,
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Timestamp formats accepted on ingest. The second is the format the legacy
/// tweet export uses ("Tue Oct 31 22:10:47 +0000 2017").
const TIMESTAMP_FORMATS: &[&str] = &["%+", "%a %b %d %H:%M:%S %z %Y"];

/// Parse an export timestamp into UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    raw.parse::<DateTime<Utc>>().ok()
}

/// A validated, immutable raw message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    pub channel: SourceChannel,
    pub direction: MessageDirection,
}

impl RawMessage {
    /// Promote a raw record to a validated message.
    ///
    /// Returns the field name that failed validation on the error side, so
    /// quarantine reports can say why a record was rejected.
    pub fn from_record(record: RawRecord) -> std::result::Result<Self, QuarantinedRecord> {
        let quarantine = |record: RawRecord, reason: &str| QuarantinedRecord {
            record,
            reason: reason.to_string(),
        };

        let Some(id) = record.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Err(quarantine(record.clone(), "missing id"));
        };
        let id = id.to_string();
        let Some(author) = record
            .author
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Err(quarantine(record.clone(), "missing author"));
        };
        let author = author.to_string();
        let Some(raw_ts) = record.timestamp.as_deref() else {
            return Err(quarantine(record.clone(), "missing timestamp"));
        };
        let Some(timestamp) = parse_timestamp(raw_ts) else {
            return Err(quarantine(record.clone(), "unparseable timestamp"));
        };
        let Some(text) = record.text.clone().filter(|t| !t.trim().is_empty()) else {
            return Err(quarantine(record.clone(), "missing text"));
        };

        let direction = match record.inbound {
            Some(false) => MessageDirection::Company,
            // Inbound unless the export says otherwise; customer-initiated
            // records dominate support exports.
            _ => MessageDirection::Customer,
        };

        Ok(RawMessage {
            id,
            author,
            timestamp,
            text,
            in_reply_to: record.in_reply_to.filter(|r| !r.trim().is_empty()),
            channel: record.channel.unwrap_or_default(),
            direction,
        })
    }

    /// Text normalized for resend-artifact detection: trimmed, internal
    /// whitespace collapsed.
    pub fn normalized_text(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Key identifying byte-identical resends that were assigned fresh ids.
    pub fn content_key(&self) -> (String, DateTime<Utc>, String) {
        (self.author.clone(), self.timestamp, self.normalized_text())
    }
}

/// A record rejected during validation, kept for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantinedRecord {
    pub record: RawRecord,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, author: &str, ts: &str, text: &str) -> RawRecord {
        RawRecord {
            id: Some(id.to_string()),
            author: Some(author.to_string()),
            timestamp: Some(ts.to_string()),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn promotes_valid_record() {
        let msg = RawMessage::from_record(record("1", "alice", "2024-03-01T10:00:00Z", "hi"))
            .expect("valid record");
        assert_eq!(msg.id, "1");
        assert_eq!(msg.direction, MessageDirection::Customer);
        assert_eq!(msg.channel, SourceChannel::SocialMedia);
    }

    #[test]
    fn parses_legacy_export_timestamp() {
        let msg = RawMessage::from_record(record(
            "1",
            "alice",
            "Tue Oct 31 22:10:47 +0000 2017",
            "hi",
        ))
        .expect("valid record");
        assert_eq!(msg.timestamp.to_rfc3339(), "2017-10-31T22:10:47+00:00");
    }

    #[test]
    fn quarantines_missing_fields() {
        let mut rec = record("1", "alice", "2024-03-01T10:00:00Z", "hi");
        rec.timestamp = None;
        let err = RawMessage::from_record(rec).unwrap_err();
        assert_eq!(err.reason, "missing timestamp");

        let mut rec = record("1", "", "2024-03-01T10:00:00Z", "hi");
        rec.author = Some(String::new());
        let err = RawMessage::from_record(rec).unwrap_err();
        assert_eq!(err.reason, "missing author");
    }

    #[test]
    fn normalizes_whitespace_for_content_key() {
        let a = RawMessage::from_record(record("1", "alice", "2024-03-01T10:00:00Z", "my  app\n crashed"))
            .unwrap();
        let b = RawMessage::from_record(record("2", "alice", "2024-03-01T10:00:00Z", "my app crashed"))
            .unwrap();
        assert_eq!(a.content_key(), b.content_key());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{"id":"9","author":"bob","timestamp":"2024-01-01T00:00:00Z","text":"x","retweets":12,"lang":"en"}"#;
        let rec: RawRecord = serde_json::from_str(json).expect("deserializes");
        assert!(RawMessage::from_record(rec).is_ok());
    }

    #[test]
    fn empty_reply_ref_becomes_none() {
        let json = r#"{"id":"9","author":"bob","timestamp":"2024-01-01T00:00:00Z","text":"x","in_reply_to":""}"#;
        let rec: RawRecord = serde_json::from_str(json).expect("deserializes");
        assert!(rec.in_reply_to.is_none());
    }
}
