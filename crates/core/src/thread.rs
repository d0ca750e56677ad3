//! Reconstructed conversation threads

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{MessageDirection, RawMessage};

/// Lifecycle status of a thread within the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    /// Reconstructed, not yet tagged
    #[default]
    Reconstructed,
    /// At least one tag version exists
    Tagged,
}

/// A deduplicated, chronologically ordered conversation.
///
/// Owned by the reconstructor; downstream stages only ever read it.
/// Invariants: message ids are unique, ordering is non-decreasing by
/// (timestamp, id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationThread {
    /// Root message id; stable across re-runs over the same input
    pub thread_id: String,
    pub messages: Vec<RawMessage>,
    /// All authors seen in the thread, ordered for deterministic output
    pub participants: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default)]
    pub status: ThreadStatus,
}

impl ConversationThread {
    /// Build a thread from already-deduplicated messages. Sorts by
    /// (timestamp, id) and derives participants and party ids.
    pub fn from_messages(thread_id: String, mut messages: Vec<RawMessage>) -> Self {
        messages.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        let participants: BTreeSet<String> =
            messages.iter().map(|m| m.author.clone()).collect();
        let customer_id = messages
            .iter()
            .find(|m| m.direction == MessageDirection::Customer)
            .map(|m| m.author.clone());
        let company_id = messages
            .iter()
            .find(|m| m.direction == MessageDirection::Company)
            .map(|m| m.author.clone());
        Self {
            thread_id,
            messages,
            participants,
            customer_id,
            company_id,
            status: ThreadStatus::Reconstructed,
        }
    }

    /// First message in the thread (the issue opener).
    pub fn root(&self) -> Option<&RawMessage> {
        self.messages.first()
    }

    /// Timestamp of the newest message.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    /// Timestamp of the newest customer message, used for timing policy.
    pub fn last_customer_activity(&self) -> Option<DateTime<Utc>> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.direction == MessageDirection::Customer)
            .map(|m| m.timestamp)
    }

    /// Whether the company has replied at least once.
    pub fn company_has_replied(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.direction == MessageDirection::Company)
    }

    /// Customer-authored text, oldest first. This is the classifier input.
    pub fn customer_text(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.direction == MessageDirection::Customer)
            .map(|m| m.text.as_str())
            .collect()
    }

    /// Render the conversation as a speaker-labelled transcript.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let speaker = match m.direction {
                    MessageDirection::Customer => "Customer",
                    MessageDirection::Company => "Company",
                };
                format!("[{speaker}] {}: {}", m.timestamp.to_rfc3339(), m.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SourceChannel;
    use chrono::TimeZone;

    fn msg(id: &str, author: &str, minute: u32, direction: MessageDirection) -> RawMessage {
        RawMessage {
            id: id.to_string(),
            author: author.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap(),
            text: format!("message {id}"),
            in_reply_to: None,
            channel: SourceChannel::SocialMedia,
            direction,
        }
    }

    #[test]
    fn orders_by_timestamp_then_id() {
        let thread = ConversationThread::from_messages(
            "a".into(),
            vec![
                msg("b", "alice", 5, MessageDirection::Customer),
                msg("a", "alice", 5, MessageDirection::Customer),
                msg("c", "support", 1, MessageDirection::Company),
            ],
        );
        let ids: Vec<_> = thread.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn derives_parties() {
        let thread = ConversationThread::from_messages(
            "a".into(),
            vec![
                msg("a", "alice", 0, MessageDirection::Customer),
                msg("b", "support", 1, MessageDirection::Company),
            ],
        );
        assert_eq!(thread.customer_id.as_deref(), Some("alice"));
        assert_eq!(thread.company_id.as_deref(), Some("support"));
        assert_eq!(thread.participants.len(), 2);
    }

    #[test]
    fn last_customer_activity_skips_company_reply() {
        let thread = ConversationThread::from_messages(
            "a".into(),
            vec![
                msg("a", "alice", 0, MessageDirection::Customer),
                msg("b", "support", 30, MessageDirection::Company),
            ],
        );
        assert_eq!(
            thread.last_customer_activity(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert!(thread.company_has_replied());
    }
}
