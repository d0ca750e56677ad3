//! Tagging stage
//!
//! One capability call per dimension: support type, sentiment, resolution,
//! and personality when enabled. Confidence below the threshold marks a
//! label uncertain rather than rejecting it; the decision engine
//! down-weights uncertain signals. Tags are versioned and append-only.

use std::sync::Arc;

use support_nba_core::{
    Capability, CapabilityKind, CapabilityRequest, ConversationThread, Label, Result, Tag,
};

use support_nba_capability::{parse, prompt, CapabilityError};

/// Attempts per dimension when the model answers outside the label
/// vocabulary. Transient transport failures are retried inside the backend;
/// this only re-asks on parse failures.
const PARSE_ATTEMPTS: u32 = 2;

pub struct Tagger {
    capability: Arc<dyn Capability>,
    threshold: f64,
    personality_enabled: bool,
}

impl Tagger {
    pub fn new(capability: Arc<dyn Capability>, threshold: f64, personality_enabled: bool) -> Self {
        Self {
            capability,
            threshold,
            personality_enabled,
        }
    }

    async fn ask<T>(
        &self,
        kind: CapabilityKind,
        prompt: String,
        parse: impl Fn(&str) -> std::result::Result<T, CapabilityError>,
    ) -> Result<Label<T>> {
        let mut last_error = None;
        for attempt in 1..=PARSE_ATTEMPTS {
            let response = self
                .capability
                .invoke(CapabilityRequest::new(kind, prompt.clone()))
                .await?;
            match parse(&response.content) {
                Ok(value) => {
                    return Ok(Label::new(value, response.confidence, self.threshold));
                }
                Err(e) => {
                    tracing::warn!(
                        kind = kind.as_str(),
                        attempt,
                        error = %e,
                        "Unparseable label, re-asking"
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| CapabilityError::InvalidResponse("no attempts made".into()))
            .into())
    }

    /// Produce the next tag version for a thread. `version` is 1-based;
    /// callers pass one past the latest stored version.
    pub async fn tag(&self, thread: &ConversationThread, version: u32) -> Result<Tag> {
        let support_type = self
            .ask(
                CapabilityKind::SupportTypeClassifier,
                prompt::support_type(thread),
                parse::support_type,
            )
            .await?;
        let sentiment = self
            .ask(
                CapabilityKind::SentimentClassifier,
                prompt::sentiment(thread),
                parse::sentiment,
            )
            .await?;
        let resolution = self
            .ask(
                CapabilityKind::ResolutionClassifier,
                prompt::resolution(thread),
                parse::resolution,
            )
            .await?;

        let personality = if self.personality_enabled {
            let text = thread.customer_text().join(" ");
            if text.trim().is_empty() {
                None
            } else {
                Some(
                    self.ask(
                        CapabilityKind::PersonalityClassifier,
                        prompt::personality(&text),
                        parse::personality,
                    )
                    .await?,
                )
            }
        } else {
            None
        };

        let tag = Tag {
            thread_id: thread.thread_id.clone(),
            version,
            support_type,
            sentiment,
            resolution,
            personality,
        };
        tracing::info!(
            thread_id = %tag.thread_id,
            version = tag.version,
            support_type = %tag.support_type.value,
            sentiment = %tag.sentiment.value,
            resolution = %tag.resolution.value,
            uncertain = tag.has_uncertainty(),
            "Tagged thread"
        );
        Ok(tag)
    }
}

/// One-shot convenience wrapper around [`Tagger`].
pub async fn tag_thread(
    thread: &ConversationThread,
    capability: Arc<dyn Capability>,
    threshold: f64,
    version: u32,
    personality_enabled: bool,
) -> Result<Tag> {
    Tagger::new(capability, threshold, personality_enabled)
        .tag(thread, version)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use support_nba_capability::ScriptedCapability;
    use support_nba_core::{
        MessageDirection, PersonalityType, RawMessage, ResolutionStatus, Sentiment,
        SourceChannel, SupportType,
    };

    fn thread() -> ConversationThread {
        ConversationThread::from_messages(
            "t1".into(),
            vec![RawMessage {
                id: "t1".into(),
                author: "alice".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
                text: "I was double charged, I want a refund".into(),
                in_reply_to: None,
                channel: SourceChannel::SocialMedia,
                direction: MessageDirection::Customer,
            }],
        )
    }

    #[tokio::test]
    async fn tags_all_dimensions() {
        let backend = Arc::new(ScriptedCapability::new());
        backend.push(CapabilityKind::SupportTypeClassifier, "billing_or_refund", 0.9);
        backend.push(CapabilityKind::SentimentClassifier, "negative", 0.8);
        backend.push(CapabilityKind::ResolutionClassifier, "open", 0.95);

        let tag = tag_thread(&thread(), backend, 0.5, 1, false).await.unwrap();
        assert_eq!(tag.support_type.value, SupportType::BillingOrRefund);
        assert_eq!(tag.sentiment.value, Sentiment::Negative);
        assert_eq!(tag.resolution.value, ResolutionStatus::Open);
        assert!(tag.personality.is_none());
        assert!(!tag.has_uncertainty());
        assert_eq!(tag.version, 1);
    }

    #[tokio::test]
    async fn low_confidence_marks_uncertain() {
        let backend = Arc::new(ScriptedCapability::new());
        backend.push(CapabilityKind::SupportTypeClassifier, "technical_issue", 0.3);
        backend.push(CapabilityKind::SentimentClassifier, "neutral", 0.9);
        backend.push(CapabilityKind::ResolutionClassifier, "open", 0.9);

        let tag = tag_thread(&thread(), backend, 0.5, 1, false).await.unwrap();
        assert!(tag.support_type.uncertain);
        assert!(!tag.sentiment.uncertain);
        assert!(tag.has_uncertainty());
    }

    #[tokio::test]
    async fn reasks_once_on_unparseable_label() {
        let backend = Arc::new(ScriptedCapability::new());
        backend.push(CapabilityKind::SupportTypeClassifier, "not a label", 0.9);
        backend.push(CapabilityKind::SupportTypeClassifier, "billing_or_refund", 0.9);
        backend.push(CapabilityKind::SentimentClassifier, "negative", 0.9);
        backend.push(CapabilityKind::ResolutionClassifier, "open", 0.9);

        let tag = tag_thread(&thread(), backend, 0.5, 1, false).await.unwrap();
        assert_eq!(tag.support_type.value, SupportType::BillingOrRefund);
    }

    #[tokio::test]
    async fn persistent_garbage_surfaces_an_error() {
        let backend = Arc::new(ScriptedCapability::strict());
        backend.push(CapabilityKind::SupportTypeClassifier, "nonsense", 0.9);
        backend.push(CapabilityKind::SupportTypeClassifier, "still nonsense", 0.9);

        let result = tag_thread(&thread(), backend, 0.5, 1, false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn personality_uses_customer_text() {
        let backend = Arc::new(ScriptedCapability::new());
        backend.push(CapabilityKind::SupportTypeClassifier, "billing_or_refund", 0.9);
        backend.push(CapabilityKind::SentimentClassifier, "negative", 0.9);
        backend.push(CapabilityKind::ResolutionClassifier, "open", 0.9);
        backend.push(CapabilityKind::PersonalityClassifier, "ENFP", 0.7);

        let tag = tag_thread(&thread(), backend, 0.5, 2, true).await.unwrap();
        let personality = tag.personality.unwrap();
        assert_eq!(personality.value, PersonalityType::ENFP);
        assert_eq!(tag.version, 2);
    }
}
