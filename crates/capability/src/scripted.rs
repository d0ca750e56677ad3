//! Scripted capability backend
//!
//! Deterministic stand-in for the HTTP backend, used by tests and offline
//! runs. Responses are queued per capability kind; when a queue runs dry the
//! backend falls back to a keyword heuristic so whole-pipeline runs never
//! stall on an unscripted call.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use support_nba_core::{
    Capability, CapabilityKind, CapabilityRequest, CapabilityResponse, Result,
};

#[derive(Default)]
pub struct ScriptedCapability {
    responses: Mutex<HashMap<CapabilityKind, VecDeque<CapabilityResponse>>>,
    /// When set, an exhausted queue is an error instead of a heuristic.
    strict: bool,
}

impl ScriptedCapability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exhausted queues fail instead of falling back to heuristics.
    pub fn strict() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            strict: true,
        }
    }

    pub fn push(&self, kind: CapabilityKind, content: impl Into<String>, confidence: f64) {
        self.responses
            .lock()
            .entry(kind)
            .or_default()
            .push_back(CapabilityResponse::new(content, confidence));
    }

    fn pop(&self, kind: CapabilityKind) -> Option<CapabilityResponse> {
        self.responses
            .lock()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
    }

    /// Keyword heuristic over the prompt text. Crude, but stable, which is
    /// what offline runs need.
    fn heuristic(kind: CapabilityKind, prompt: &str) -> CapabilityResponse {
        let lower = prompt.to_ascii_lowercase();
        let content = match kind {
            CapabilityKind::SupportTypeClassifier => {
                if lower.contains("refund") || lower.contains("charge") || lower.contains("bill")
                {
                    "billing_or_refund"
                } else if lower.contains("login") || lower.contains("password") {
                    "account_or_login"
                } else if lower.contains("down") || lower.contains("outage") {
                    "urgent_service_disruption"
                } else if lower.contains("order") || lower.contains("delivery") {
                    "order_or_delivery"
                } else {
                    "technical_issue"
                }
            }
            CapabilityKind::SentimentClassifier => {
                if lower.contains("thank") || lower.contains("great") {
                    "positive"
                } else if lower.contains("angry")
                    || lower.contains("worst")
                    || lower.contains("!!")
                {
                    "negative"
                } else {
                    "neutral"
                }
            }
            CapabilityKind::ResolutionClassifier => {
                if lower.contains("solved") || lower.contains("works now") {
                    "resolved"
                } else {
                    "open"
                }
            }
            CapabilityKind::PersonalityClassifier => "ISTJ",
            CapabilityKind::MessageGenerator => {
                "{\"message\": \"Thank you for reaching out. We're sorry about \
the trouble and are looking into it now; we'll follow up with next steps \
shortly.\", \"rationale\": \"scripted fallback\"}"
            }
            CapabilityKind::Judge => {
                "{\"resolution_score\": 3, \"tone_score\": 3, \
\"evaluation\": \"adequate scripted response\"}"
            }
        };
        // Heuristic answers are low-trust by construction
        CapabilityResponse::new(content, 0.4)
    }
}

#[async_trait]
impl Capability for ScriptedCapability {
    async fn invoke(&self, request: CapabilityRequest) -> Result<CapabilityResponse> {
        if let Some(response) = self.pop(request.kind) {
            return Ok(response);
        }
        if self.strict {
            return Err(support_nba_core::Error::capability(format!(
                "No scripted response left for {}",
                request.kind.as_str()
            )));
        }
        Ok(Self::heuristic(request.kind, &request.prompt))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_responses_drain_in_order() {
        let backend = ScriptedCapability::new();
        backend.push(CapabilityKind::SentimentClassifier, "negative", 0.9);
        backend.push(CapabilityKind::SentimentClassifier, "neutral", 0.8);

        let request = CapabilityRequest::new(CapabilityKind::SentimentClassifier, "whatever");
        let first = backend.invoke(request.clone()).await.unwrap();
        let second = backend.invoke(request).await.unwrap();
        assert_eq!(first.content, "negative");
        assert_eq!(second.content, "neutral");
    }

    #[tokio::test]
    async fn heuristic_covers_unscripted_kinds() {
        let backend = ScriptedCapability::new();
        let response = backend
            .invoke(CapabilityRequest::new(
                CapabilityKind::SupportTypeClassifier,
                "I want a refund for this charge",
            ))
            .await
            .unwrap();
        assert_eq!(response.content, "billing_or_refund");
        assert!(response.confidence < 0.5);
    }

    #[tokio::test]
    async fn strict_backend_errors_when_dry() {
        let backend = ScriptedCapability::strict();
        let result = backend
            .invoke(CapabilityRequest::new(CapabilityKind::Judge, "rate this"))
            .await;
        assert!(result.is_err());
    }
}
