//! Capability and lookup contracts
//!
//! Classification, generation and judgment are external, possibly
//! non-deterministic services. They all speak one contract so a hosted model,
//! a local model or a scripted stub can back any stage without the pipeline
//! noticing.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::Channel;
use crate::error::{Error, Result};

/// What a capability call is for. Carried on the request so backends can
/// route to different models or temperatures per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    SupportTypeClassifier,
    SentimentClassifier,
    ResolutionClassifier,
    PersonalityClassifier,
    MessageGenerator,
    Judge,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::SupportTypeClassifier => "support_type_classifier",
            CapabilityKind::SentimentClassifier => "sentiment_classifier",
            CapabilityKind::ResolutionClassifier => "resolution_classifier",
            CapabilityKind::PersonalityClassifier => "personality_classifier",
            CapabilityKind::MessageGenerator => "message_generator",
            CapabilityKind::Judge => "judge",
        }
    }
}

/// A single capability invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRequest {
    pub kind: CapabilityKind,
    pub prompt: String,
}

impl CapabilityRequest {
    pub fn new(kind: CapabilityKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
        }
    }
}

/// What comes back: free text (a label, a message, or judge JSON) plus the
/// backend's confidence in [0,1]. Backends without a confidence signal
/// report 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityResponse {
    pub content: String,
    pub confidence: f64,
}

impl CapabilityResponse {
    pub fn new(content: impl Into<String>, confidence: f64) -> Self {
        Self {
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// The uniform external-service contract.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Invoke the capability. Implementations own their timeout/retry
    /// policy; callers treat any error as terminal for the current thread.
    async fn invoke(&self, request: CapabilityRequest) -> Result<CapabilityResponse>;

    /// Backend label for logs.
    fn name(&self) -> &str;
}

/// Historical channel-effectiveness lookup, supplied to the decision engine
/// as an aggregate. Values are resolution rates in [0,1].
pub trait ChannelStats: Send + Sync {
    fn effectiveness(&self, channel: Channel) -> f64;
}

/// In-memory stats table. Missing channels fall back to a neutral 0.5.
#[derive(Debug, Clone, Default)]
pub struct FixedChannelStats {
    rates: HashMap<Channel, f64>,
}

impl FixedChannelStats {
    pub fn new(rates: HashMap<Channel, f64>) -> Self {
        Self { rates }
    }

    pub fn uniform() -> Self {
        Self::default()
    }

    pub fn set(&mut self, channel: Channel, rate: f64) {
        self.rates.insert(channel, rate.clamp(0.0, 1.0));
    }
}

impl ChannelStats for FixedChannelStats {
    fn effectiveness(&self, channel: Channel) -> f64 {
        self.rates.get(&channel).copied().unwrap_or(0.5)
    }
}

impl Error {
    /// Convenience constructor used by capability backends.
    pub fn capability(message: impl Into<String>) -> Self {
        Error::Capability(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_stats_default_to_neutral() {
        let stats = FixedChannelStats::uniform();
        assert_eq!(stats.effectiveness(Channel::PhoneCall), 0.5);

        let mut stats = FixedChannelStats::uniform();
        stats.set(Channel::EmailReply, 0.8);
        assert_eq!(stats.effectiveness(Channel::EmailReply), 0.8);
    }

    #[test]
    fn response_confidence_clamped() {
        let response = CapabilityResponse::new("negative", 1.4);
        assert_eq!(response.confidence, 1.0);
    }
}
