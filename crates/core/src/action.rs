//! Next-best-action recommendations, evaluations and comparisons

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outreach channel the engine chooses between.
///
/// Priority order for epsilon tie-breaks is fixed:
/// PhoneCall > EmailReply > SocialReply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    PhoneCall,
    EmailReply,
    SocialReply,
}

impl Channel {
    /// All channels in tie-break priority order.
    pub const PRIORITY: [Channel; 3] = [Channel::PhoneCall, Channel::EmailReply, Channel::SocialReply];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::PhoneCall => "phone_call",
            Channel::EmailReply => "email_reply",
            Channel::SocialReply => "social_reply",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "phone_call" => Some(Channel::PhoneCall),
            "email_reply" => Some(Channel::EmailReply),
            "social_reply" => Some(Channel::SocialReply),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// When to send, relative to the decision instant. Relative offsets keep the
/// decision deterministic; callers resolve against their own clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "minutes")]
pub enum SendTime {
    Immediate,
    /// Delay by this many minutes (cooldown against an active exchange)
    After(u32),
}

impl std::fmt::Display for SendTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendTime::Immediate => write!(f, "immediate"),
            SendTime::After(minutes) => write!(f, "after_{minutes}m"),
        }
    }
}

/// Which scoring policy produced a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyVariant {
    Baseline,
    PersonalityAware,
}

impl PolicyVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyVariant::Baseline => "baseline",
            PolicyVariant::PersonalityAware => "personality_aware",
        }
    }
}

impl std::fmt::Display for PolicyVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-signal contribution to the winning channel's objective score.
/// Kept on the record so the rationale is auditable after the fact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalBreakdown {
    pub sentiment_severity: f64,
    pub support_urgency: f64,
    pub elapsed: f64,
    pub channel_history: f64,
    pub personality_affinity: f64,
}

impl SignalBreakdown {
    /// Names of the signals that materially drove the score, strongest first.
    /// These are the names the rationale must cite.
    pub fn driving_signals(&self) -> Vec<&'static str> {
        let mut pairs = [
            ("sentiment", self.sentiment_severity),
            ("urgency", self.support_urgency),
            ("elapsed time", self.elapsed),
            ("channel history", self.channel_history),
            ("personality", self.personality_affinity),
        ];
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs
            .iter()
            .filter(|(_, v)| *v > 0.05)
            .take(3)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// An immutable next-best-action record. Superseded by re-running the
/// engine, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub thread_id: String,
    pub policy: PolicyVariant,
    pub channel: Channel,
    pub send_time: SendTime,
    pub message_text: String,
    pub rationale: String,
    /// Winning channel's objective score
    pub objective_score: f64,
    pub signals: SignalBreakdown,
}

/// The decision engine's outcome for one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Decision {
    Recommend(Recommendation),
    /// Defined no-op for resolved threads; not an error.
    NotActionable { thread_id: String, reason: String },
}

impl Decision {
    pub fn recommendation(&self) -> Option<&Recommendation> {
        match self {
            Decision::Recommend(rec) => Some(rec),
            Decision::NotActionable { .. } => None,
        }
    }
}

/// Judge scores for one recommendation. Read-only once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub recommendation_id: Uuid,
    pub thread_id: String,
    pub policy: PolicyVariant,
    /// Normalized composite in [0,1]
    pub quality_score: f64,
    /// Resolution-likelihood-improvement dimension, normalized
    pub resolution_score: f64,
    /// Tone/appropriateness dimension, normalized
    pub tone_score: f64,
    pub judgment: String,
    /// Verbatim judge outputs, one per sample
    pub raw_judgments: Vec<String>,
    /// Number of independent judge calls averaged into the scores
    pub samples: u32,
}

/// Structured result of comparing two policy variants on one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub thread_id: String,
    pub winner: PolicyVariant,
    /// Absolute quality_score difference
    pub margin: f64,
    pub resolution_delta: f64,
    pub tone_delta: f64,
    pub baseline_score: f64,
    pub variant_score: f64,
}
