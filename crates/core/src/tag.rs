//! Versioned thread tags
//!
//! A `Tag` is one classification pass over a thread. Tags are append-only:
//! re-tagging produces a new version, never an in-place update, so any prior
//! decision can be replayed against the tag it was made from.

use serde::{Deserialize, Serialize};

use crate::personality::PersonalityType;

/// Nature of the support request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportType {
    /// Minor bugs, glitches, usage questions
    TechnicalIssue,
    /// Access, login failures, verification, password resets
    AccountOrLogin,
    /// Payment problems, unauthorized charges, refunds, subscriptions
    BillingOrRefund,
    /// Demands for escalation, repeated failure, public outrage
    EscalatedComplaint,
    /// Praise, feature requests, suggestions
    ProductFeedback,
    /// Critical outage: no service, site down, flight cancelled
    UrgentServiceDisruption,
    /// Dissatisfaction or sarcasm without a concrete issue
    CustomerGrievance,
    /// Wrong, missing or incomplete order; delivery problems
    OrderOrDelivery,
    /// Off-topic, jokes, ambiguous
    Other,
}

impl SupportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportType::TechnicalIssue => "technical_issue",
            SupportType::AccountOrLogin => "account_or_login",
            SupportType::BillingOrRefund => "billing_or_refund",
            SupportType::EscalatedComplaint => "escalated_complaint",
            SupportType::ProductFeedback => "product_feedback",
            SupportType::UrgentServiceDisruption => "urgent_service_disruption",
            SupportType::CustomerGrievance => "customer_grievance",
            SupportType::OrderOrDelivery => "order_or_delivery",
            SupportType::Other => "other",
        }
    }

    /// Urgency class in [0,1], one of the decision-engine signals.
    pub fn urgency(&self) -> f64 {
        match self {
            SupportType::UrgentServiceDisruption | SupportType::EscalatedComplaint => 1.0,
            SupportType::BillingOrRefund | SupportType::AccountOrLogin => 0.7,
            SupportType::TechnicalIssue
            | SupportType::OrderOrDelivery
            | SupportType::CustomerGrievance => 0.5,
            SupportType::ProductFeedback | SupportType::Other => 0.2,
        }
    }
}

impl std::fmt::Display for SupportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Overall customer sentiment across the thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    /// Severity in [0,1]: how strongly the sentiment argues for action.
    pub fn severity(&self) -> f64 {
        match self {
            Sentiment::Negative => 1.0,
            Sentiment::Neutral => 0.5,
            Sentiment::Positive => 0.2,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the conversation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Unresolved and actionable; covers both parties waiting on each other
    Open,
    /// Issue confirmed resolved; no further action
    Resolved,
    /// Handed to a specialist team; still actionable
    Escalated,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Open => "open",
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::Escalated => "escalated",
        }
    }

    pub fn is_actionable(&self) -> bool {
        matches!(self, ResolutionStatus::Open | ResolutionStatus::Escalated)
    }
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified value with the classifier's confidence attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Label<T> {
    pub value: T,
    /// Classifier confidence in [0,1]
    pub confidence: f64,
    /// Set when confidence fell below the configured threshold; the decision
    /// engine down-weights uncertain signals instead of trusting them.
    pub uncertain: bool,
}

impl<T> Label<T> {
    pub fn new(value: T, confidence: f64, threshold: f64) -> Self {
        Self {
            value,
            confidence: confidence.clamp(0.0, 1.0),
            uncertain: confidence < threshold,
        }
    }

    /// A label asserted without a classifier (tests, ground truth feeds).
    pub fn certain(value: T) -> Self {
        Self {
            value,
            confidence: 1.0,
            uncertain: false,
        }
    }

    /// Signal weight multiplier: uncertain labels count at half strength.
    pub fn weight(&self) -> f64 {
        if self.uncertain {
            0.5
        } else {
            1.0
        }
    }
}

/// Per-customer aggregate over their tagged threads: how often they have
/// contacted support and what their contacts typically look like. Fed into
/// message generation so replies acknowledge repeat contacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerHistory {
    /// Tagged threads this customer appears in
    pub threads: usize,
    /// Most frequent sentiment across those threads
    pub typical_sentiment: Option<Sentiment>,
    /// Most frequent support type across those threads
    pub typical_support_type: Option<SupportType>,
}

/// One tagging pass over a thread. Append-only and versioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub thread_id: String,
    /// 1-based version; incremented per tagging pass over the same thread
    pub version: u32,
    pub support_type: Label<SupportType>,
    pub sentiment: Label<Sentiment>,
    pub resolution: Label<ResolutionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<Label<PersonalityType>>,
}

impl Tag {
    /// Any dimension below the confidence threshold.
    pub fn has_uncertainty(&self) -> bool {
        self.support_type.uncertain
            || self.sentiment.uncertain
            || self.resolution.uncertain
            || self.personality.map(|p| p.uncertain).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_classes() {
        assert_eq!(SupportType::UrgentServiceDisruption.urgency(), 1.0);
        assert_eq!(SupportType::BillingOrRefund.urgency(), 0.7);
        assert_eq!(SupportType::ProductFeedback.urgency(), 0.2);
    }

    #[test]
    fn label_threshold_marks_uncertain() {
        let label = Label::new(Sentiment::Negative, 0.4, 0.5);
        assert!(label.uncertain);
        assert_eq!(label.weight(), 0.5);

        let label = Label::new(Sentiment::Negative, 0.9, 0.5);
        assert!(!label.uncertain);
        assert_eq!(label.weight(), 1.0);
    }

    #[test]
    fn confidence_is_clamped() {
        let label = Label::new(Sentiment::Neutral, 1.7, 0.5);
        assert_eq!(label.confidence, 1.0);
    }

    #[test]
    fn resolved_is_not_actionable() {
        assert!(ResolutionStatus::Open.is_actionable());
        assert!(ResolutionStatus::Escalated.is_actionable());
        assert!(!ResolutionStatus::Resolved.is_actionable());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&SupportType::BillingOrRefund).unwrap();
        assert_eq!(json, "\"billing_or_refund\"");
    }
}
