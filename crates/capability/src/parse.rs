//! Capability response parsing
//!
//! Backends return free text. Parsers normalize it to the closed label
//! vocabulary, tolerating the noise models actually produce: list numbering,
//! surrounding quotes, case drift, prose around a JSON object.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use support_nba_core::{PersonalityType, ResolutionStatus, Sentiment, SupportType};

use crate::CapabilityError;

/// Strip list numbering, quotes and whitespace from a label reply.
fn normalize_label(raw: &str) -> String {
    static NUMBERING: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\d+\.\s*").expect("static regex"));
    let trimmed = raw.trim().trim_matches(['"', '\'', '`']).trim();
    NUMBERING.replace(trimmed, "").to_ascii_lowercase()
}

pub fn support_type(raw: &str) -> Result<SupportType, CapabilityError> {
    let label = normalize_label(raw);
    match label.as_str() {
        "technical_issue" => Ok(SupportType::TechnicalIssue),
        "account_or_login" => Ok(SupportType::AccountOrLogin),
        "billing_or_refund" => Ok(SupportType::BillingOrRefund),
        "escalated_complaint" => Ok(SupportType::EscalatedComplaint),
        "product_feedback" => Ok(SupportType::ProductFeedback),
        "urgent_service_disruption" => Ok(SupportType::UrgentServiceDisruption),
        "customer_grievance" => Ok(SupportType::CustomerGrievance),
        "order_or_delivery" => Ok(SupportType::OrderOrDelivery),
        "other" => Ok(SupportType::Other),
        _ => Err(CapabilityError::InvalidResponse(format!(
            "Unexpected support type label: {raw:?}"
        ))),
    }
}

pub fn sentiment(raw: &str) -> Result<Sentiment, CapabilityError> {
    match normalize_label(raw).as_str() {
        "positive" => Ok(Sentiment::Positive),
        "negative" => Ok(Sentiment::Negative),
        "neutral" => Ok(Sentiment::Neutral),
        _ => Err(CapabilityError::InvalidResponse(format!(
            "Unexpected sentiment label: {raw:?}"
        ))),
    }
}

pub fn resolution(raw: &str) -> Result<ResolutionStatus, CapabilityError> {
    match normalize_label(raw).as_str() {
        "resolved" => Ok(ResolutionStatus::Resolved),
        "open" => Ok(ResolutionStatus::Open),
        "escalated" => Ok(ResolutionStatus::Escalated),
        // Legacy labels from older tagging runs map onto open
        "waiting_for_customer" | "waiting_for_company" => Ok(ResolutionStatus::Open),
        _ => Err(CapabilityError::InvalidResponse(format!(
            "Unexpected resolution label: {raw:?}"
        ))),
    }
}

pub fn personality(raw: &str) -> Result<PersonalityType, CapabilityError> {
    let trimmed = raw.trim().trim_matches(['"', '\'', '`']).trim();
    PersonalityType::parse(trimmed).ok_or_else(|| {
        CapabilityError::InvalidResponse(format!("Unexpected MBTI label: {raw:?}"))
    })
}

/// Generator output: the reply text plus the model's stated rationale.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedReply {
    pub message: String,
    #[serde(default)]
    pub rationale: String,
}

pub fn generation(raw: &str) -> Result<GeneratedReply, CapabilityError> {
    let json = extract_json(raw).ok_or_else(|| {
        CapabilityError::InvalidResponse("No JSON object in generator response".to_string())
    })?;
    let reply: GeneratedReply = serde_json::from_str(json)
        .map_err(|e| CapabilityError::InvalidResponse(format!("Generator JSON: {e}")))?;
    if reply.message.trim().is_empty() {
        return Err(CapabilityError::InvalidResponse(
            "Generator returned an empty message".to_string(),
        ));
    }
    Ok(reply)
}

/// Judge output after normalization. Scores land in [0,1].
#[derive(Debug, Clone)]
pub struct Judgment {
    pub resolution_score: f64,
    pub tone_score: f64,
    pub evaluation: String,
}

#[derive(Debug, Deserialize)]
struct RawJudgment {
    resolution_score: f64,
    tone_score: f64,
    #[serde(default)]
    evaluation: String,
}

/// First JSON object embedded in the text, if any. Models often wrap the
/// object in prose or a code fence.
pub fn extract_json(raw: &str) -> Option<&str> {
    static OBJECT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex"));
    OBJECT.find(raw).map(|m| m.as_str())
}

/// Map a 1-5 judge score onto [0,1]. Out-of-range values are clamped.
fn normalize_score(score: f64) -> f64 {
    ((score.clamp(1.0, 5.0)) - 1.0) / 4.0
}

pub fn judgment(raw: &str) -> Result<Judgment, CapabilityError> {
    let json = extract_json(raw).ok_or_else(|| {
        CapabilityError::InvalidResponse("No JSON object in judge response".to_string())
    })?;
    let parsed: RawJudgment = serde_json::from_str(json)
        .map_err(|e| CapabilityError::InvalidResponse(format!("Judge JSON: {e}")))?;
    Ok(Judgment {
        resolution_score: normalize_score(parsed.resolution_score),
        tone_score: normalize_score(parsed.tone_score),
        evaluation: parsed.evaluation,
    })
}
