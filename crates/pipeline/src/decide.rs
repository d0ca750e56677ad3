//! Decision engine
//!
//! Picks the next best action for a tagged thread: channel, timing, message
//! and rationale. Channel, timing and score are a pure function of the
//! inputs and `as_of`; only the message/rationale text comes from the
//! generation capability, with a deterministic template as fallback.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use support_nba_capability::{parse, prompt};
use support_nba_config::DecisionWeights;
use support_nba_core::{
    Capability, CapabilityKind, CapabilityRequest, Channel, ChannelStats, ConversationThread,
    CustomerHistory, Decision, PersonalityType, PolicyVariant, Recommendation, Result,
    SendTime, SignalBreakdown, Tag,
};

/// Everything the engine needs besides the thread and its tag.
#[derive(Clone)]
pub struct DecisionContext {
    pub policy: PolicyVariant,
    pub weights: DecisionWeights,
    /// Scores within this of the leader tie-break on channel priority
    pub epsilon: f64,
    pub cooldown_minutes: u32,
    pub stats: Arc<dyn ChannelStats>,
    /// Decision instant; elapsed-time signals are relative to this
    pub as_of: DateTime<Utc>,
    /// Message generator; None means templated output only
    pub generator: Option<Arc<dyn Capability>>,
    /// This customer's aggregate over past tagged threads, for generation
    /// context
    pub customer_history: Option<CustomerHistory>,
}

impl DecisionContext {
    /// Personality context applies only to the personality-aware policy and
    /// only when the tag carries a personality label.
    fn personality(&self, tag: &Tag) -> Option<(PersonalityType, f64)> {
        if self.policy != PolicyVariant::PersonalityAware {
            return None;
        }
        tag.personality.map(|label| (label.value, label.weight()))
    }
}

/// Elapsed-time signal: hours since the last customer message, saturating
/// at one day. A thread waiting longer argues harder for action.
fn elapsed_signal(thread: &ConversationThread, as_of: DateTime<Utc>) -> f64 {
    let Some(last) = thread.last_customer_activity() else {
        return 0.0;
    };
    let hours = (as_of - last).num_minutes().max(0) as f64 / 60.0;
    (hours / 24.0).min(1.0)
}

/// Weighted per-signal contributions for one candidate channel.
fn score_channel(
    channel: Channel,
    thread: &ConversationThread,
    tag: &Tag,
    ctx: &DecisionContext,
) -> (f64, SignalBreakdown) {
    let w = &ctx.weights;
    let weight_sum = w.severity + w.urgency + w.elapsed + w.history + w.personality;

    let breakdown = SignalBreakdown {
        sentiment_severity: w.severity
            * tag.sentiment.value.severity()
            * tag.sentiment.weight(),
        support_urgency: w.urgency
            * tag.support_type.value.urgency()
            * tag.support_type.weight(),
        elapsed: w.elapsed * elapsed_signal(thread, ctx.as_of),
        channel_history: w.history * ctx.stats.effectiveness(channel),
        personality_affinity: ctx
            .personality(tag)
            .map(|(p, label_weight)| {
                w.personality * p.channel_affinity(channel) * label_weight
            })
            .unwrap_or(0.0),
    };

    let score = (breakdown.sentiment_severity
        + breakdown.support_urgency
        + breakdown.elapsed
        + breakdown.channel_history
        + breakdown.personality_affinity)
        / weight_sum;
    (score, breakdown)
}

/// Argmax over channels with epsilon tie-break in fixed priority order.
fn pick_channel(
    thread: &ConversationThread,
    tag: &Tag,
    ctx: &DecisionContext,
) -> (Channel, f64, SignalBreakdown) {
    let scored: Vec<(Channel, f64, SignalBreakdown)> = Channel::PRIORITY
        .iter()
        .map(|&c| {
            let (score, breakdown) = score_channel(c, thread, tag, ctx);
            (c, score, breakdown)
        })
        .collect();

    let best = scored
        .iter()
        .map(|(_, s, _)| *s)
        .fold(f64::NEG_INFINITY, f64::max);

    // PRIORITY is already ordered, so the first within epsilon wins the tie
    scored
        .into_iter()
        .find(|(_, score, _)| *score >= best - ctx.epsilon)
        .unwrap_or_else(|| (Channel::PhoneCall, 0.0, SignalBreakdown::default()))
}

fn pick_send_time(thread: &ConversationThread, ctx: &DecisionContext) -> SendTime {
    // The cooldown exists to avoid looking automated mid-exchange; a thread
    // the company has never answered should not wait at all.
    if !thread.company_has_replied() {
        return SendTime::Immediate;
    }
    let Some(last) = thread.last_customer_activity() else {
        return SendTime::Immediate;
    };
    let minutes_since = (ctx.as_of - last).num_minutes();
    if minutes_since >= 0 && (minutes_since as u32) < ctx.cooldown_minutes {
        // Mid-exchange; replying instantly reads as automated
        SendTime::After(ctx.cooldown_minutes)
    } else {
        SendTime::Immediate
    }
}

fn templated_message(channel: Channel, tag: &Tag) -> String {
    let issue = tag.support_type.value.as_str().replace('_', " ");
    match channel {
        Channel::PhoneCall => format!(
            "We're sorry about the {issue} you're dealing with. We'd like to \
get this sorted on a quick call; when would be a good time to reach you?"
        ),
        Channel::EmailReply => format!(
            "Thank you for flagging this {issue}. We've sent a detailed \
follow-up to your email with the next steps to get it resolved."
        ),
        Channel::SocialReply => format!(
            "Sorry about the {issue}! We're on it; please check your DMs so \
we can get the details and fix this for you."
        ),
    }
}

fn templated_rationale(
    channel: Channel,
    send_time: SendTime,
    signals: &SignalBreakdown,
) -> String {
    let driving = signals.driving_signals();
    let cited = if driving.is_empty() {
        "no strong signals".to_string()
    } else {
        driving.join(", ")
    };
    format!(
        "Chose {channel} ({send_time}) based on the strongest signals: {cited}."
    )
}

/// Rationale must name every driving signal; a rationale that doesn't is
/// replaced rather than trusted.
fn cites_driving_signals(rationale: &str, signals: &SignalBreakdown) -> bool {
    let lower = rationale.to_ascii_lowercase();
    signals
        .driving_signals()
        .iter()
        .all(|name| lower.contains(name))
}

async fn generate_reply(
    thread: &ConversationThread,
    tag: &Tag,
    channel: Channel,
    ctx: &DecisionContext,
) -> Option<parse::GeneratedReply> {
    let generator = ctx.generator.as_ref()?;
    let personality = ctx.personality(tag).map(|(p, _)| p);
    let request = CapabilityRequest::new(
        CapabilityKind::MessageGenerator,
        prompt::message(
            thread,
            tag,
            channel,
            personality,
            ctx.customer_history.as_ref(),
        ),
    );
    match generator.invoke(request).await {
        Ok(response) => match parse::generation(&response.content) {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!(thread_id = %thread.thread_id, error = %e,
                    "Generator output unusable, using template");
                None
            }
        },
        Err(e) => {
            tracing::warn!(thread_id = %thread.thread_id, error = %e,
                "Generation failed, using template");
            None
        }
    }
}

/// Decide the next best action for one tagged thread.
///
/// Resolved threads yield `Decision::NotActionable`, a defined no-op.
pub async fn decide(
    thread: &ConversationThread,
    tag: &Tag,
    ctx: &DecisionContext,
) -> Result<Decision> {
    if !tag.resolution.value.is_actionable() {
        tracing::debug!(thread_id = %thread.thread_id, "Thread not actionable");
        return Ok(Decision::NotActionable {
            thread_id: thread.thread_id.clone(),
            reason: format!("resolution status is {}", tag.resolution.value),
        });
    }

    let (channel, objective_score, signals) = pick_channel(thread, tag, ctx);
    let send_time = pick_send_time(thread, ctx);

    let generated = generate_reply(thread, tag, channel, ctx).await;
    let (message_text, rationale) = match generated {
        Some(reply) => {
            let rationale = if cites_driving_signals(&reply.rationale, &signals) {
                reply.rationale
            } else {
                templated_rationale(channel, send_time, &signals)
            };
            (reply.message, rationale)
        }
        None => (
            templated_message(channel, tag),
            templated_rationale(channel, send_time, &signals),
        ),
    };

    let recommendation = Recommendation {
        id: Uuid::new_v4(),
        thread_id: thread.thread_id.clone(),
        policy: ctx.policy,
        channel,
        send_time,
        message_text,
        rationale,
        objective_score,
        signals,
    };
    tracing::info!(
        thread_id = %recommendation.thread_id,
        policy = %recommendation.policy,
        channel = %recommendation.channel,
        send_time = %recommendation.send_time,
        score = recommendation.objective_score,
        "Decided next best action"
    );
    Ok(Decision::Recommend(recommendation))
}
