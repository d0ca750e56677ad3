//! Prompt builders shared by the pipeline stages
//!
//! Each builder renders one capability request from a thread (plus tags
//! where the stage has them). Prompts always pin the allowed output labels
//! so the parsers in [`crate::parse`] have a closed vocabulary to match.

use support_nba_core::{
    Channel, ConversationThread, CustomerHistory, PersonalityType, Recommendation, Tag,
};

/// Joined customer-authored text, the classifier input.
fn customer_context(thread: &ConversationThread) -> String {
    thread.customer_text().join("\n")
}

/// Classify the nature of the support request into one of nine categories.
pub fn support_type(thread: &ConversationThread) -> String {
    format!(
        "Analyze this customer service conversation and classify the nature of \
the support request into ONE of these categories:\n\n\
1. technical_issue - Minor bugs, product glitches, or usage questions that \
don't block overall functionality.\n\
2. account_or_login - Problems with account access, login failures, \
verification, or password resets.\n\
3. billing_or_refund - Payment problems, unauthorized charges, refund \
demands, or subscription issues.\n\
4. escalated_complaint - Highly dissatisfied tone, demand for escalation or \
a manager, repeated failure, or public outrage.\n\
5. product_feedback - General praise, feature requests, or improvement \
suggestions.\n\
6. urgent_service_disruption - Critical service failure or outage (no \
internet, website down, flight cancelled).\n\
7. customer_grievance - Dissatisfaction, sarcasm, or emotional frustration \
without a clear technical or billing issue.\n\
8. order_or_delivery - Wrong, missing, or incomplete order, or delivery \
issues.\n\
9. other - Anything unrelated to the above: jokes, off-topic, marketing \
comments, or ambiguous sarcasm.\n\n\
Customer conversation:\n{}\n\n\
Respond with ONLY the category name (e.g., \"technical_issue\").",
        customer_context(thread)
    )
}

/// Classify the customer's overall sentiment across the conversation.
pub fn sentiment(thread: &ConversationThread) -> String {
    format!(
        "Analyze the overall sentiment of this customer in their conversation \
with customer service.\n\n\
Consider the customer's tone, language, satisfaction level, and emotional \
state throughout the conversation.\n\n\
Customer messages:\n{}\n\n\
Classify the overall customer sentiment as ONE of these categories:\n\
- positive: satisfied, pleased, grateful\n\
- negative: frustrated, angry, disappointed, upset\n\
- neutral: matter-of-fact, professional, or mixed/unclear emotions\n\n\
Respond with ONLY one word: \"positive\", \"negative\", or \"neutral\".",
        customer_context(thread)
    )
}

/// Determine where the conversation stands.
pub fn resolution(thread: &ConversationThread) -> String {
    format!(
        "Analyze this customer service conversation and determine its current \
status.\n\n\
Conversation:\n{}\n\n\
Classify the conversation status into ONE of these categories:\n\n\
1. \"resolved\" - The issue has been successfully resolved: the customer \
expresses satisfaction or confirms the problem is fixed, or both parties \
agree it is closed.\n\
2. \"open\" - The issue is not resolved: either party is still waiting on \
the other, the customer is still asking for help, or the company has asked \
for information and not heard back.\n\
3. \"escalated\" - The issue has been handed to a manager or specialist team \
and is still in progress.\n\n\
Respond with ONLY one word: \"resolved\", \"open\", or \"escalated\".",
        thread.transcript()
    )
}

/// Infer the customer's MBTI type from their writing.
pub fn personality(customer_text: &str) -> String {
    format!(
        "Analyze the writing style, tone, and content of these customer \
messages and classify the author's MBTI personality type.\n\n\
Customer messages:\n{customer_text}\n\n\
Respond with ONLY the four-letter MBTI type (e.g., \"INTJ\"). The sixteen \
valid types are: ENTJ, ENTP, ENFJ, ENFP, ESTJ, ESTP, ESFJ, ESFP, INTJ, \
INTP, INFJ, INFP, ISTJ, ISTP, ISFJ, ISFP."
    )
}

/// Draft the outbound reply for a chosen channel.
///
/// The baseline variant passes `personality: None`; the personality-aware
/// variant appends the MBTI communication guidance for the customer. The
/// history aggregate, when present, tells the generator what this customer's
/// past contacts looked like.
pub fn message(
    thread: &ConversationThread,
    tag: &Tag,
    channel: Channel,
    personality: Option<PersonalityType>,
    history: Option<&CustomerHistory>,
) -> String {
    let channel_hint = match channel {
        Channel::PhoneCall => {
            "a short message proposing a phone call and asking for a good time"
        }
        Channel::EmailReply => "a detailed, structured email reply",
        Channel::SocialReply => "a brief, friendly public social media reply",
    };

    let mut prompt = format!(
        "You are a customer support agent. Draft {channel_hint} for the \
customer below.\n\n\
Nature of support: {}\n\
Customer sentiment: {}\n\n\
Conversation so far:\n{}\n\n\
The message should be empathetic, specific to their issue, and provide \
clear next steps.",
        tag.support_type.value,
        tag.sentiment.value,
        thread.transcript()
    );

    if let Some(history) = history {
        prompt.push_str(&format!(
            "\n\nCustomer history: seen in {} tagged conversation(s)",
            history.threads
        ));
        if let Some(sentiment) = history.typical_sentiment {
            prompt.push_str(&format!("; most frequent sentiment: {sentiment}"));
        }
        if let Some(support_type) = history.typical_support_type {
            prompt.push_str(&format!("; most frequent issue type: {support_type}"));
        }
        prompt.push('.');
    }

    if let Some(personality) = personality {
        prompt.push_str(&format!(
            "\n\nThe customer's communication style is {personality}. {}",
            personality.communication_guidance()
        ));
    }

    prompt.push_str(
        "\n\nRespond in this exact JSON format:\n\
{\n    \"message\": \"the reply text\",\n    \"rationale\": \"why this \
channel, timing and message fit this customer\"\n}",
    );
    prompt
}

/// Judge a recommendation from the customer's perspective.
pub fn judge(thread: &ConversationThread, tag: &Tag, recommendation: &Recommendation) -> String {
    format!(
        "As a customer service evaluation expert, analyze the company's \
planned response and rate it from the customer's perspective, considering \
the full conversation history.\n\n\
Nature of support: {}\n\
Customer sentiment: {}\n\n\
Full conversation history:\n{}\n\n\
Planned channel: {}\n\
Planned message:\n{}\n\n\
Company's reasoning:\n{}\n\n\
Score each dimension from 1 to 5:\n\
- resolution_score: how much this response improves the likelihood the \
issue gets resolved (5 = fully addresses the issue with clear next steps, \
1 = does not address the issue or makes it worse)\n\
- tone_score: how appropriate the tone and channel are for this customer's \
situation and frustration level (5 = excellent fit, 1 = tone-deaf)\n\n\
Respond in this exact JSON format:\n\
{{\n    \"resolution_score\": 1-5,\n    \"tone_score\": 1-5,\n    \
\"evaluation\": \"brief summary of evaluation\"\n}}",
        tag.support_type.value,
        tag.sentiment.value,
        thread.transcript(),
        recommendation.channel,
        recommendation.message_text,
        recommendation.rationale
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use support_nba_core::{
        Label, MessageDirection, RawMessage, ResolutionStatus, Sentiment, SourceChannel,
        SupportType,
    };

    fn sample_thread() -> ConversationThread {
        ConversationThread::from_messages(
            "t1".into(),
            vec![
                RawMessage {
                    id: "t1".into(),
                    author: "alice".into(),
                    timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
                    text: "my bill is wrong".into(),
                    in_reply_to: None,
                    channel: SourceChannel::SocialMedia,
                    direction: MessageDirection::Customer,
                },
                RawMessage {
                    id: "t2".into(),
                    author: "support".into(),
                    timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap(),
                    text: "sorry to hear that".into(),
                    in_reply_to: Some("t1".into()),
                    channel: SourceChannel::SocialMedia,
                    direction: MessageDirection::Company,
                },
            ],
        )
    }

    fn sample_tag() -> Tag {
        Tag {
            thread_id: "t1".into(),
            version: 1,
            support_type: Label::certain(SupportType::BillingOrRefund),
            sentiment: Label::certain(Sentiment::Negative),
            resolution: Label::certain(ResolutionStatus::Open),
            personality: None,
        }
    }

    #[test]
    fn classifier_prompts_use_customer_text_only() {
        let thread = sample_thread();
        let prompt = support_type(&thread);
        assert!(prompt.contains("my bill is wrong"));
        assert!(!prompt.contains("sorry to hear that"));
        assert!(prompt.contains("billing_or_refund"));
    }

    #[test]
    fn resolution_prompt_uses_full_transcript() {
        let thread = sample_thread();
        let prompt = resolution(&thread);
        assert!(prompt.contains("sorry to hear that"));
        assert!(prompt.contains("\"escalated\""));
    }

    #[test]
    fn message_prompt_includes_guidance_when_personality_known() {
        let thread = sample_thread();
        let tag = sample_tag();
        let base = message(&thread, &tag, Channel::EmailReply, None, None);
        let aware = message(
            &thread,
            &tag,
            Channel::EmailReply,
            Some(PersonalityType::INTJ),
            None,
        );
        assert!(aware.len() > base.len());
        assert!(aware.contains("INTJ"));
    }

    #[test]
    fn message_prompt_cites_customer_history() {
        let thread = sample_thread();
        let tag = sample_tag();
        let history = CustomerHistory {
            threads: 3,
            typical_sentiment: Some(Sentiment::Negative),
            typical_support_type: Some(SupportType::BillingOrRefund),
        };
        let prompt = message(&thread, &tag, Channel::EmailReply, None, Some(&history));
        assert!(prompt.contains("3 tagged conversation(s)"));
        assert!(prompt.contains("most frequent sentiment: negative"));
        assert!(prompt.contains("most frequent issue type: billing_or_refund"));

        let without = message(&thread, &tag, Channel::EmailReply, None, None);
        assert!(!without.contains("Customer history"));
    }

    #[test]
    fn personality_prompt_lists_all_types() {
        let prompt = personality("some text");
        for t in ["ENTJ", "ISFP", "INFJ"] {
            assert!(prompt.contains(t));
        }
    }
}
