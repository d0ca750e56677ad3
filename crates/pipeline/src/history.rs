//! Customer history aggregates
//!
//! Rolls the tagged threads up per customer: how many threads they appear in
//! and their most frequent sentiment and support type. The decision engine
//! passes the aggregate into message generation so a reply to a repeat
//! contact reads like one.

use std::collections::HashMap;
use std::hash::Hash;

use support_nba_core::{ConversationThread, CustomerHistory, Tag};

/// Aggregate the latest tag per thread into per-customer histories.
///
/// Threads without a customer id or without a tag are skipped. Frequency
/// ties resolve to the label seen first in thread order, so re-runs over the
/// same artifacts agree.
pub fn customer_histories(
    threads: &[ConversationThread],
    tags: &HashMap<String, Tag>,
) -> HashMap<String, CustomerHistory> {
    let mut tagged: HashMap<String, Vec<&Tag>> = HashMap::new();
    for thread in threads {
        let Some(customer) = thread.customer_id.as_deref() else {
            continue;
        };
        let Some(tag) = tags.get(&thread.thread_id) else {
            continue;
        };
        tagged.entry(customer.to_string()).or_default().push(tag);
    }

    tagged
        .into_iter()
        .map(|(customer, tags)| {
            let history = CustomerHistory {
                threads: tags.len(),
                typical_sentiment: most_frequent(tags.iter().map(|t| t.sentiment.value)),
                typical_support_type: most_frequent(tags.iter().map(|t| t.support_type.value)),
            };
            (customer, history)
        })
        .collect()
}

/// Most frequent value; ties go to the value that appeared first.
fn most_frequent<T: Copy + Eq + Hash>(values: impl Iterator<Item = T>) -> Option<T> {
    let values: Vec<T> = values.collect();
    let mut counts: HashMap<T, usize> = HashMap::new();
    for value in &values {
        *counts.entry(*value).or_default() += 1;
    }

    let mut best: Option<(T, usize)> = None;
    for value in &values {
        let count = counts[value];
        match best {
            Some((_, n)) if n >= count => {}
            _ => best = Some((*value, count)),
        }
    }
    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use support_nba_core::{
        Label, MessageDirection, RawMessage, ResolutionStatus, Sentiment, SourceChannel,
        SupportType,
    };

    fn thread(id: &str, customer: &str) -> ConversationThread {
        ConversationThread::from_messages(
            id.to_string(),
            vec![RawMessage {
                id: id.to_string(),
                author: customer.to_string(),
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
                text: "help".into(),
                in_reply_to: None,
                channel: SourceChannel::SocialMedia,
                direction: MessageDirection::Customer,
            }],
        )
    }

    fn tag(thread_id: &str, sentiment: Sentiment, support_type: SupportType) -> (String, Tag) {
        (
            thread_id.to_string(),
            Tag {
                thread_id: thread_id.to_string(),
                version: 1,
                support_type: Label::certain(support_type),
                sentiment: Label::certain(sentiment),
                resolution: Label::certain(ResolutionStatus::Open),
                personality: None,
            },
        )
    }

    #[test]
    fn repeat_customer_gets_modal_labels() {
        let threads = vec![
            thread("t1", "alice"),
            thread("t2", "alice"),
            thread("t3", "alice"),
            thread("t4", "bob"),
        ];
        let tags: HashMap<String, Tag> = [
            tag("t1", Sentiment::Negative, SupportType::BillingOrRefund),
            tag("t2", Sentiment::Negative, SupportType::BillingOrRefund),
            tag("t3", Sentiment::Positive, SupportType::TechnicalIssue),
            tag("t4", Sentiment::Neutral, SupportType::Other),
        ]
        .into_iter()
        .collect();

        let histories = customer_histories(&threads, &tags);
        let alice = &histories["alice"];
        assert_eq!(alice.threads, 3);
        assert_eq!(alice.typical_sentiment, Some(Sentiment::Negative));
        assert_eq!(alice.typical_support_type, Some(SupportType::BillingOrRefund));

        let bob = &histories["bob"];
        assert_eq!(bob.threads, 1);
        assert_eq!(bob.typical_sentiment, Some(Sentiment::Neutral));
    }

    #[test]
    fn frequency_ties_keep_first_seen_label() {
        let threads = vec![thread("t1", "alice"), thread("t2", "alice")];
        let tags: HashMap<String, Tag> = [
            tag("t1", Sentiment::Neutral, SupportType::TechnicalIssue),
            tag("t2", Sentiment::Negative, SupportType::BillingOrRefund),
        ]
        .into_iter()
        .collect();

        let histories = customer_histories(&threads, &tags);
        assert_eq!(histories["alice"].typical_sentiment, Some(Sentiment::Neutral));
        assert_eq!(
            histories["alice"].typical_support_type,
            Some(SupportType::TechnicalIssue)
        );
    }

    #[test]
    fn untagged_threads_are_skipped() {
        let threads = vec![thread("t1", "alice"), thread("t2", "alice")];
        let tags: HashMap<String, Tag> =
            [tag("t1", Sentiment::Negative, SupportType::BillingOrRefund)]
                .into_iter()
                .collect();

        let histories = customer_histories(&threads, &tags);
        assert_eq!(histories["alice"].threads, 1);
    }
}
