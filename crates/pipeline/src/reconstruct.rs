//! Thread reconstruction
//!
//! Turns a batch of raw export records into deduplicated, chronologically
//! ordered conversation threads. Records that fail validation are
//! quarantined, reply cycles are broken and reported as anomalies, and
//! rootless messages are linked by a participant/time heuristic. Every
//! non-quarantined message lands in exactly one thread.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use support_nba_core::{ConversationThread, QuarantinedRecord, RawMessage, RawRecord};

/// A structural defect found in the reply graph. Recorded, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralAnomaly {
    pub kind: AnomalyKind,
    /// Messages involved, in walk order
    pub message_ids: Vec<String>,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Reply references formed a cycle; the chain was cut and all cycle
    /// members kept in one thread
    CycleBroken,
    /// A reply referenced a message absent from the batch; the chain was
    /// rooted at its deepest resolvable ancestor
    DanglingParent,
}

/// Everything reconstruction produced from one batch.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReconstructionReport {
    pub threads: Vec<ConversationThread>,
    pub quarantined: Vec<QuarantinedRecord>,
    pub anomalies: Vec<StructuralAnomaly>,
    /// Input records dropped as duplicates (by id or by content)
    pub duplicates_dropped: usize,
}

/// Reconstruct threads from raw records.
///
/// `link_window` bounds the fallback heuristic: a rootless message may join
/// an open two-party thread only when it arrives within this window of the
/// thread's last message.
pub fn reconstruct(records: Vec<RawRecord>, link_window: Duration) -> ReconstructionReport {
    let total = records.len();

    // Validate, quarantining records that cannot be promoted
    let mut quarantined = Vec::new();
    let mut messages: Vec<RawMessage> = Vec::with_capacity(records.len());
    for record in records {
        match RawMessage::from_record(record) {
            Ok(message) => messages.push(message),
            Err(rejected) => {
                tracing::warn!(reason = %rejected.reason, "Quarantined record");
                quarantined.push(rejected);
            }
        }
    }

    // Dedup by id (first occurrence wins), then by content key: resends that
    // got fresh ids collapse to the first copy.
    let mut seen_ids = HashSet::new();
    let mut seen_content = HashSet::new();
    let mut duplicates_dropped = 0;
    messages.retain(|m| {
        let fresh = seen_ids.insert(m.id.clone()) && seen_content.insert(m.content_key());
        if !fresh {
            duplicates_dropped += 1;
        }
        fresh
    });

    let by_id: HashMap<String, RawMessage> =
        messages.iter().map(|m| (m.id.clone(), m.clone())).collect();

    // Resolve each message to its thread root
    let mut resolver = RootResolver::new(&by_id);
    let mut groups: BTreeMap<String, Vec<RawMessage>> = BTreeMap::new();
    for message in &messages {
        let root = resolver.resolve(&message.id);
        groups.entry(root).or_default().push(message.clone());
    }
    let anomalies = resolver.anomalies;

    // Split singleton rootless groups from everything with explicit structure
    let mut threads = Vec::new();
    let mut loose: Vec<RawMessage> = Vec::new();
    for (root, group) in groups {
        let rootless_singleton = group.len() == 1 && group[0].in_reply_to.is_none();
        if rootless_singleton {
            loose.extend(group);
        } else {
            threads.push(ConversationThread::from_messages(root, group));
        }
    }

    // Fallback heuristic: chain rootless messages into open two-party
    // threads when they arrive close enough together.
    threads.extend(link_loose_messages(loose, link_window));

    threads.sort_by(|a, b| a.thread_id.cmp(&b.thread_id));
    tracing::info!(
        input = total,
        threads = threads.len(),
        quarantined = quarantined.len(),
        anomalies = anomalies.len(),
        duplicates = duplicates_dropped,
        "Reconstruction complete"
    );

    ReconstructionReport {
        threads,
        quarantined,
        anomalies,
        duplicates_dropped,
    }
}

/// Walks reply chains to their roots with cycle and dangling-parent defense.
struct RootResolver<'a> {
    by_id: &'a HashMap<String, RawMessage>,
    memo: HashMap<String, String>,
    /// Missing parent id -> root chosen for its orphaned replies, so
    /// siblings of one absent message stay in one thread
    dangling: HashMap<String, String>,
    anomalies: Vec<StructuralAnomaly>,
}

impl<'a> RootResolver<'a> {
    fn new(by_id: &'a HashMap<String, RawMessage>) -> Self {
        Self {
            by_id,
            memo: HashMap::new(),
            dangling: HashMap::new(),
            anomalies: Vec::new(),
        }
    }

    fn resolve(&mut self, id: &str) -> String {
        if let Some(root) = self.memo.get(id) {
            return root.clone();
        }

        let mut path: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = id.to_string();

        let root = loop {
            if let Some(root) = self.memo.get(&current) {
                break root.clone();
            }
            visited.insert(current.clone());
            path.push(current.clone());

            let parent = self
                .by_id
                .get(&current)
                .and_then(|m| m.in_reply_to.clone());

            match parent {
                None => break current,
                Some(parent) if visited.contains(&parent) => {
                    // Cycle: cut the chain and root every member at the
                    // smallest id in the cycle so they stay together.
                    let start = path
                        .iter()
                        .position(|p| *p == parent)
                        .unwrap_or(0);
                    let cycle: Vec<String> = path[start..].to_vec();
                    let root = cycle
                        .iter()
                        .min()
                        .cloned()
                        .unwrap_or_else(|| current.clone());
                    tracing::warn!(root = %root, members = cycle.len(), "Reply cycle broken");
                    self.anomalies.push(StructuralAnomaly {
                        kind: AnomalyKind::CycleBroken,
                        message_ids: cycle,
                        detail: format!("reply cycle re-entered at {parent}"),
                    });
                    break root;
                }
                Some(parent) if !self.by_id.contains_key(&parent) => {
                    // Dangling reference: root at the deepest message we
                    // actually have. Siblings replying to the same missing
                    // parent share the first sibling's root.
                    tracing::debug!(at = %current, missing = %parent, "Dangling parent reference");
                    self.anomalies.push(StructuralAnomaly {
                        kind: AnomalyKind::DanglingParent,
                        message_ids: vec![current.clone()],
                        detail: format!("parent {parent} not in batch"),
                    });
                    break self
                        .dangling
                        .entry(parent)
                        .or_insert_with(|| current.clone())
                        .clone();
                }
                Some(parent) => current = parent,
            }
        };

        for node in path {
            self.memo.insert(node, root.clone());
        }
        root
    }
}

/// Attach rootless singletons to open heuristic threads. A message joins a
/// thread only when the combined participant set stays at two or fewer and
/// it falls inside the link window; otherwise it opens a new thread.
fn link_loose_messages(mut loose: Vec<RawMessage>, window: Duration) -> Vec<ConversationThread> {
    loose.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let mut open: Vec<Vec<RawMessage>> = Vec::new();
    for message in loose {
        let joined = open.iter_mut().find(|group| {
            let last = match group.last() {
                Some(last) => last,
                None => return false,
            };
            if message.timestamp - last.timestamp > window {
                return false;
            }
            let mut participants: HashSet<&str> =
                group.iter().map(|m| m.author.as_str()).collect();
            participants.insert(message.author.as_str());
            participants.len() <= 2
        });
        match joined {
            Some(group) => group.push(message),
            None => open.push(vec![message]),
        }
    }

    open.into_iter()
        .map(|group| {
            let root = group
                .first()
                .map(|m| m.id.clone())
                .unwrap_or_default();
            ConversationThread::from_messages(root, group)
        })
        .collect()
}
