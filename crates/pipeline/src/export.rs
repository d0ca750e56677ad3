//! CSV export
//!
//! Flattens recommendations joined with their threads into a review-friendly
//! CSV, including a rendered chat log with the recommended reply appended as
//! the final line.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use support_nba_core::{ConversationThread, Error, MessageDirection, Recommendation, Result};

fn csv_err(e: csv::Error) -> Error {
    Error::Io(std::io::Error::other(e))
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    thread_id: &'a str,
    customer_id: &'a str,
    policy: &'a str,
    channel: &'a str,
    send_time: String,
    objective_score: f64,
    message: &'a str,
    rationale: &'a str,
    chat_log: String,
}

fn chat_log(thread: &ConversationThread, recommended: &str) -> String {
    let mut lines: Vec<String> = thread
        .messages
        .iter()
        .map(|m| {
            let speaker = match m.direction {
                MessageDirection::Customer => "Customer",
                MessageDirection::Company => "Company",
            };
            format!("[{speaker}]: {}", m.text)
        })
        .collect();
    lines.push(format!("[Company - RECOMMENDED]: {recommended}"));
    lines.join("\n")
}

/// Write one row per recommendation. Recommendations whose thread is absent
/// are exported without a chat log rather than dropped.
pub fn export_csv(
    recommendations: &[Recommendation],
    threads: &[ConversationThread],
    path: &Path,
) -> Result<usize> {
    let by_id: HashMap<&str, &ConversationThread> = threads
        .iter()
        .map(|t| (t.thread_id.as_str(), t))
        .collect();

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    let mut rows = 0usize;
    for rec in recommendations {
        let thread = by_id.get(rec.thread_id.as_str());
        if thread.is_none() {
            tracing::warn!(thread_id = %rec.thread_id, "No thread found for recommendation");
        }
        let row = ExportRow {
            thread_id: &rec.thread_id,
            customer_id: thread
                .and_then(|t| t.customer_id.as_deref())
                .unwrap_or(""),
            policy: rec.policy.as_str(),
            channel: rec.channel.as_str(),
            send_time: rec.send_time.to_string(),
            objective_score: rec.objective_score,
            message: &rec.message_text,
            rationale: &rec.rationale,
            chat_log: thread
                .map(|t| chat_log(t, &rec.message_text))
                .unwrap_or_default(),
        };
        writer.serialize(row).map_err(csv_err)?;
        rows += 1;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows, "Exported recommendations");
    Ok(rows)
}
