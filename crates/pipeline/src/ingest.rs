//! Raw record ingestion
//!
//! Accepts JSON arrays of raw records and the legacy tweet-export CSV
//! layout. Both produce permissive `RawRecord`s; validation and quarantine
//! happen in reconstruction, so a bad row never kills the batch.

use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use support_nba_core::{Error, RawRecord, Result, SourceChannel};

/// Load records from a file, dispatching on extension (.json or .csv).
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => read_json(path),
        Some("csv") => read_csv(path),
        other => Err(Error::MalformedInput(format!(
            "unsupported input extension {:?} for {}",
            other,
            path.display()
        ))),
    }
}

pub fn read_json(path: &Path) -> Result<Vec<RawRecord>> {
    let raw = std::fs::read_to_string(path)?;
    let records: Vec<RawRecord> = serde_json::from_str(&raw)
        .map_err(|e| Error::MalformedInput(format!("{}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), count = records.len(), "Loaded JSON records");
    Ok(records)
}

/// One row of the legacy tweet export.
#[derive(Debug, Deserialize)]
struct TweetRow {
    #[serde(default)]
    tweet_id: Option<String>,
    #[serde(default)]
    author_id: Option<String>,
    /// "True"/"False" in the export
    #[serde(default)]
    inbound: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    in_response_to_tweet_id: Option<String>,
}

impl From<TweetRow> for RawRecord {
    fn from(row: TweetRow) -> Self {
        let not_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        RawRecord {
            id: not_blank(row.tweet_id),
            author: not_blank(row.author_id),
            timestamp: not_blank(row.created_at),
            text: row.text,
            in_reply_to: not_blank(row.in_response_to_tweet_id),
            channel: Some(SourceChannel::SocialMedia),
            inbound: row
                .inbound
                .map(|v| v.trim().eq_ignore_ascii_case("true")),
        }
    }
}

pub fn read_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut records = Vec::new();
    let mut bad_rows = 0usize;
    for row in reader.deserialize::<TweetRow>() {
        match row {
            Ok(row) => records.push(RawRecord::from(row)),
            Err(e) => {
                // Push an empty record so the row shows up in quarantine
                // instead of silently vanishing.
                tracing::warn!(path = %path.display(), error = %e, "Unreadable CSV row");
                bad_rows += 1;
                records.push(RawRecord::default());
            }
        }
    }
    tracing::info!(
        path = %path.display(),
        count = records.len(),
        bad_rows,
        "Loaded CSV records"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_rows_map_to_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tweets.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            "tweet_id,author_id,inbound,created_at,text,response_tweet_id,in_response_to_tweet_id"
        )
        .unwrap();
        writeln!(
            file,
            "1,115712,True,Tue Oct 31 22:10:47 +0000 2017,@sprintcare is the worst,2,"
        )
        .unwrap();
        writeln!(
            file,
            "2,sprintcare,False,Tue Oct 31 22:11:45 +0000 2017,Please send us a DM,,1"
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_deref(), Some("1"));
        assert_eq!(records[0].inbound, Some(true));
        assert!(records[0].in_reply_to.is_none());
        assert_eq!(records[1].inbound, Some(false));
        assert_eq!(records[1].in_reply_to.as_deref(), Some("1"));
    }

    #[test]
    fn json_array_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(
            &path,
            r#"[{"id":"1","author":"alice","timestamp":"2024-03-01T10:00:00Z","text":"hi","extra_field":1}]"#,
        )
        .unwrap();
        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].author.as_deref(), Some("alice"));
    }

    #[test]
    fn unknown_extension_is_malformed_input() {
        assert!(load_records(Path::new("records.parquet")).is_err());
    }

    #[test]
    fn garbage_json_is_malformed_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not an array").unwrap();
        assert!(matches!(
            read_json(&path),
            Err(Error::MalformedInput(_))
        ));
    }
}
