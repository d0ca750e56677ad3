//! Stage artifact store
//!
//! One JSON file per stage under the artifacts directory. Each stage is
//! re-creatable from the previous file, which makes the commands idempotent
//! and a run resumable. Tags and recommendations are append-only: a re-run
//! adds records, never rewrites history.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use support_nba_core::{
    Comparison, ConversationThread, Error, Evaluation, QuarantinedRecord, RawRecord,
    Recommendation, Result, Tag,
};

use crate::reconstruct::{ReconstructionReport, StructuralAnomaly};

const RECORDS: &str = "records.json";
const THREADS: &str = "threads.json";
const QUARANTINE: &str = "quarantine.json";
const ANOMALIES: &str = "anomalies.json";
const TAGS: &str = "tags.json";
const RECOMMENDATIONS: &str = "recommendations.json";
const EVALUATIONS: &str = "evaluations.json";
const COMPARISONS: &str = "comparisons.json";

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Missing files read as empty collections so first runs and re-runs
    /// share one code path.
    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| Error::InvalidArtifact {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Write through a sibling temp file so a crash never leaves a torn
    /// artifact behind.
    fn write<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(name);
        let tmp = self.path(&format!("{name}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), count = items.len(), "Wrote artifact");
        Ok(())
    }

    pub fn save_records(&self, records: &[RawRecord]) -> Result<()> {
        self.write(RECORDS, records)
    }

    pub fn load_records(&self) -> Result<Vec<RawRecord>> {
        self.read(RECORDS)
    }

    pub fn save_reconstruction(&self, report: &ReconstructionReport) -> Result<()> {
        self.write(THREADS, &report.threads)?;
        self.write(QUARANTINE, &report.quarantined)?;
        self.write(ANOMALIES, &report.anomalies)
    }

    pub fn load_threads(&self) -> Result<Vec<ConversationThread>> {
        self.read(THREADS)
    }

    pub fn save_threads(&self, threads: &[ConversationThread]) -> Result<()> {
        self.write(THREADS, threads)
    }

    pub fn load_quarantine(&self) -> Result<Vec<QuarantinedRecord>> {
        self.read(QUARANTINE)
    }

    pub fn load_anomalies(&self) -> Result<Vec<StructuralAnomaly>> {
        self.read(ANOMALIES)
    }

    pub fn load_tags(&self) -> Result<Vec<Tag>> {
        self.read(TAGS)
    }

    /// Append new tag versions; existing records are never touched.
    pub fn append_tags(&self, new: &[Tag]) -> Result<()> {
        let mut tags = self.load_tags()?;
        tags.extend(new.iter().cloned());
        self.write(TAGS, &tags)
    }

    /// Highest stored version per thread, for picking the next version and
    /// for decisions that want the freshest tag.
    pub fn latest_tags(&self) -> Result<std::collections::HashMap<String, Tag>> {
        let mut latest: std::collections::HashMap<String, Tag> = std::collections::HashMap::new();
        for tag in self.load_tags()? {
            match latest.get(&tag.thread_id) {
                Some(existing) if existing.version >= tag.version => {}
                _ => {
                    latest.insert(tag.thread_id.clone(), tag);
                }
            }
        }
        Ok(latest)
    }

    pub fn load_recommendations(&self) -> Result<Vec<Recommendation>> {
        self.read(RECOMMENDATIONS)
    }

    /// Append-only; superseded recommendations stay on record.
    pub fn append_recommendations(&self, new: &[Recommendation]) -> Result<()> {
        let mut recommendations = self.load_recommendations()?;
        recommendations.extend(new.iter().cloned());
        self.write(RECOMMENDATIONS, &recommendations)
    }

    pub fn load_evaluations(&self) -> Result<Vec<Evaluation>> {
        self.read(EVALUATIONS)
    }

    pub fn save_evaluations(&self, evaluations: &[Evaluation]) -> Result<()> {
        self.write(EVALUATIONS, evaluations)
    }

    pub fn load_comparisons(&self) -> Result<Vec<Comparison>> {
        self.read(COMPARISONS)
    }

    pub fn save_comparisons(&self, comparisons: &[Comparison]) -> Result<()> {
        self.write(COMPARISONS, comparisons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use support_nba_core::{
        Label, MessageDirection, RawMessage, ResolutionStatus, Sentiment, SourceChannel,
        SupportType,
    };

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("data"));
        (dir, store)
    }

    fn thread(id: &str) -> ConversationThread {
        ConversationThread::from_messages(
            id.to_string(),
            vec![RawMessage {
                id: id.to_string(),
                author: "alice".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
                text: "help".into(),
                in_reply_to: None,
                channel: SourceChannel::SocialMedia,
                direction: MessageDirection::Customer,
            }],
        )
    }

    fn tag(thread_id: &str, version: u32) -> Tag {
        Tag {
            thread_id: thread_id.to_string(),
            version,
            support_type: Label::certain(SupportType::TechnicalIssue),
            sentiment: Label::certain(Sentiment::Neutral),
            resolution: Label::certain(ResolutionStatus::Open),
            personality: None,
        }
    }

    #[test]
    fn missing_artifacts_read_empty() {
        let (_dir, store) = store();
        assert!(store.load_threads().unwrap().is_empty());
        assert!(store.load_tags().unwrap().is_empty());
    }

    #[test]
    fn threads_round_trip() {
        let (_dir, store) = store();
        store.save_threads(&[thread("t1"), thread("t2")]).unwrap();
        let loaded = store.load_threads().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].thread_id, "t1");
    }

    #[test]
    fn tags_append_without_rewriting() {
        let (_dir, store) = store();
        store.append_tags(&[tag("t1", 1)]).unwrap();
        store.append_tags(&[tag("t1", 2), tag("t2", 1)]).unwrap();

        let all = store.load_tags().unwrap();
        assert_eq!(all.len(), 3);

        let latest = store.latest_tags().unwrap();
        assert_eq!(latest["t1"].version, 2);
        assert_eq!(latest["t2"].version, 1);
    }

    #[test]
    fn corrupt_artifact_is_reported_with_path() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.path(TAGS), "not json").unwrap();
        let err = store.load_tags().unwrap_err();
        match err {
            Error::InvalidArtifact { path, .. } => assert!(path.ends_with("tags.json")),
            other => panic!("expected InvalidArtifact, got {other}"),
        }
    }
}
