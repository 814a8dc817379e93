// src/store/file.rs

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;

use crate::error::ExamError;
use crate::models::exam::ExamDefinition;
use crate::models::submission::{LiveSessionRecord, Submission};
use crate::store::ExamStore;

const EXAMS_DIR: &str = "exams";
const SUBMISSIONS_DIR: &str = "submissions";
const LIVE_SESSIONS_DIR: &str = "live_sessions";

/// Durable local store: one JSON document per entity id, grouped in a
/// subdirectory per entity kind. This is the fallback side of the
/// persistence gateway and the thing that keeps a submission alive
/// when the remote store is gone.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entity_path(&self, kind: &str, id: &str) -> PathBuf {
        // Ids are composite keys under our control, but never let a
        // hostile id escape the store directory.
        let safe: String = id
            .chars()
            .map(|c| if c == '/' || c == '\\' || c == '.' { '_' } else { c })
            .collect();
        self.root.join(kind).join(format!("{}.json", safe))
    }

    async fn read_doc<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, ExamError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes via a temp file and rename so a crash mid-write never
    /// leaves a truncated document behind.
    async fn write_doc<T: Serialize>(&self, path: &Path, doc: &T) -> Result<(), ExamError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn delete_doc(&self, path: &Path) -> Result<(), ExamError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_docs<T: DeserializeOwned>(&self, kind: &str) -> Result<Vec<T>, ExamError> {
        let dir = self.root.join(kind);
        let mut out = Vec::new();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(doc) = self.read_doc(&path).await? {
                out.push(doc);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ExamStore for JsonFileStore {
    async fn get_exam(&self, id: &str) -> Result<Option<ExamDefinition>, ExamError> {
        self.read_doc(&self.entity_path(EXAMS_DIR, id)).await
    }

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>, ExamError> {
        self.read_doc(&self.entity_path(SUBMISSIONS_DIR, id)).await
    }

    async fn list_submissions(&self, exam_id: &str) -> Result<Vec<Submission>, ExamError> {
        let all: Vec<Submission> = self.list_docs(SUBMISSIONS_DIR).await?;
        Ok(all.into_iter().filter(|s| s.exam_id == exam_id).collect())
    }

    async fn upsert_submission(&self, submission: &Submission) -> Result<(), ExamError> {
        self.write_doc(&self.entity_path(SUBMISSIONS_DIR, &submission.id), submission)
            .await
    }

    async fn delete_submission(&self, id: &str) -> Result<(), ExamError> {
        self.delete_doc(&self.entity_path(SUBMISSIONS_DIR, id)).await
    }

    async fn list_live_sessions(
        &self,
        exam_id: &str,
    ) -> Result<Vec<LiveSessionRecord>, ExamError> {
        let all: Vec<LiveSessionRecord> = self.list_docs(LIVE_SESSIONS_DIR).await?;
        Ok(all.into_iter().filter(|r| r.exam_id == exam_id).collect())
    }

    async fn upsert_live_session(&self, record: &LiveSessionRecord) -> Result<(), ExamError> {
        self.write_doc(&self.entity_path(LIVE_SESSIONS_DIR, &record.key()), record)
            .await
    }

    async fn delete_live_session(&self, key: &str) -> Result<(), ExamError> {
        self.delete_doc(&self.entity_path(LIVE_SESSIONS_DIR, key))
            .await
    }
}
