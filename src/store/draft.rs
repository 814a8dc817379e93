// src/store/draft.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;

use crate::error::ExamError;
use crate::models::answer::DraftRecord;

/// Local durable storage for the crash-recovery draft, keyed by
/// `examId_studentId`. Always local: drafts never travel through the
/// persistence gateway and are untouched by failover.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<DraftRecord>, ExamError>;
    async fn save(&self, key: &str, draft: &DraftRecord) -> Result<(), ExamError>;
    async fn clear(&self, key: &str) -> Result<(), ExamError>;
}

/// One JSON file per draft key under a drafts directory.
pub struct JsonDraftStore {
    dir: PathBuf,
}

impl JsonDraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' || c == '.' { '_' } else { c })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl DraftStore for JsonDraftStore {
    async fn load(&self, key: &str) -> Result<Option<DraftRecord>, ExamError> {
        match fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, draft: &DraftRecord) -> Result<(), ExamError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(draft)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), ExamError> {
        match fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory draft store for tests.
#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: Mutex<HashMap<String, DraftRecord>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.drafts.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn load(&self, key: &str) -> Result<Option<DraftRecord>, ExamError> {
        Ok(self.drafts.lock().unwrap().get(key).cloned())
    }

    async fn save(&self, key: &str, draft: &DraftRecord) -> Result<(), ExamError> {
        self.drafts
            .lock()
            .unwrap()
            .insert(key.to_string(), draft.clone());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), ExamError> {
        self.drafts.lock().unwrap().remove(key);
        Ok(())
    }
}
