// src/store/memory.rs

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::ExamError;
use crate::models::exam::ExamDefinition;
use crate::models::submission::{LiveSessionRecord, Submission};
use crate::store::ExamStore;

/// In-memory store used in tests and as a stand-in remote.
///
/// Every operation first consults a scripted failure queue, so tests
/// can make "the next N calls fail with a permission error" scenarios
/// deterministic, and counts calls so failover tests can assert that
/// zero further requests reached this store.
#[derive(Default)]
pub struct MemoryStore {
    exams: Mutex<HashMap<String, ExamDefinition>>,
    submissions: Mutex<HashMap<String, Submission>>,
    live_sessions: Mutex<HashMap<String, LiveSessionRecord>>,

    scripted_failures: Mutex<Vec<ExamError>>,
    calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exam(exam: ExamDefinition) -> Self {
        let store = Self::new();
        store
            .exams
            .lock()
            .unwrap()
            .insert(exam.id.clone(), exam);
        store
    }

    /// Queues errors returned by upcoming operations, oldest first.
    pub fn inject_failure(&self, error: ExamError) {
        self.scripted_failures.lock().unwrap().push(error);
    }

    /// Makes every subsequent operation fail with the given error.
    pub fn fail_forever(&self, error: ExamError) {
        let mut failures = self.scripted_failures.lock().unwrap();
        failures.clear();
        // A sentinel large enough that no test outlives it.
        for _ in 0..10_000 {
            failures.push(error.clone());
        }
    }

    /// Total operations attempted against this store, including ones
    /// that failed by script.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn stored_submission(&self, id: &str) -> Option<Submission> {
        self.submissions.lock().unwrap().get(id).cloned()
    }

    pub fn stored_live_session(&self, key: &str) -> Option<LiveSessionRecord> {
        self.live_sessions.lock().unwrap().get(key).cloned()
    }

    fn enter(&self) -> Result<(), ExamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut failures = self.scripted_failures.lock().unwrap();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.remove(0))
        }
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn get_exam(&self, id: &str) -> Result<Option<ExamDefinition>, ExamError> {
        self.enter()?;
        Ok(self.exams.lock().unwrap().get(id).cloned())
    }

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>, ExamError> {
        self.enter()?;
        Ok(self.submissions.lock().unwrap().get(id).cloned())
    }

    async fn list_submissions(&self, exam_id: &str) -> Result<Vec<Submission>, ExamError> {
        self.enter()?;
        Ok(self
            .submissions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn upsert_submission(&self, submission: &Submission) -> Result<(), ExamError> {
        self.enter()?;
        self.submissions
            .lock()
            .unwrap()
            .insert(submission.id.clone(), submission.clone());
        Ok(())
    }

    async fn delete_submission(&self, id: &str) -> Result<(), ExamError> {
        self.enter()?;
        self.submissions.lock().unwrap().remove(id);
        Ok(())
    }

    async fn list_live_sessions(
        &self,
        exam_id: &str,
    ) -> Result<Vec<LiveSessionRecord>, ExamError> {
        self.enter()?;
        Ok(self
            .live_sessions
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn upsert_live_session(&self, record: &LiveSessionRecord) -> Result<(), ExamError> {
        self.enter()?;
        self.live_sessions
            .lock()
            .unwrap()
            .insert(record.key(), record.clone());
        Ok(())
    }

    async fn delete_live_session(&self, key: &str) -> Result<(), ExamError> {
        self.enter()?;
        self.live_sessions.lock().unwrap().remove(key);
        Ok(())
    }
}
