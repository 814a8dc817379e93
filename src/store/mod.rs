// src/store/mod.rs

pub mod draft;
pub mod file;
pub mod memory;
pub mod remote;

use async_trait::async_trait;

use crate::error::ExamError;
use crate::models::exam::ExamDefinition;
use crate::models::submission::{LiveSessionRecord, Submission};

/// Backing store for the three entity kinds the runtime touches.
///
/// Exams are read-only here (the authoring collaborator owns them);
/// submissions and live sessions are written with last-write-wins
/// upsert semantics keyed by entity id.
#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn get_exam(&self, id: &str) -> Result<Option<ExamDefinition>, ExamError>;

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>, ExamError>;
    async fn list_submissions(&self, exam_id: &str) -> Result<Vec<Submission>, ExamError>;
    async fn upsert_submission(&self, submission: &Submission) -> Result<(), ExamError>;
    async fn delete_submission(&self, id: &str) -> Result<(), ExamError>;

    async fn list_live_sessions(&self, exam_id: &str)
    -> Result<Vec<LiveSessionRecord>, ExamError>;
    async fn upsert_live_session(&self, record: &LiveSessionRecord) -> Result<(), ExamError>;
    async fn delete_live_session(&self, key: &str) -> Result<(), ExamError>;
}
