// src/models/submission.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::answer::GradedAnswer;

/// The final answer set handed to the grading collaborator.
///
/// Intended write-once: the id is a deterministic composite of exam
/// and student, so a duplicate commit upserts the same document
/// instead of creating a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub exam_id: String,
    pub student_id: String,
    pub student_name: String,
    pub student_nim: String,
    pub answers: Vec<GradedAnswer>,

    /// Equals the sum of answer scores, except on disqualification
    /// where it is forced to 0.
    pub total_score: u32,

    pub submitted_at: DateTime<Utc>,

    /// False until the external grader has scored the essays.
    pub is_graded: bool,

    pub violation_count: u32,
}

impl Submission {
    pub fn composite_id(exam_id: &str, student_id: &str) -> String {
        format!("{}_{}", exam_id, student_id)
    }
}

/// One row of the live monitoring board: "this student is currently
/// in this exam". Upserted under a deterministic key so repeated
/// pushes replace rather than accumulate; superseded by a Submission
/// once one exists for the pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSessionRecord {
    pub exam_id: String,
    pub student_id: String,
    pub student_name: String,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub violation_count: u32,
}

impl LiveSessionRecord {
    pub fn key(&self) -> String {
        Self::composite_key(&self.exam_id, &self.student_id)
    }

    pub fn composite_key(exam_id: &str, student_id: &str) -> String {
        format!("{}_{}", exam_id, student_id)
    }
}
