// src/models/answer.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::identity::Identity;

/// A student's in-progress answer to one question.
///
/// Tagged by question kind so an answer can never carry both a
/// selected option and essay text. Serialized untagged, which keeps
/// the wire shape at `{selectedOptionIndex}` or `{essayText}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerDraft {
    #[serde(rename_all = "camelCase")]
    MultipleChoice { selected_option_index: usize },

    #[serde(rename_all = "camelCase")]
    Essay { essay_text: String },
}

/// An answer with its score, as stored on a submission.
/// `answer` flattens into the same object, so the wire shape is
/// `{questionId, selectedOptionIndex?|essayText?, score, feedback?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub question_id: String,

    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerDraft>,

    pub score: u32,

    /// Filled in by the external grading collaborator for essays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// The locally-persisted crash-recovery snapshot: every draft answer
/// keyed by question id, plus the identity entered so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    pub answers: HashMap<String, AnswerDraft>,
    pub identity: Identity,
}
