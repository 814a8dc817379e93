// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::answer::AnswerDraft;

/// An exam as published by the authoring collaborator.
/// Immutable for the lifetime of a session; the runtime only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDefinition {
    pub id: String,
    pub title: String,
    pub course_name: String,
    pub questions: Vec<Question>,

    /// Access window bounds, ISO-8601 UTC on the wire.
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ExamDefinition {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Whether `at` falls inside the `[start_time, end_time)` access
    /// window during which a session may run.
    pub fn access_window_contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start_time && at < self.end_time
    }
}

/// A single exam question. The type-specific payload is flattened so
/// the wire shape stays `{id, text, type, points, options?,
/// correctOptionIndex?, referenceAnswer?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub points: u32,
    #[serde(flatten)]
    pub payload: QuestionPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuestionPayload {
    #[serde(rename = "MULTIPLE_CHOICE", rename_all = "camelCase")]
    MultipleChoice {
        options: Vec<String>,
        correct_option_index: usize,
    },

    #[serde(rename = "ESSAY", rename_all = "camelCase")]
    Essay {
        /// Reference answer for the external grading collaborator.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference_answer: Option<String>,
    },
}

impl Question {
    /// Whether a draft answer is of the right kind for this question.
    pub fn accepts(&self, answer: &AnswerDraft) -> bool {
        matches!(
            (&self.payload, answer),
            (
                QuestionPayload::MultipleChoice { .. },
                AnswerDraft::MultipleChoice { .. }
            ) | (QuestionPayload::Essay { .. }, AnswerDraft::Essay { .. })
        )
    }

    /// Scores a draft answer at submit time.
    ///
    /// Multiple choice is graded by index equality against the
    /// correct option. Essays score 0 here; they are graded later by
    /// the external grading collaborator.
    pub fn grade(&self, answer: Option<&AnswerDraft>) -> u32 {
        match (&self.payload, answer) {
            (
                QuestionPayload::MultipleChoice {
                    correct_option_index,
                    ..
                },
                Some(AnswerDraft::MultipleChoice {
                    selected_option_index,
                }),
            ) if selected_option_index == correct_option_index => self.points,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mc_question(correct: usize) -> Question {
        Question {
            id: "q1".to_string(),
            text: "Pick one".to_string(),
            points: 5,
            payload: QuestionPayload::MultipleChoice {
                options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                correct_option_index: correct,
            },
        }
    }

    #[test]
    fn grades_correct_choice_with_full_points() {
        let q = mc_question(2);
        let answer = AnswerDraft::MultipleChoice {
            selected_option_index: 2,
        };
        assert_eq!(q.grade(Some(&answer)), 5);
    }

    #[test]
    fn grades_wrong_or_missing_choice_as_zero() {
        let q = mc_question(2);
        let wrong = AnswerDraft::MultipleChoice {
            selected_option_index: 0,
        };
        assert_eq!(q.grade(Some(&wrong)), 0);
        assert_eq!(q.grade(None), 0);
    }

    #[test]
    fn essay_is_ungraded_at_submit() {
        let q = Question {
            id: "q2".to_string(),
            text: "Explain".to_string(),
            points: 10,
            payload: QuestionPayload::Essay {
                reference_answer: Some("because".to_string()),
            },
        };
        let answer = AnswerDraft::Essay {
            essay_text: "a long explanation".to_string(),
        };
        assert_eq!(q.grade(Some(&answer)), 0);
    }

    #[test]
    fn question_wire_shape_is_flattened() {
        let q = mc_question(1);
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["type"], "MULTIPLE_CHOICE");
        assert_eq!(json["correctOptionIndex"], 1);
        assert_eq!(json["points"], 5);
    }
}
