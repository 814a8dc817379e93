// tests/draft_tests.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use invigilator::clock::{Clock, OffsetClock};
use invigilator::models::answer::DraftRecord;
use invigilator::store::ExamStore;
use invigilator::store::draft::{DraftStore, MemoryDraftStore};
use invigilator::store::memory::MemoryStore;
use invigilator::{
    AnswerDraft, CapabilitySet, ExamDefinition, ExamError, Identity, PersistenceGateway,
    Question, QuestionPayload, SessionConfig, SessionController, SessionDeps, SessionPhase,
    SubmitOutcome, SubmitReason,
};

fn sample_exam() -> ExamDefinition {
    let now = Utc::now();
    ExamDefinition {
        id: "exam-9".to_string(),
        title: "Final".to_string(),
        course_name: "Physiology".to_string(),
        questions: vec![
            Question {
                id: "q1".to_string(),
                text: "Pick".to_string(),
                points: 5,
                payload: QuestionPayload::MultipleChoice {
                    options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                    correct_option_index: 2,
                },
            },
            Question {
                id: "q2".to_string(),
                text: "Explain".to_string(),
                points: 10,
                payload: QuestionPayload::Essay {
                    reference_answer: None,
                },
            },
        ],
        start_time: now - Duration::minutes(5),
        end_time: now + Duration::minutes(30),
    }
}

async fn spawn_session(
    exam: ExamDefinition,
    drafts: Arc<MemoryDraftStore>,
    primary: Arc<MemoryStore>,
    fallback: Arc<MemoryStore>,
) -> Arc<SessionController> {
    let gateway = Arc::new(PersistenceGateway::new(
        primary as Arc<dyn ExamStore>,
        fallback as Arc<dyn ExamStore>,
    ));
    SessionController::new(
        exam,
        "student-3",
        SessionDeps {
            gateway,
            drafts: drafts as Arc<dyn DraftStore>,
            clock: Arc::new(OffsetClock::new()) as Arc<dyn Clock>,
            capabilities: CapabilitySet::default(),
            config: SessionConfig::default(),
        },
    )
    .await
}

fn identity() -> Identity {
    Identity::new("Budi Santoso", "2101120042")
}

#[tokio::test(start_paused = true)]
async fn autosaved_answers_survive_a_restart() {
    let drafts = Arc::new(MemoryDraftStore::new());
    let exam = sample_exam();

    // First life: answer two questions, let the debounce flush.
    {
        let session = spawn_session(
            exam.clone(),
            drafts.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
        .await;
        session.start(identity()).await.unwrap();
        session
            .set_answer(
                "q1",
                AnswerDraft::MultipleChoice {
                    selected_option_index: 2,
                },
            )
            .unwrap();
        session
            .set_answer(
                "q2",
                AnswerDraft::Essay {
                    essay_text: "half-finished thought".to_string(),
                },
            )
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(drafts.contains("exam-9_student-3"));
        // Crash: the session is dropped without submit.
    }

    // Second life: the draft is merged back and the identity restored.
    let revived = spawn_session(
        exam,
        drafts.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    )
    .await;
    assert_eq!(revived.restored_identity(), Some(identity()));
    assert_eq!(
        revived.answer("q1"),
        Some(AnswerDraft::MultipleChoice {
            selected_option_index: 2
        })
    );
    assert_eq!(
        revived.answer("q2"),
        Some(AnswerDraft::Essay {
            essay_text: "half-finished thought".to_string()
        })
    );

    // And the session can resume as already-started.
    revived.resume().await.unwrap();
    assert_eq!(revived.phase(), SessionPhase::Active);
}

#[tokio::test(start_paused = true)]
async fn stale_question_ids_are_dropped_on_restore() {
    let drafts = Arc::new(MemoryDraftStore::new());

    // A draft written against an older revision of the exam.
    let mut answers = HashMap::new();
    answers.insert(
        "q1".to_string(),
        AnswerDraft::MultipleChoice {
            selected_option_index: 1,
        },
    );
    answers.insert(
        "removed-question".to_string(),
        AnswerDraft::Essay {
            essay_text: "orphaned".to_string(),
        },
    );
    drafts
        .save(
            "exam-9_student-3",
            &DraftRecord {
                answers,
                identity: identity(),
            },
        )
        .await
        .unwrap();

    let session = spawn_session(
        sample_exam(),
        drafts,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    )
    .await;

    assert_eq!(
        session.answer("q1"),
        Some(AnswerDraft::MultipleChoice {
            selected_option_index: 1
        })
    );
    assert_eq!(session.answer("removed-question"), None);
}

#[tokio::test(start_paused = true)]
async fn draft_is_cleared_only_on_successful_submit() {
    let drafts = Arc::new(MemoryDraftStore::new());
    let session = spawn_session(
        sample_exam(),
        drafts.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    )
    .await;
    session.start(identity()).await.unwrap();
    session
        .set_answer(
            "q2",
            AnswerDraft::Essay {
                essay_text: "answer".to_string(),
            },
        )
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
    assert!(drafts.contains("exam-9_student-3"));

    session.submit(SubmitReason::User).await;

    assert!(!drafts.contains("exam-9_student-3"));
}

#[tokio::test(start_paused = true)]
async fn failed_commit_keeps_the_draft_and_still_terminates() {
    let drafts = Arc::new(MemoryDraftStore::new());
    let primary = Arc::new(MemoryStore::new());
    let fallback = Arc::new(MemoryStore::new());
    primary.fail_forever(ExamError::Transport("offline".to_string()));
    fallback.fail_forever(ExamError::Storage("no disk".to_string()));

    let session = spawn_session(sample_exam(), drafts.clone(), primary, fallback).await;
    session.start(identity()).await.unwrap();
    session
        .set_answer(
            "q2",
            AnswerDraft::Essay {
                essay_text: "answer".to_string(),
            },
        )
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;

    let outcome = session.submit(SubmitReason::User).await;

    // The session is terminal with a user-visible warning, and the
    // draft survives as the only remaining copy of the answers.
    match outcome {
        SubmitOutcome::Committed {
            phase,
            persist_warning,
            ..
        } => {
            assert_eq!(phase, SessionPhase::Submitted);
            assert!(persist_warning.is_some());
        }
        other => panic!("expected a committed submit, got {:?}", other),
    }
    assert!(drafts.contains("exam-9_student-3"));
}
