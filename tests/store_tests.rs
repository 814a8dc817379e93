// tests/store_tests.rs

use std::collections::HashMap;

use chrono::Utc;
use invigilator::models::answer::DraftRecord;
use invigilator::store::ExamStore;
use invigilator::store::draft::{DraftStore, JsonDraftStore};
use invigilator::store::file::JsonFileStore;
use invigilator::store::remote::HttpStore;
use invigilator::{
    AnswerDraft, ExamDefinition, ExamError, Identity, LiveSessionRecord, Question,
    QuestionPayload, Submission,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;

fn submission(student: &str, score: u32) -> Submission {
    Submission {
        id: Submission::composite_id("exam-1", student),
        exam_id: "exam-1".to_string(),
        student_id: student.to_string(),
        student_name: "Ana".to_string(),
        student_nim: "2101120077".to_string(),
        answers: Vec::new(),
        total_score: score,
        submitted_at: Utc::now(),
        is_graded: false,
        violation_count: 0,
    }
}

#[tokio::test]
async fn file_store_round_trips_submissions() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());

    assert!(store.get_submission("exam-1_s1").await.unwrap().is_none());

    store.upsert_submission(&submission("s1", 10)).await.unwrap();
    let loaded = store
        .get_submission("exam-1_s1")
        .await
        .unwrap()
        .expect("submission should be on disk");
    assert_eq!(loaded.total_score, 10);
    assert_eq!(loaded.student_nim, "2101120077");

    // Upsert replaces in place.
    store.upsert_submission(&submission("s1", 15)).await.unwrap();
    let listed = store.list_submissions("exam-1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].total_score, 15);

    store.delete_submission("exam-1_s1").await.unwrap();
    assert!(store.get_submission("exam-1_s1").await.unwrap().is_none());
}

#[tokio::test]
async fn file_store_keeps_one_live_record_per_student() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());

    for violations in 0..3 {
        store
            .upsert_live_session(&LiveSessionRecord {
                exam_id: "exam-1".to_string(),
                student_id: "s1".to_string(),
                student_name: "Ana".to_string(),
                started_at: Utc::now(),
                last_heartbeat: Utc::now(),
                violation_count: violations,
            })
            .await
            .unwrap();
    }

    let records = store.list_live_sessions("exam-1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].violation_count, 2);

    store.delete_live_session("exam-1_s1").await.unwrap();
    assert!(store.list_live_sessions("exam-1").await.unwrap().is_empty());
    // Deleting a missing record is not an error.
    store.delete_live_session("exam-1_s1").await.unwrap();
}

#[tokio::test]
async fn file_store_reads_exams_written_by_the_authoring_side() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());

    // The authoring collaborator writes exams in the wire format.
    let wire = serde_json::json!({
        "id": "exam-2",
        "title": "Quiz",
        "courseName": "Anatomy",
        "questions": [
            {
                "id": "q1",
                "text": "Pick one",
                "points": 5,
                "type": "MULTIPLE_CHOICE",
                "options": ["a", "b"],
                "correctOptionIndex": 0
            },
            {
                "id": "q2",
                "text": "Explain",
                "points": 10,
                "type": "ESSAY",
                "referenceAnswer": "because"
            }
        ],
        "startTime": "2026-08-29T08:00:00Z",
        "endTime": "2026-08-29T10:00:00Z"
    });
    let path = dir.path().join("exams");
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(
        path.join("exam-2.json"),
        serde_json::to_vec_pretty(&wire).unwrap(),
    )
    .unwrap();

    let exam: ExamDefinition = store
        .get_exam("exam-2")
        .await
        .unwrap()
        .expect("exam should parse from the wire format");
    assert_eq!(exam.course_name, "Anatomy");
    assert_eq!(exam.questions.len(), 2);
    let Question {
        payload: QuestionPayload::MultipleChoice {
            correct_option_index,
            ..
        },
        ..
    } = &exam.questions[0]
    else {
        panic!("first question should be multiple choice");
    };
    assert_eq!(*correct_option_index, 0);
}

/// One-shot HTTP server: answers the first request with `response`
/// verbatim, then exits.
async fn serve_once(response: String) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        socket.write_all(response.as_bytes()).await.unwrap();
    });
    Url::parse(&format!("http://{}", addr)).unwrap()
}

fn http_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    )
}

#[tokio::test]
async fn http_store_parses_documents_from_the_remote_api() {
    let body = serde_json::to_string(&submission("s9", 15)).unwrap();
    let base = serve_once(http_response("200 OK", &body)).await;
    let store = HttpStore::new(base);

    let loaded = store
        .get_submission("exam-1_s9")
        .await
        .unwrap()
        .expect("document should parse");
    assert_eq!(loaded.total_score, 15);
    assert_eq!(loaded.student_nim, "2101120077");
}

#[tokio::test]
async fn http_store_reads_missing_documents_as_none() {
    let base = serve_once(http_response("404 Not Found", "")).await;
    let store = HttpStore::new(base);

    assert!(store.get_exam("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn http_store_maps_denied_requests_to_authorization_errors() {
    let base = serve_once(http_response("403 Forbidden", "")).await;
    let store = HttpStore::new(base);

    let err = store.get_submission("exam-1_s1").await.unwrap_err();
    assert!(matches!(err, ExamError::Authorization(_)));
    assert!(err.triggers_failover());
}

#[tokio::test]
async fn http_store_maps_server_errors_to_transport_errors() {
    let base = serve_once(http_response("502 Bad Gateway", "")).await;
    let store = HttpStore::new(base);

    let err = store.get_submission("exam-1_s1").await.unwrap_err();
    assert!(matches!(err, ExamError::Transport(_)));
    assert!(err.triggers_failover());
}

#[tokio::test]
async fn draft_store_round_trips_and_clears() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDraftStore::new(dir.path());

    let mut answers = HashMap::new();
    answers.insert(
        "q1".to_string(),
        AnswerDraft::MultipleChoice {
            selected_option_index: 2,
        },
    );
    answers.insert(
        "q2".to_string(),
        AnswerDraft::Essay {
            essay_text: "text".to_string(),
        },
    );
    let draft = DraftRecord {
        answers,
        identity: Identity::new("Ana", "2101120077"),
    };

    store.save("exam-1_s1", &draft).await.unwrap();
    let loaded = store
        .load("exam-1_s1")
        .await
        .unwrap()
        .expect("draft should be on disk");
    assert_eq!(loaded, draft);

    store.clear("exam-1_s1").await.unwrap();
    assert!(store.load("exam-1_s1").await.unwrap().is_none());
    // Clearing twice is fine.
    store.clear("exam-1_s1").await.unwrap();
}
