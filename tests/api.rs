//! End-to-end tests against the in-process router with an in-memory
//! database.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use qbank::api::{create_router, AppState};
use qbank::config::{ApiToken, ServerConfig};
use qbank::db::Database;

fn app() -> Router {
    app_with_tokens(Vec::new())
}

fn app_with_tokens(tokens: Vec<ApiToken>) -> Router {
    let db = Database::open_in_memory().unwrap();
    let server = ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        tokens,
    };
    create_router(AppState::new(db, &server))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create_question(app: &Router, body: Value) -> Value {
    let (status, v) = send(app, "POST", "/api/question-bank", Some(body), None).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {v}");
    v
}

async fn create_profile(app: &Router, id: &str) {
    let (status, v) = send(
        app,
        "POST",
        "/api/profiles",
        Some(json!({"id": id, "full_name": id, "role": "content_manager"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "profile create failed: {v}");
}

fn question(text: &str, subject: &str, difficulty: i64) -> Value {
    json!({
        "question_text": text,
        "subject": subject,
        "difficulty": difficulty,
        "boards": ["IBDP"],
    })
}

#[tokio::test]
async fn health_is_open() {
    let app = app();
    let (status, _) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn list_response_carries_pagination_envelope() {
    let app = app();
    for i in 0..12 {
        create_question(&app, question(&format!("Q{i}"), "Maths", 5)).await;
    }

    let (status, v) = send(&app, "GET", "/api/question-bank?limit=5&page=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total"], 12);
    assert_eq!(v["totalQuestions"], 12);
    assert_eq!(v["page"], 2);
    assert_eq!(v["limit"], 5);
    assert_eq!(v["totalPages"], 3);
    assert_eq!(v["questions"].as_array().unwrap().len(), 5);
    // No QA record yet: the join array is empty
    assert_eq!(v["questions"][0]["qa_questions"], json!([]));
}

#[tokio::test]
async fn out_of_range_pagination_is_clamped_not_rejected() {
    let app = app();
    create_question(&app, question("Q", "Maths", 5)).await;

    let (status, v) = send(
        &app,
        "GET",
        "/api/question-bank?page=0&limit=9999",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["page"], 1);
    assert_eq!(v["limit"], 100);

    let (status, v) = send(&app, "GET", "/api/question-bank?page=abc&limit=-3", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["page"], 1);
    assert_eq!(v["limit"], 10);

    // An absurdly large page must not overflow the offset arithmetic
    let (status, v) = send(
        &app,
        "GET",
        &format!("/api/question-bank?page={}&limit=100", usize::MAX),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["questions"], json!([]));
}

#[tokio::test]
async fn invalid_difficulty_range_is_a_bad_request() {
    let app = app();
    let (status, v) = send(
        &app,
        "GET",
        "/api/question-bank?difficulty_min=7&difficulty_max=3",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("difficulty"));

    let (status, _) = send(
        &app,
        "GET",
        "/api/question-bank?difficulty_min=0&difficulty_max=11",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn advanced_filters_validate_operator_against_field_type() {
    let app = app();
    create_question(&app, question("Easy", "Maths", 2)).await;
    create_question(&app, question("Hard", "Maths", 9)).await;

    let conds = json!([{"field": "difficulty", "operator": "gte", "value": 8}]).to_string();
    let uri = format!(
        "/api/question-bank?advanced_filters={}",
        urlencode(&conds)
    );
    let (status, v) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total"], 1);

    // like on a number field is rejected before any SQL runs
    let conds = json!([{"field": "difficulty", "operator": "like", "value": "8"}]).to_string();
    let uri = format!("/api/question-bank?advanced_filters={}", urlencode(&conds));
    let (status, _) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // malformed JSON is rejected
    let uri = format!("/api/question-bank?advanced_filters={}", urlencode("not json"));
    let (status, _) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stale_question_update_conflicts() {
    let app = app();
    let q = create_question(&app, question("Original", "Maths", 5)).await;
    let id = q["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/question-bank/{id}"),
        Some(json!({
            "topic": "Algebra",
            "expected_updated_at": "2000-01-01T00:00:00Z",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/question-bank/{id}"),
        Some(json!({
            "topic": "Algebra",
            "expected_updated_at": q["updated_at"],
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["topic"], "Algebra");
}

#[tokio::test]
async fn deleted_questions_disappear_from_listing() {
    let app = app();
    let q = create_question(&app, question("Q", "Maths", 5)).await;
    let id = q["id"].as_str().unwrap();

    let (status, _) = send(&app, "DELETE", &format!("/api/question-bank/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, v) = send(&app, "GET", "/api/question-bank", None, None).await;
    assert_eq!(v["total"], 0);

    // Deleting again is a 404: the row is already inactive
    let (status, _) = send(&app, "DELETE", &format!("/api/question-bank/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_preview_matches_commit() {
    let app = app();
    create_profile(&app, "user-1").await;
    for i in 0..4 {
        create_question(&app, question(&format!("M{i}"), "Maths", 5)).await;
    }
    create_question(&app, question("P", "Physics", 5)).await;

    let body = json!({
        "assigned_to": "user-1",
        "filters": {"subject": "Maths"},
        "preview": true,
    });
    let (status, v) = send(&app, "POST", "/api/question-assignments/bulk", Some(body.clone()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["count"], 4);

    let mut commit = body;
    commit["preview"] = json!(false);
    let (status, v) = send(&app, "POST", "/api/question-assignments/bulk", Some(commit.clone()), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(v["assigned_count"], 4);
    assert_eq!(v["assignments"].as_array().unwrap().len(), 4);

    // Everything already assigned to this user: commit again finds nothing
    let (status, v) = send(&app, "POST", "/api/question-assignments/bulk", Some(commit), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(v["assigned_count"], 0);
}

#[tokio::test]
async fn bulk_commit_skips_assignments_in_any_status() {
    let app = app();
    create_profile(&app, "user-1").await;
    create_question(&app, question("M0", "Maths", 5)).await;

    let commit = json!({
        "assigned_to": "user-1",
        "filters": {"subject": "Maths"},
    });
    let (status, v) = send(&app, "POST", "/api/question-assignments/bulk", Some(commit.clone()), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let aid = v["assignments"][0]["id"].as_str().unwrap().to_string();

    // Start work on the assignment, then add fresh questions. The
    // in-progress question must not be re-selected; the commit
    // succeeds and covers only the new rows.
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/question-assignments/{aid}"),
        Some(json!({"status": "in_progress"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    create_question(&app, question("M1", "Maths", 5)).await;
    create_question(&app, question("M2", "Maths", 5)).await;

    let preview = {
        let mut p = commit.clone();
        p["preview"] = json!(true);
        p
    };
    let (status, v) = send(&app, "POST", "/api/question-assignments/bulk", Some(preview), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["count"], 2);

    let (status, v) = send(&app, "POST", "/api/question-assignments/bulk", Some(commit), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(v["assigned_count"], 2);
}

#[tokio::test]
async fn bulk_for_unknown_assignee_is_rejected() {
    let app = app();
    create_question(&app, question("Q", "Maths", 5)).await;
    let (status, v) = send(
        &app,
        "POST",
        "/api/question-assignments/bulk",
        Some(json!({"assigned_to": "nobody", "preview": true})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("nobody"));
}

#[tokio::test]
async fn bulk_without_assignee_is_rejected() {
    let app = app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/question-assignments/bulk",
        Some(json!({"preview": true})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_assignment_conflicts() {
    let app = app();
    let q = create_question(&app, question("Q", "Maths", 5)).await;
    let body = json!({
        "question_id": q["id"],
        "assigned_to": "user-1",
    });

    let (status, _) = send(&app, "POST", "/api/question-assignments", Some(body.clone()), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, "POST", "/api/question-assignments", Some(body), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn assignment_status_walks_the_lifecycle() {
    let app = app();
    let q = create_question(&app, question("Q", "Maths", 5)).await;
    let (_, a) = send(
        &app,
        "POST",
        "/api/question-assignments",
        Some(json!({"question_id": q["id"], "assigned_to": "user-1"})),
        None,
    )
    .await;
    let id = a["id"].as_str().unwrap();

    // Skipping straight to completed is invalid
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/question-assignments/{id}"),
        Some(json!({"status": "completed"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for step in ["in_progress", "completed"] {
        let (status, v) = send(
            &app,
            "PUT",
            &format!("/api/question-assignments/{id}"),
            Some(json!({"status": step})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["status"], step);
    }
}

#[tokio::test]
async fn qa_upsert_creates_then_transitions() {
    let app = app();
    let q = create_question(&app, question("Q", "Maths", 5)).await;
    let qid = q["id"].as_str().unwrap();

    let (status, v) = send(
        &app,
        "POST",
        "/api/qa",
        Some(json!({
            "question_id": qid,
            "qa_status": "in_review",
            "reviewer_id": "rev-1",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["qa_status"], "in_review");
    assert!(v["review_date"].is_string());

    let (status, v) = send(
        &app,
        "POST",
        "/api/qa",
        Some(json!({
            "question_id": qid,
            "qa_status": "needs_revision",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["revision_count"], 1);

    // needs_revision cannot jump straight to approved
    let (status, _) = send(
        &app,
        "POST",
        "/api/qa",
        Some(json!({
            "question_id": qid,
            "qa_status": "approved",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The record now shows up embedded in the question listing
    let (_, listing) = send(&app, "GET", "/api/question-bank", None, None).await;
    let qa = &listing["questions"][0]["qa_questions"];
    assert_eq!(qa.as_array().unwrap().len(), 1);
    assert_eq!(qa[0]["qa_status"], "needs_revision");
}

#[tokio::test]
async fn qa_history_keeps_the_transition_trail() {
    let app = app();
    let q = create_question(&app, question("Q", "Maths", 5)).await;
    let qid = q["id"].as_str().unwrap();

    for body in [
        json!({"question_id": qid, "qa_status": "in_review", "reviewer_id": "rev-1"}),
        json!({"question_id": qid, "qa_status": "needs_revision", "review_notes": "redo"}),
    ] {
        let (status, _) = send(&app, "POST", "/api/qa", Some(body), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, v) = send(
        &app,
        "GET",
        &format!("/api/qa/history?question_id={qid}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let trail = v["history"].as_array().unwrap();
    assert_eq!(trail.len(), 2);
    // Newest first
    assert_eq!(trail[0]["old_value"], "in_review");
    assert_eq!(trail[0]["new_value"], "needs_revision");
    assert_eq!(trail[0]["action_reason"], "redo");
    assert_eq!(trail[1]["new_value"], "in_review");
    assert_eq!(trail[1]["action_by"], "rev-1");

    // Unknown actions filter down to nothing
    let (status, v) = send(&app, "GET", "/api/qa/history?action=flag_change", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["history"], json!([]));
}

#[tokio::test]
async fn qa_ratings_average_into_overall() {
    let app = app();
    let q = create_question(&app, question("Q", "Maths", 5)).await;

    let (status, v) = send(
        &app,
        "POST",
        "/api/qa",
        Some(json!({
            "question_id": q["id"],
            "content_accuracy": 5,
            "clarity_rating": 3,
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["overall_rating"], 4.0);

    let (status, _) = send(
        &app,
        "POST",
        "/api/qa",
        Some(json!({"question_id": q["id"], "clarity_rating": 9})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn qa_for_unknown_question_is_not_found() {
    let app = app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/qa",
        Some(json!({"question_id": "missing"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/api/qa?question_id=missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn facets_reflect_stored_values() {
    let app = app();
    create_question(&app, question("Q1", "Maths", 3)).await;
    create_question(
        &app,
        json!({"question_text": "Q2", "subject": "Physics", "boards": ["CBSE"], "is_pyq": true}),
    )
    .await;

    let (status, v) = send(&app, "GET", "/api/question-bank/filters", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["subjects"], json!(["Maths", "Physics"]));
    assert_eq!(v["boards"], json!(["CBSE", "IBDP"]));
    assert_eq!(v["has_pyq"], true);
    assert_eq!(v["has_practice"], true);
}

#[tokio::test]
async fn auth_gates_reads_and_writes_by_role() {
    let tokens = vec![
        ApiToken {
            token: "admin-token".into(),
            role: "admin".into(),
        },
        ApiToken {
            token: "viewer-token".into(),
            role: "viewer".into(),
        },
    ];
    let app = app_with_tokens(tokens);

    // No token
    let (status, _) = send(&app, "GET", "/api/question-bank", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Wrong token
    let (status, _) = send(&app, "GET", "/api/question-bank", None, Some("bogus")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Viewer can read but not write
    let (status, _) = send(&app, "GET", "/api/question-bank", None, Some("viewer-token")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "POST",
        "/api/question-bank",
        Some(json!({"question_text": "nope"})),
        Some("viewer-token"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admin can write
    let (status, _) = send(
        &app,
        "POST",
        "/api/question-bank",
        Some(json!({"question_text": "yes"})),
        Some("admin-token"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Health stays open
    let (status, _) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn profiles_round_trip() {
    let app = app();
    let (status, p) = send(
        &app,
        "POST",
        "/api/profiles",
        Some(json!({"full_name": "Asha Rao", "role": "content_manager"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(p["id"].is_string());

    let (status, list) = send(&app, "GET", "/api/profiles?role=content_manager", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (_, empty) = send(&app, "GET", "/api/profiles?role=reviewer", None, None).await;
    assert_eq!(empty.as_array().unwrap().len(), 0);
}

/// Minimal percent-encoding for query parameter values in tests.
fn urlencode(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
