#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mongodb::bson::{doc, Document};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use linguamap_api::{config::Config, create_router, services::AppState};

pub async fn create_test_app() -> Router {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();

    // Load test configuration
    let config = Config::load().expect("Failed to load test configuration");

    eprintln!("Test config loaded - Redis URI: {}", config.redis_uri);

    // Connect to test databases
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    // Create app state (connection checks and indexes happen inside)
    let app_state = Arc::new(
        AppState::new(config.clone(), mongo_client.clone(), redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    // Seed catalog + question pool
    seed_test_content(&mongo_client, &config.mongo_database).await;

    // Build test router (same as main app)
    create_router(app_state)
}

/// Seed 25 questions per mode plus a small unit/lesson catalog. Idempotent
/// across parallel test binaries: duplicate-key errors are expected and
/// ignored.
async fn seed_test_content(mongo_client: &mongodb::Client, db_name: &str) {
    let db = mongo_client.database(db_name);
    let questions = db.collection::<Document>("questions");

    let already_seeded = questions
        .find_one(doc! { "_id": "q-listening-01" })
        .await
        .unwrap()
        .is_some();
    if already_seeded {
        return;
    }

    let units = db.collection::<Document>("units");
    insert_ignoring_duplicates(
        &units,
        vec![
            doc! { "_id": "unit-1", "title": "Basics", "order": 1, "published": true },
            doc! { "_id": "unit-2", "title": "Greetings", "order": 2, "published": true },
        ],
    )
    .await;

    let lessons = db.collection::<Document>("lessons");
    insert_ignoring_duplicates(
        &lessons,
        vec![
            lesson_doc("lesson-1-1", "unit-1", "Fruits", 1),
            lesson_doc("lesson-1-2", "unit-1", "Drinks", 2),
            lesson_doc("lesson-1-3", "unit-1", "Colors", 3),
            lesson_doc("lesson-2-1", "unit-2", "Hello", 1),
        ],
    )
    .await;

    let mut question_docs = Vec::new();
    for mode in ["listening", "speaking", "reading", "writing"] {
        for i in 1..=25 {
            question_docs.push(question_doc(mode, i));
        }
    }
    insert_ignoring_duplicates(&questions, question_docs).await;

    eprintln!("Test content seeded in MongoDB");
}

fn lesson_doc(id: &str, unit_id: &str, title: &str, order: i32) -> Document {
    doc! {
        "_id": id,
        "unit_id": unit_id,
        "title": title,
        "description": format!("{} lesson", title),
        "order": order,
        "published": true,
        "estimated_minutes": 5,
    }
}

fn question_doc(mode: &str, i: u32) -> Document {
    let id = format!("q-{}-{:02}", mode, i);
    let correct = correct_answer_for(&id);
    let spec = if mode == "writing" {
        // Free-text questions: trimmed, case-insensitive checking
        doc! { "format": "free_text", "case_sensitive": false, "placeholder": null }
    } else {
        doc! {
            "format": "choice",
            "choices": [correct.clone(), "alt-1", "alt-2", "alt-3"],
        }
    };
    doc! {
        "_id": id,
        "mode": mode,
        "prompt": format!("Question {} for {}", i, mode),
        "spec": spec,
        "correct_answer": correct,
        "explanation": format!("Explanation {}", i),
        "hint": null,
    }
}

/// Test content convention: the correct answer is derivable from the
/// question id ("q-listening-07" -> "ans-listening-07").
pub fn correct_answer_for(question_id: &str) -> String {
    question_id.replacen("q-", "ans-", 1)
}

async fn insert_ignoring_duplicates(collection: &mongodb::Collection<Document>, docs: Vec<Document>) {
    for doc in docs {
        if let Err(e) = collection.insert_one(doc).await {
            if !is_duplicate_key(&e) {
                panic!("Failed to seed test content: {:?}", e);
            }
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we))
            if we.code == 11000
    )
}

/// Fresh numeric user id per test so parallel tests never share hearts or
/// progression rows.
pub fn unique_user_id() -> i64 {
    let bytes = Uuid::new_v4().into_bytes();
    let mut value = i64::from_be_bytes(bytes[..8].try_into().unwrap());
    if value < 0 {
        value = value.wrapping_neg();
    }
    value.max(1)
}

pub async fn api_get(app: &Router, path: &str, user_id: i64) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(path)
                .header("x-user-id", user_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub async fn api_post(app: &Router, path: &str, user_id: i64, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .header("x-user-id", user_id.to_string())
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub async fn start_quiz(app: &Router, user_id: i64, lesson_id: &str, mode: &str) -> Value {
    let (status, body) = api_post(
        app,
        "/api/v1/learning/quiz/start",
        user_id,
        json!({ "lesson_id": lesson_id, "mode": mode }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "start_quiz failed: {}", body);
    body
}

pub async fn submit_text_answer(
    app: &Router,
    user_id: i64,
    attempt_id: &str,
    question_id: &str,
    answer: &str,
) -> (StatusCode, Value) {
    api_post(
        app,
        &format!("/api/v1/learning/quiz/{}/answer", attempt_id),
        user_id,
        json!({
            "question_id": question_id,
            "answer": { "kind": "text", "value": answer },
        }),
    )
    .await
}

/// Drive one full attempt: answer every question (the first `wrong` of them
/// incorrectly), then finish. Returns the finish summary.
pub async fn run_quiz(
    app: &Router,
    user_id: i64,
    lesson_id: &str,
    mode: &str,
    wrong: usize,
) -> Value {
    let started = start_quiz(app, user_id, lesson_id, mode).await;
    let attempt_id = started["attempt_id"].as_str().unwrap().to_string();
    let total = started["total_questions"].as_u64().unwrap() as usize;

    for i in 0..total {
        let (status, question_body) = api_get(
            app,
            &format!("/api/v1/learning/quiz/{}/question", attempt_id),
            user_id,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "question fetch failed: {}", question_body);
        let question_id = question_body["question"]["id"].as_str().unwrap().to_string();

        let answer = if i < wrong {
            "definitely-wrong".to_string()
        } else {
            correct_answer_for(&question_id)
        };

        let (status, answer_body) =
            submit_text_answer(app, user_id, &attempt_id, &question_id, &answer).await;
        assert_eq!(status, StatusCode::OK, "answer failed: {}", answer_body);
    }

    let (status, finish_body) = api_post(
        app,
        &format!("/api/v1/learning/quiz/{}/finish", attempt_id),
        user_id,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "finish failed: {}", finish_body);
    finish_body
}
