use axum::http::StatusCode;

mod common;

use common::{api_get, correct_answer_for, start_quiz, submit_text_answer, unique_user_id};

#[tokio::test]
async fn test_hearts_initialize_full_on_first_access() {
    let app = common::create_test_app().await;
    let user_id = unique_user_id();

    let (status, body) = api_get(&app, "/api/v1/learning/hearts", user_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current"], 5);
    assert_eq!(body["max"], 5);
    assert_eq!(body["regen"]["seconds_per_heart"], 1800);
    // Full hearts: no countdown
    assert!(body["regen"].get("next_heart_in_seconds").is_none());
}

#[tokio::test]
async fn test_correct_answers_leave_hearts_untouched() {
    let app = common::create_test_app().await;
    let user_id = unique_user_id();

    let started = start_quiz(&app, user_id, "lesson-1-1", "reading").await;
    let attempt_id = started["attempt_id"].as_str().unwrap().to_string();
    let question_id = started["question"]["id"].as_str().unwrap().to_string();

    let (_, body) = submit_text_answer(
        &app,
        user_id,
        &attempt_id,
        &question_id,
        &correct_answer_for(&question_id),
    )
    .await;
    assert_eq!(body["is_correct"], true);
    assert_eq!(body["hearts_remaining"], 5);
    assert_eq!(body["out_of_hearts"], false);
}

#[tokio::test]
async fn test_wrong_answers_deplete_hearts_and_clamp_at_zero() {
    let app = common::create_test_app().await;
    let user_id = unique_user_id();

    // 5 wrong answers on the first attempt burn all 5 hearts
    let started = start_quiz(&app, user_id, "lesson-1-1", "listening").await;
    let attempt_id = started["attempt_id"].as_str().unwrap().to_string();

    let mut hearts = 5;
    for _ in 0..5 {
        let (_, question_body) = api_get(
            &app,
            &format!("/api/v1/learning/quiz/{}/question", attempt_id),
            user_id,
        )
        .await;
        let question_id = question_body["question"]["id"].as_str().unwrap().to_string();
        let (_, body) =
            submit_text_answer(&app, user_id, &attempt_id, &question_id, "nope").await;
        assert_eq!(body["is_correct"], false);
        hearts -= 1;
        assert_eq!(body["hearts_remaining"], hearts);
    }

    let (_, depleted) = api_get(&app, "/api/v1/learning/hearts", user_id).await;
    assert_eq!(depleted["current"], 0);
    // Regenerating: the countdown to the next heart is exposed
    let next = depleted["regen"]["next_heart_in_seconds"].as_i64().unwrap();
    assert!(next > 0 && next <= 1800);

    // A 6th wrong answer on a second attempt stays clamped at zero and the
    // response flags the exhausted resource
    let started = start_quiz(&app, user_id, "lesson-1-1", "reading").await;
    let attempt_id = started["attempt_id"].as_str().unwrap().to_string();
    let question_id = started["question"]["id"].as_str().unwrap().to_string();

    let (status, body) =
        submit_text_answer(&app, user_id, &attempt_id, &question_id, "nope").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_correct"], false);
    assert_eq!(body["hearts_remaining"], 0);
    assert_eq!(body["out_of_hearts"], true);
    let cooldown = body["cooldown_seconds"].as_i64().unwrap();
    assert!(cooldown > 0 && cooldown <= 1800);
}

#[tokio::test]
async fn test_partial_depletion_exposes_regen_countdown() {
    let app = common::create_test_app().await;
    let user_id = unique_user_id();

    let started = start_quiz(&app, user_id, "lesson-1-2", "reading").await;
    let attempt_id = started["attempt_id"].as_str().unwrap().to_string();
    let question_id = started["question"]["id"].as_str().unwrap().to_string();

    let (_, body) = submit_text_answer(&app, user_id, &attempt_id, &question_id, "nope").await;
    assert_eq!(body["hearts_remaining"], 4);

    // Hearts regenerate continuously, so the countdown shows below max too
    let (_, hearts) = api_get(&app, "/api/v1/learning/hearts", user_id).await;
    assert_eq!(hearts["current"], 4);
    let next = hearts["regen"]["next_heart_in_seconds"].as_i64().unwrap();
    assert!(next > 0 && next <= 1800);
}
