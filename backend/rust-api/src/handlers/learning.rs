use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::EngineError,
    extractors::{AppJson, UserContext},
    models::{StartQuizRequest, SubmitAnswerRequest},
    services::{learning_service::LearningService, AppState},
};

pub async fn start_quiz(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    AppJson(req): AppJson<StartQuizRequest>,
) -> Result<impl IntoResponse, EngineError> {
    tracing::info!(
        "Starting quiz: user={} lesson={} mode={:?}",
        user.user_id,
        req.lesson_id,
        req.mode
    );

    let service = LearningService::new(state.mongo.clone());
    let response = service.start_quiz(user.user_id, &req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_quiz_question(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, EngineError> {
    let service = LearningService::new(state.mongo.clone());
    let response = service.current_question(&attempt_id, user.user_id).await?;
    Ok(Json(response))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(attempt_id): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, EngineError> {
    tracing::info!(
        "Submitting answer: attempt={} question={} user={}",
        attempt_id,
        req.question_id,
        user.user_id
    );

    let service = LearningService::new(state.mongo.clone());
    let response = service.submit_answer(&attempt_id, user.user_id, &req).await?;
    Ok(Json(response))
}

pub async fn finish_quiz(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, EngineError> {
    tracing::info!("Finishing quiz: attempt={} user={}", attempt_id, user.user_id);

    let service = LearningService::new(state.mongo.clone());
    let response = service.finish_quiz(&attempt_id, user.user_id).await?;
    Ok(Json(response))
}

pub async fn get_hearts(
    State(state): State<Arc<AppState>>,
    user: UserContext,
) -> Result<impl IntoResponse, EngineError> {
    let service = LearningService::new(state.mongo.clone());
    let response = service.hearts(user.user_id).await?;
    Ok(Json(response))
}
