use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::EngineError,
    extractors::UserContext,
    services::{learning_service::LearningService, AppState},
};

#[derive(Debug, Deserialize)]
pub struct ModeQuery {
    pub mode: Option<String>,
}

pub async fn get_map(
    State(state): State<Arc<AppState>>,
    user: UserContext,
) -> Result<impl IntoResponse, EngineError> {
    let service = LearningService::new(state.mongo.clone());
    let response = service.map(user.user_id).await?;
    Ok(Json(response))
}

pub async fn get_unit_skills(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(unit_id): Path<String>,
) -> Result<impl IntoResponse, EngineError> {
    let service = LearningService::new(state.mongo.clone());
    let response = service.unit_skills(user.user_id, &unit_id).await?;
    Ok(Json(response))
}

pub async fn get_skill_modes(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(skill_id): Path<String>,
) -> Result<impl IntoResponse, EngineError> {
    let service = LearningService::new(state.mongo.clone());
    let response = service.skill_modes(user.user_id, &skill_id).await?;
    Ok(Json(response))
}

pub async fn get_lesson_overview(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(lesson_id): Path<String>,
    Query(query): Query<ModeQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let service = LearningService::new(state.mongo.clone());
    let response = service
        .lesson_overview(user.user_id, &lesson_id, query.mode.as_deref())
        .await?;
    Ok(Json(response))
}

pub async fn get_lesson_modes(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, EngineError> {
    let service = LearningService::new(state.mongo.clone());
    let response = service.lesson_modes(user.user_id, &lesson_id).await?;
    Ok(Json(response))
}

pub async fn get_user_progress(
    State(state): State<Arc<AppState>>,
    user: UserContext,
) -> Result<impl IntoResponse, EngineError> {
    let service = LearningService::new(state.mongo.clone());
    let response = service.user_progress(user.user_id).await?;
    Ok(Json(response))
}
