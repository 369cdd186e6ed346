use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Header carrying the already-resolved numeric user id. Identity
/// resolution itself lives upstream (gateway / user-context service); the
/// engine only consumes the result.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Resolved caller identity for learning routes.
#[derive(Debug, Clone, Copy)]
pub struct UserContext {
    pub user_id: i64,
}

impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok());

        match raw.and_then(|value| value.trim().parse::<i64>().ok()) {
            Some(user_id) if user_id > 0 => Ok(UserContext { user_id }),
            _ => {
                tracing::warn!("Request rejected: missing or invalid {} header", USER_ID_HEADER);
                let error_response = json!({
                    "code": "VALIDATION_ERROR",
                    "message": format!("{} header must carry a positive numeric user id", USER_ID_HEADER),
                    "status": 400
                });
                Err((StatusCode::BAD_REQUEST, Json(error_response)).into_response())
            }
        }
    }
}

/// Custom JSON extractor that returns JSON error responses instead of HTML
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = format!("Failed to parse JSON request body: {}", rejection);
                tracing::warn!("{}", message);
                let error_response = json!({
                    "code": "VALIDATION_ERROR",
                    "message": message,
                    "status": 400
                });
                Err((StatusCode::BAD_REQUEST, Json(error_response)).into_response())
            }
        }
    }
}
