use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    // CORS configuration for the learning endpoints
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Learning engine endpoints (user identity arrives via x-user-id)
        .nest(
            "/api/v1/learning",
            learning_routes().layer(cors).layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::rate_limit::rate_limit_middleware,
            )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn learning_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        // Map & progression views
        .route("/map", get(handlers::progress::get_map))
        .route(
            "/units/{unit_id}/skills",
            get(handlers::progress::get_unit_skills),
        )
        .route(
            "/skills/{skill_id}/modes",
            get(handlers::progress::get_skill_modes),
        )
        .route(
            "/lessons/{lesson_id}/overview",
            get(handlers::progress::get_lesson_overview),
        )
        .route(
            "/lessons/{lesson_id}/modes",
            get(handlers::progress::get_lesson_modes),
        )
        .route("/progress", get(handlers::progress::get_user_progress))
        // Hearts
        .route("/hearts", get(handlers::learning::get_hearts))
        // Quiz flow
        .route("/quiz/start", post(handlers::learning::start_quiz))
        .route(
            "/quiz/{attempt_id}/question",
            get(handlers::learning::get_quiz_question),
        )
        .route(
            "/quiz/{attempt_id}/answer",
            post(handlers::learning::submit_answer),
        )
        .route(
            "/quiz/{attempt_id}/finish",
            post(handlers::learning::finish_quiz),
        )
}
