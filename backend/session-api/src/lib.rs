use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod proctor;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // The test UI is served from the platform front-end, not from here.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to the platform origin in production

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        // Create lives at the collection root (POST /api/v1/sessions/). Under
        // axum 0.8 a nested "/" route no longer matches the trailing-slash
        // collection path, so it is mounted at the full path here.
        .route(
            "/api/v1/sessions/",
            post(handlers::sessions::create_session),
        )
        .nest("/api/v1/sessions", session_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{id}/start", post(handlers::sessions::start_session))
        .route("/{id}/resume", post(handlers::sessions::resume_session))
        .route("/{id}/signals", post(handlers::sessions::report_signal))
        .route("/{id}/input", post(handlers::sessions::check_input))
        .route("/{id}/code", post(handlers::sessions::update_code))
        .route("/{id}/navigate", post(handlers::sessions::navigate))
        .route("/{id}/submit", post(handlers::sessions::submit))
        .route("/{id}/results", get(handlers::sessions::get_results))
        .route("/{id}/run", post(handlers::sessions::run_code))
        .route(
            "/{id}/chat/interviewer",
            post(handlers::sessions::chat_interviewer),
        )
        .route(
            "/{id}/chat/assistant",
            post(handlers::sessions::chat_assistant),
        )
        .route("/{id}/stream", get(handlers::sse::session_stream))
}
