use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn timeline_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/patients/{id}", get(handlers::patient_timeline))
        .route("/patients/{id}/recovery", get(handlers::recovery_series))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

pub fn dashboard_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/stats", get(handlers::dashboard_stats))
        .route("/reviews", get(handlers::review_queue))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

pub fn gamification_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/patients/{id}", get(handlers::patient_progress))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
