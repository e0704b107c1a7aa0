use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn photo_analysis_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_analyses).post(handlers::create_analysis))
        .route(
            "/{id}",
            get(handlers::get_analysis)
                .put(handlers::update_analysis)
                .delete(handlers::delete_analysis),
        )
        .route("/{id}/review", post(handlers::review_analysis))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Mounted under `/patients` next to the patient routes.
pub fn patient_photo_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/{id}/photos",
            get(handlers::list_patient_photos).post(handlers::create_patient_photo),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
