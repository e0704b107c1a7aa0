use std::sync::Arc;

use axum::{routing::get, Router};

use shared_database::AppState;

use crate::handlers::get_health_status;

pub fn health_routes(state: Arc<AppState>) -> Router {
    Router::new().route("/health", get(get_health_status)).with_state(state)
}
