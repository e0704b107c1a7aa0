use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use shared_database::AppState;

use crate::models::HealthResponse;
use crate::services::HealthMonitorService;

#[axum::debug_handler]
pub async fn get_health_status(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let health = HealthMonitorService::new(&state.config, &state.db).check().await;

    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}
