use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use uuid::Uuid;

use recovery_cell::models::PhotoAnalysis;
use shared_database::AppState;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{DashboardStats, PatientProgress, PatientTimeline, RecoveryPoint, ReviewQueueQuery, TimelineQuery};
use crate::services::{DashboardService, GamificationService, TimelineService};

#[axum::debug_handler]
pub async fn patient_timeline(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<PatientTimeline>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let timeline = TimelineService::new(&state.db).patient_timeline(patient_id, query).await?;
    Ok(Json(timeline))
}

#[axum::debug_handler]
pub async fn recovery_series(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<RecoveryPoint>>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let series = TimelineService::new(&state.db).recovery_series(patient_id).await?;
    Ok(Json(series))
}

#[axum::debug_handler]
pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<DashboardStats>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let stats = DashboardService::new(&state.db).stats().await?;
    Ok(Json(stats))
}

#[axum::debug_handler]
pub async fn review_queue(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<ReviewQueueQuery>,
) -> Result<Json<Vec<PhotoAnalysis>>, AppError> {
    require_role(&user, &[Role::Admin, Role::Doctor])?;

    let queue = DashboardService::new(&state.db).review_queue(query.limit).await?;
    Ok(Json(queue))
}

#[axum::debug_handler]
pub async fn patient_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<PatientProgress>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let progress = GamificationService::new(&state.db).patient_progress(patient_id).await?;
    Ok(Json(progress))
}
