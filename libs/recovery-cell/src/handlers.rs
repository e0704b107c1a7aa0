use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use shared_database::AppState;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    CreatePhotoAnalysisRequest, PhotoAnalysis, PhotoAnalysisQuery, ReviewRequest, UpdatePhotoAnalysisRequest,
};
use crate::services::PhotoAnalysisService;

#[axum::debug_handler]
pub async fn list_analyses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<PhotoAnalysisQuery>,
) -> Result<Json<Vec<PhotoAnalysis>>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let analyses = PhotoAnalysisService::new(&state.db).list_analyses(query).await?;
    Ok(Json(analyses))
}

#[axum::debug_handler]
pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<PhotoAnalysis>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let analysis = PhotoAnalysisService::new(&state.db).get_analysis(analysis_id).await?;
    Ok(Json(analysis))
}

#[axum::debug_handler]
pub async fn create_analysis(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePhotoAnalysisRequest>,
) -> Result<(StatusCode, Json<PhotoAnalysis>), AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let analysis = PhotoAnalysisService::new(&state.db).create_analysis(request).await?;
    Ok((StatusCode::CREATED, Json(analysis)))
}

#[axum::debug_handler]
pub async fn update_analysis(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(analysis_id): Path<Uuid>,
    Json(request): Json<UpdatePhotoAnalysisRequest>,
) -> Result<Json<PhotoAnalysis>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let analysis = PhotoAnalysisService::new(&state.db)
        .update_analysis(analysis_id, request)
        .await?;
    Ok(Json(analysis))
}

#[axum::debug_handler]
pub async fn delete_analysis(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(analysis_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, &[Role::Admin])?;

    PhotoAnalysisService::new(&state.db).delete_analysis(analysis_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn review_analysis(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(analysis_id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<PhotoAnalysis>, AppError> {
    require_role(&user, &[Role::Doctor, Role::Admin])?;
    debug!("User {} reviewing photo analysis {}", user.id, analysis_id);

    let analysis = PhotoAnalysisService::new(&state.db)
        .review_analysis(analysis_id, user.id, request)
        .await?;
    Ok(Json(analysis))
}

#[axum::debug_handler]
pub async fn list_patient_photos(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<PhotoAnalysis>>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let analyses = PhotoAnalysisService::new(&state.db)
        .list_for_patient(patient_id)
        .await?;
    Ok(Json(analyses))
}

#[axum::debug_handler]
pub async fn create_patient_photo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(mut request): Json<CreatePhotoAnalysisRequest>,
) -> Result<(StatusCode, Json<PhotoAnalysis>), AppError> {
    require_role(&user, &Role::CLINICAL)?;

    if request.patient_id.is_some_and(|id| id != patient_id) {
        return Err(AppError::ValidationError(
            "patientId in the body does not match the path".to_string(),
        ));
    }
    request.patient_id = Some(patient_id);

    let analysis = PhotoAnalysisService::new(&state.db).create_analysis(request).await?;
    Ok((StatusCode::CREATED, Json(analysis)))
}
