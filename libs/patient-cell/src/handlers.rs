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

use crate::models::{CreatePatientRequest, Patient, PatientSearchQuery, UpdatePatientRequest};
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let patient = PatientService::new(&state.db).create_patient(request).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Patient>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let patient = PatientService::new(&state.db).get_patient(patient_id).await?;
    Ok(Json(patient))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Patient>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let patient = PatientService::new(&state.db)
        .update_patient(patient_id, request)
        .await?;
    Ok(Json(patient))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Vec<Patient>>, AppError> {
    require_role(&user, &Role::CLINICAL)?;
    debug!("Patient search by {}", user.id);

    let patients = PatientService::new(&state.db).search_patients(query).await?;
    Ok(Json(patients))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, &[Role::Admin])?;

    PatientService::new(&state.db).delete_patient(patient_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
