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

use crate::models::{Appointment, AppointmentSearchQuery, CreateAppointmentRequest, UpdateAppointmentRequest};
use crate::services::AppointmentBookingService;

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    require_role(&user, &Role::CLINICAL)?;
    debug!("Booking appointment requested by {}", user.id);

    let appointment = AppointmentBookingService::new(&state.db)
        .book_appointment(request)
        .await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let appointment = AppointmentBookingService::new(&state.db)
        .get_appointment(appointment_id)
        .await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let appointments = AppointmentBookingService::new(&state.db)
        .search_appointments(query)
        .await?;
    Ok(Json(appointments))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let appointment = AppointmentBookingService::new(&state.db)
        .update_appointment(appointment_id, request)
        .await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, &[Role::Admin])?;

    AppointmentBookingService::new(&state.db)
        .delete_appointment(appointment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
