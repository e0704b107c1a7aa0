use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{CreatePaymentRequest, Payment, PaymentQuery, UpdatePaymentRequest};
use crate::services::PaymentService;

#[axum::debug_handler]
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<PaymentQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let payments = PaymentService::new(&state.db).list_payments(query).await?;
    Ok(Json(payments))
}

#[axum::debug_handler]
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let payment = PaymentService::new(&state.db).get_payment(payment_id).await?;
    Ok(Json(payment))
}

#[axum::debug_handler]
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let payment = PaymentService::new(&state.db).create_payment(request).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

#[axum::debug_handler]
pub async fn update_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<Payment>, AppError> {
    require_role(&user, &Role::CLINICAL)?;

    let payment = PaymentService::new(&state.db)
        .update_payment(payment_id, request)
        .await?;
    Ok(Json(payment))
}

#[axum::debug_handler]
pub async fn delete_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(payment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, &[Role::Admin])?;

    PaymentService::new(&state.db).delete_payment(payment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
