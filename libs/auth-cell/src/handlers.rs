use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;
use shared_utils::jwt::issue_token;

use crate::models::{CreateUserRequest, LoginRequest, LoginResponse, UpdateUserRequest, UserRecord, UserSearchQuery};
use crate::services::UserService;

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    debug!("Login attempt");

    let service = UserService::new(&state.db);
    let user = service.authenticate(&request.email, &request.password).await?;

    let (token, expires_at) = issue_token(&user.principal(), &state.config.jwt_secret, state.config.jwt_expiry_hours)
        .map_err(AppError::Internal)?;

    info!("User {} logged in", user.id);
    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_at,
        user,
    }))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<UserRecord>, AppError> {
    debug!("Getting profile for user: {}", user.id);

    let service = UserService::new(&state.db);
    let record = service.get_user(user.id).await?;
    if !record.is_active {
        return Err(AppError::Auth("Account is disabled".to_string()));
    }

    Ok(Json(record))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<Vec<UserRecord>>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let users = UserService::new(&state.db).list_users(query).await?;
    Ok(Json(users))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserRecord>, AppError> {
    if user.id != user_id {
        require_role(&user, &[Role::Admin])?;
    }

    let record = UserService::new(&state.db).get_user(user_id).await?;
    Ok(Json(record))
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserRecord>), AppError> {
    require_role(&user, &[Role::Admin])?;

    let record = UserService::new(&state.db).create_user(request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserRecord>, AppError> {
    require_role(&user, &[Role::Admin])?;

    if user.id == user_id && (request.role.is_some() || request.is_active == Some(false)) {
        return Err(AppError::ValidationError(
            "Administrators cannot change their own role or deactivate themselves".to_string(),
        ));
    }

    let record = UserService::new(&state.db).update_user(user_id, request).await?;
    Ok(Json(record))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, &[Role::Admin])?;

    if user.id == user_id {
        return Err(AppError::ValidationError("Administrators cannot delete themselves".to_string()));
    }

    UserService::new(&state.db).delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
