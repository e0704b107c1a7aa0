use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use sqlx::Row;
use tracing::debug;

use shared_database::rows::get_enum;
use shared_database::{AppState, DbPool};
use shared_models::auth::{Role, User};
use shared_models::error::{AppError, DbError};

use crate::jwt::validate_token;

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

/// Reloads the token's subject so deactivation and role changes take effect
/// before the token expires.
pub async fn load_principal(pool: &DbPool, claimed: User) -> Result<User, AppError> {
    let row = sqlx::query("SELECT email, role, is_active FROM users WHERE id = ?")
        .bind(claimed.id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(DbError::from)?;

    let Some(row) = row else {
        debug!("Token subject {} no longer exists", claimed.id);
        return Err(AppError::Auth("User no longer exists".to_string()));
    };

    let is_active: bool = row.try_get("is_active").map_err(DbError::from)?;
    if !is_active {
        debug!("Token subject {} is disabled", claimed.id);
        return Err(AppError::Auth("Account is disabled".to_string()));
    }

    Ok(User {
        id: claimed.id,
        email: row.try_get("email").map_err(DbError::from)?,
        role: get_enum(&row, "role").map_err(DbError::from)?,
    })
}

// Validates the bearer token and stores the caller as `Extension<User>`.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;

    let claimed = validate_token(token, &state.config.jwt_secret).map_err(AppError::Auth)?;
    let user = load_principal(&state.db, claimed).await?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn require_role(user: &User, allowed: &[Role]) -> Result<(), AppError> {
    if user.has_any_role(allowed) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role {} is not allowed to perform this action",
            user.role
        )))
    }
}
