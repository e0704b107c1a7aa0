use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use shared_database::rows::{get_enum, get_uuid};
use shared_models::auth::{Role, User};
use shared_models::error::{AppError, DbError};

/// A row of `users` without its password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub mfa_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn principal(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

impl FromRow<'_, SqliteRow> for UserRecord {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            role: get_enum(row, "role")?,
            is_active: row.try_get("is_active")?,
            mfa_enabled: row.try_get("mfa_enabled")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSearchQuery {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("User with email {email} already exists")]
    EmailAlreadyExists { email: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    Inactive,

    #[error("Doctor is still assigned to {assignments} patients or appointments")]
    DoctorInUse { assignments: i64 },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for UserError {
    fn from(error: sqlx::Error) -> Self {
        UserError::Database(error.into())
    }
}

impl From<UserError> for AppError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::NotFound => AppError::NotFound(error.to_string()),
            UserError::EmailAlreadyExists { .. } | UserError::DoctorInUse { .. } => {
                AppError::Conflict(error.to_string())
            }
            UserError::InvalidCredentials | UserError::Inactive => AppError::Auth(error.to_string()),
            UserError::ValidationError(msg) => AppError::ValidationError(msg),
            UserError::PasswordHash(msg) => AppError::Internal(msg),
            UserError::Database(db) => db.into(),
        }
    }
}
