use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Rejected by the basic-auth gate; answered with a `WWW-Authenticate` challenge.
    #[error("Authentication error: {0}")]
    BasicAuth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BasicAuth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, message);
        } else {
            tracing::debug!("Request rejected: {}: {}", status, message);
        }

        let body = Json(json!({
            "error": message
        }));

        if matches!(self, AppError::BasicAuth(_)) {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"clinic\"")],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}

/// Database failures, classified from `sqlx::Error`.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration {version} failed: {reason}")]
    Migration { version: i64, reason: String },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Check constraint violated: {0}")]
    CheckViolation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DbError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(dbe) => {
                let message = dbe.message().to_string();
                match dbe.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation(message),
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation(message),
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                        DbError::CheckViolation(message)
                    }
                    _ => DbError::Query(message),
                }
            }
            sqlx::Error::ColumnNotFound(col) => DbError::Query(format!("Column not found: {}", col)),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::Query(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Io(io_err) => DbError::Connection(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => DbError::Connection(conf_err.to_string()),
            sqlx::Error::PoolClosed => DbError::Connection("Connection pool closed".to_string()),
            sqlx::Error::PoolTimedOut => DbError::Connection("Connection pool timed out".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<DbError> for AppError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::NotFound(msg) => AppError::NotFound(msg),
            DbError::UniqueViolation(msg) => AppError::Conflict(msg),
            DbError::ForeignKeyViolation(msg) => {
                AppError::ValidationError(format!("Referenced record does not exist ({})", msg))
            }
            DbError::CheckViolation(msg) => AppError::ValidationError(msg),
            DbError::Connection(msg) => AppError::Unavailable(msg),
            other => AppError::Database(other.to_string()),
        }
    }
}
