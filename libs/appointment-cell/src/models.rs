// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use auth_cell::UserError;
use shared_database::rows::{get_enum, get_opt_uuid, get_uuid};
use shared_models::error::{AppError, DbError};
use shared_models::patch::nullable;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub prescription: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Appointment {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            patient_id: get_uuid(row, "patient_id")?,
            doctor_id: get_opt_uuid(row, "doctor_id")?,
            scheduled_at: row.try_get("scheduled_at")?,
            duration_minutes: row.try_get("duration_minutes")?,
            status: get_enum(row, "status")?,
            appointment_type: get_enum(row, "appointment_type")?,
            notes: row.try_get("notes")?,
            diagnosis: row.try_get("diagnosis")?,
            treatment: row.try_get("treatment")?,
            prescription: row.try_get("prescription")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "in_progress" => Ok(AppointmentStatus::InProgress),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(format!("Unknown appointment status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[default]
    Consultation,
    FollowUp,
    Procedure,
    PostOpCheck,
    Emergency,
}

impl AppointmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::Consultation => "consultation",
            AppointmentType::FollowUp => "follow_up",
            AppointmentType::Procedure => "procedure",
            AppointmentType::PostOpCheck => "post_op_check",
            AppointmentType::Emergency => "emergency",
        }
    }
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consultation" => Ok(AppointmentType::Consultation),
            "follow_up" => Ok(AppointmentType::FollowUp),
            "procedure" => Ok(AppointmentType::Procedure),
            "post_op_check" => Ok(AppointmentType::PostOpCheck),
            "emergency" => Ok(AppointmentType::Emergency),
            other => Err(format!("Unknown appointment type: {}", other)),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

fn default_duration() -> i64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<Option<Uuid>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub appointment_type: Option<AppointmentType>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub treatment: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub prescription: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for AppointmentError {
    fn from(error: sqlx::Error) -> Self {
        AppointmentError::Database(error.into())
    }
}

impl From<UserError> for AppointmentError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::Database(db) => AppointmentError::Database(db),
            UserError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            other => AppointmentError::ValidationError(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound => AppError::NotFound(error.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Database(db) => db.into(),
        }
    }
}
