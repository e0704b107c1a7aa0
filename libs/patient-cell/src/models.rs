use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use auth_cell::UserError;
use shared_database::rows::{get_enum, get_opt_uuid, get_uuid};
use shared_models::error::{AppError, DbError};
use shared_models::patch::nullable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Active => "active",
            PatientStatus::Inactive => "inactive",
            PatientStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PatientStatus::Active),
            "inactive" => Ok(PatientStatus::Inactive),
            "archived" => Ok(PatientStatus::Archived),
            other => Err(format!("Unknown patient status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub document_id: Option<String>,
    pub address: Option<String>,
    pub status: PatientStatus,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub assigned_doctor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Patient {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            birth_date: row.try_get("birth_date")?,
            document_id: row.try_get("document_id")?,
            address: row.try_get("address")?,
            status: get_enum(row, "status")?,
            medical_history: row.try_get("medical_history")?,
            allergies: row.try_get("allergies")?,
            medications: row.try_get("medications")?,
            assigned_doctor_id: get_opt_uuid(row, "assigned_doctor_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub document_id: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub status: PatientStatus,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub assigned_doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
    pub status: Option<PatientStatus>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub allergies: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub medications: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub assigned_doctor_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientSearchQuery {
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<PatientStatus>,
    pub assigned_doctor_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Patient with email {email} already exists")]
    EmailAlreadyExists { email: String },

    #[error("Patient {0} still has payments on record")]
    HasDependents(Uuid),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for PatientError {
    fn from(error: sqlx::Error) -> Self {
        PatientError::Database(error.into())
    }
}

impl From<UserError> for PatientError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::Database(db) => PatientError::Database(db),
            UserError::ValidationError(msg) => PatientError::ValidationError(msg),
            other => PatientError::ValidationError(other.to_string()),
        }
    }
}

impl From<PatientError> for AppError {
    fn from(error: PatientError) -> Self {
        match error {
            PatientError::NotFound => AppError::NotFound(error.to_string()),
            PatientError::EmailAlreadyExists { .. } | PatientError::HasDependents(_) => {
                AppError::Conflict(error.to_string())
            }
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::Database(db) => db.into(),
        }
    }
}
