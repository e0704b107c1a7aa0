use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use patient_cell::PatientError;
use shared_database::rows::{get_enum, get_json, get_opt_enum, get_opt_uuid, get_uuid};
use shared_models::error::{AppError, DbError};

/// Severity scale shared by the overall assessment and each condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::None,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn needs_review(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_str() == s)
            .ok_or_else(|| format!("Unknown severity: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAnalysis {
    pub id: Uuid,
    pub patient_id: String,
    pub photo_url: String,
    pub days_post_op: i64,
    pub procedure_type: Option<String>,
    pub recovery_score: Option<f64>,
    pub confidence_level: Option<f64>,
    pub overall_severity: Severity,
    pub has_hematoma: bool,
    pub hematoma_severity: Option<Severity>,
    pub has_edema: bool,
    pub edema_severity: Option<Severity>,
    pub has_infection: bool,
    pub infection_severity: Option<Severity>,
    pub has_asymmetry: bool,
    pub asymmetry_severity: Option<Severity>,
    pub has_dehiscence: bool,
    pub has_necrosis: bool,
    pub has_seroma: bool,
    pub detected_features: Option<Value>,
    pub recommendations: Option<Value>,
    pub requires_doctor_review: bool,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub doctor_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PhotoAnalysis {
    /// `(condition, flag, severity)` for every condition that carries a severity.
    pub fn graded_conditions(&self) -> [(&'static str, bool, Option<Severity>); 4] {
        [
            ("hematoma", self.has_hematoma, self.hematoma_severity),
            ("edema", self.has_edema, self.edema_severity),
            ("infection", self.has_infection, self.infection_severity),
            ("asymmetry", self.has_asymmetry, self.asymmetry_severity),
        ]
    }

    pub fn is_pending_review(&self) -> bool {
        self.requires_doctor_review && self.reviewed_at.is_none()
    }
}

impl FromRow<'_, SqliteRow> for PhotoAnalysis {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            patient_id: row.try_get("patient_id")?,
            photo_url: row.try_get("photo_url")?,
            days_post_op: row.try_get("days_post_op")?,
            procedure_type: row.try_get("procedure_type")?,
            recovery_score: row.try_get("recovery_score")?,
            confidence_level: row.try_get("confidence_level")?,
            overall_severity: get_enum(row, "overall_severity")?,
            has_hematoma: row.try_get("has_hematoma")?,
            hematoma_severity: get_opt_enum(row, "hematoma_severity")?,
            has_edema: row.try_get("has_edema")?,
            edema_severity: get_opt_enum(row, "edema_severity")?,
            has_infection: row.try_get("has_infection")?,
            infection_severity: get_opt_enum(row, "infection_severity")?,
            has_asymmetry: row.try_get("has_asymmetry")?,
            asymmetry_severity: get_opt_enum(row, "asymmetry_severity")?,
            has_dehiscence: row.try_get("has_dehiscence")?,
            has_necrosis: row.try_get("has_necrosis")?,
            has_seroma: row.try_get("has_seroma")?,
            detected_features: get_json(row, "detected_features")?,
            recommendations: get_json(row, "recommendations")?,
            requires_doctor_review: row.try_get("requires_doctor_review")?,
            reviewed_at: row.try_get("reviewed_at")?,
            reviewed_by: get_opt_uuid(row, "reviewed_by")?,
            doctor_notes: row.try_get("doctor_notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePhotoAnalysisRequest {
    /// Taken from the path on `/patients/{id}/photos`.
    pub patient_id: Option<Uuid>,
    pub photo_url: String,
    pub days_post_op: i64,
    pub procedure_type: Option<String>,
    pub recovery_score: Option<f64>,
    pub confidence_level: Option<f64>,
    #[serde(default)]
    pub overall_severity: Severity,
    #[serde(default)]
    pub has_hematoma: bool,
    pub hematoma_severity: Option<Severity>,
    #[serde(default)]
    pub has_edema: bool,
    pub edema_severity: Option<Severity>,
    #[serde(default)]
    pub has_infection: bool,
    pub infection_severity: Option<Severity>,
    #[serde(default)]
    pub has_asymmetry: bool,
    pub asymmetry_severity: Option<Severity>,
    #[serde(default)]
    pub has_dehiscence: bool,
    #[serde(default)]
    pub has_necrosis: bool,
    #[serde(default)]
    pub has_seroma: bool,
    pub detected_features: Option<Value>,
    pub recommendations: Option<Value>,
    /// Defaults to true for high and critical severities.
    pub requires_doctor_review: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePhotoAnalysisRequest {
    pub patient_id: Option<Uuid>,
    pub photo_url: Option<String>,
    pub days_post_op: Option<i64>,
    pub procedure_type: Option<String>,
    pub recovery_score: Option<f64>,
    pub confidence_level: Option<f64>,
    pub overall_severity: Option<Severity>,
    pub has_hematoma: Option<bool>,
    pub hematoma_severity: Option<Severity>,
    pub has_edema: Option<bool>,
    pub edema_severity: Option<Severity>,
    pub has_infection: Option<bool>,
    pub infection_severity: Option<Severity>,
    pub has_asymmetry: Option<bool>,
    pub asymmetry_severity: Option<Severity>,
    pub has_dehiscence: Option<bool>,
    pub has_necrosis: Option<bool>,
    pub has_seroma: Option<bool>,
    pub detected_features: Option<Value>,
    pub recommendations: Option<Value>,
    pub requires_doctor_review: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub doctor_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAnalysisQuery {
    pub patient_id: Option<Uuid>,
    pub severity: Option<Severity>,
    pub pending_review: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("Photo analysis not found")]
    NotFound,

    #[error("Patient {0} not found")]
    PatientNotFound(Uuid),

    #[error("Patient {0} does not exist")]
    UnknownPatient(Uuid),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for RecoveryError {
    fn from(error: sqlx::Error) -> Self {
        RecoveryError::Database(error.into())
    }
}

impl From<PatientError> for RecoveryError {
    fn from(error: PatientError) -> Self {
        match error {
            PatientError::Database(db) => RecoveryError::Database(db),
            other => RecoveryError::ValidationError(other.to_string()),
        }
    }
}

impl From<RecoveryError> for AppError {
    fn from(error: RecoveryError) -> Self {
        match error {
            RecoveryError::NotFound | RecoveryError::PatientNotFound(_) => AppError::NotFound(error.to_string()),
            RecoveryError::UnknownPatient(_) => AppError::ValidationError(error.to_string()),
            RecoveryError::ValidationError(msg) => AppError::ValidationError(msg),
            RecoveryError::Database(db) => db.into(),
        }
    }
}
