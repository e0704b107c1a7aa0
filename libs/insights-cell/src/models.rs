use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use patient_cell::models::PatientError;
use recovery_cell::models::{PhotoAnalysis, RecoveryError, Severity};
use shared_models::error::{AppError, DbError};

// ==============================================================================
// TIMELINE
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    Appointment,
    PhotoAnalysis,
    Payment,
}

/// One entry of a patient's history, whatever table it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub kind: TimelineEventKind,
    pub occurred_at: DateTime<Utc>,
    pub title: String,
    pub status: Option<String>,
    pub severity: Option<Severity>,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientTimeline {
    pub patient_id: Uuid,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub events: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryPoint {
    pub analysis_id: Uuid,
    pub days_post_op: i64,
    pub recovery_score: Option<f64>,
    pub overall_severity: Severity,
    pub captured_at: DateTime<Utc>,
}

impl From<&PhotoAnalysis> for RecoveryPoint {
    fn from(analysis: &PhotoAnalysis) -> Self {
        Self {
            analysis_id: analysis.id,
            days_post_op: analysis.days_post_op,
            recovery_score: analysis.recovery_score,
            overall_severity: analysis.overall_severity,
            captured_at: analysis.created_at,
        }
    }
}

// ==============================================================================
// DASHBOARD
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrencyTotal {
    pub currency: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_patients: i64,
    pub active_patients: i64,
    pub upcoming_appointments: i64,
    pub pending_reviews: i64,
    pub revenue: Vec<CurrencyTotal>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewQueueQuery {
    pub limit: Option<i64>,
}

// ==============================================================================
// GAMIFICATION
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    FirstPhoto,
    ConsistentTracker,
    FirstWeek,
    FirstMonth,
    StrongRecovery,
    CommittedPatient,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientProgress {
    pub patient_id: Uuid,
    pub points: i64,
    pub level: i64,
    pub photos_submitted: i64,
    pub appointments_completed: i64,
    pub badges: Vec<Badge>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum InsightsError {
    #[error("Patient {0} not found")]
    PatientNotFound(Uuid),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for InsightsError {
    fn from(error: sqlx::Error) -> Self {
        InsightsError::Database(error.into())
    }
}

impl From<PatientError> for InsightsError {
    fn from(error: PatientError) -> Self {
        match error {
            PatientError::Database(db) => InsightsError::Database(db),
            other => InsightsError::ValidationError(other.to_string()),
        }
    }
}

impl From<RecoveryError> for InsightsError {
    fn from(error: RecoveryError) -> Self {
        match error {
            RecoveryError::Database(db) => InsightsError::Database(db),
            RecoveryError::PatientNotFound(id) => InsightsError::PatientNotFound(id),
            other => InsightsError::ValidationError(other.to_string()),
        }
    }
}

impl From<InsightsError> for AppError {
    fn from(error: InsightsError) -> Self {
        match error {
            InsightsError::PatientNotFound(_) => AppError::NotFound(error.to_string()),
            InsightsError::ValidationError(msg) => AppError::ValidationError(msg),
            InsightsError::Database(db) => db.into(),
        }
    }
}
