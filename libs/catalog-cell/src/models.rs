use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use shared_database::rows::get_json;
use shared_models::error::{AppError, DbError};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Procedure {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub recovery_days: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmotionalMapping {
    pub id: i64,
    pub procedure_name: String,
    pub emotional_profile: String,
    pub primary_concern: Option<String>,
    pub messaging_tone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRule {
    pub id: i64,
    pub procedure_name: String,
    pub rule_name: String,
    pub day_from: i64,
    pub day_to: Option<i64>,
    pub trigger_condition: String,
    pub severity: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    /// Whether the rule's day window covers `day` after surgery.
    pub fn applies_on(&self, day: i64) -> bool {
        day >= self.day_from && self.day_to.map_or(true, |to| day <= to)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protocol {
    pub id: i64,
    pub procedure_name: String,
    pub title: String,
    pub version: Option<String>,
    pub steps: Value,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Protocol {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            procedure_name: row.try_get("procedure_name")?,
            title: row.try_get("title")?,
            version: row.try_get("version")?,
            steps: get_json(row, "steps")?.unwrap_or(Value::Null),
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Everything the catalog knows about one procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureDetail {
    pub procedure: Procedure,
    pub emotional_mapping: Option<EmotionalMapping>,
    pub alerts: Vec<AlertRule>,
    pub protocol: Option<Protocol>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcedureQuery {
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcedureDetailQuery {
    /// Days after surgery; keeps only the alerts whose window covers it.
    pub day: Option<i64>,
}

/// Outcome of importing one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub table: String,
    pub inserted: u64,
    pub skipped: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Procedure {0} not found")]
    ProcedureNotFound(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for CatalogError {
    fn from(error: sqlx::Error) -> Self {
        CatalogError::Database(error.into())
    }
}

impl From<CatalogError> for AppError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::ProcedureNotFound(_) => AppError::NotFound(error.to_string()),
            CatalogError::Database(db) => db.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("{table}: column mapping failed: {reason}")]
    Mapping { table: &'static str, reason: String },

    #[error("{table}: record {record} is invalid: {reason}")]
    InvalidRecord {
        table: &'static str,
        record: usize,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for ImportError {
    fn from(error: sqlx::Error) -> Self {
        ImportError::Database(error.into())
    }
}
