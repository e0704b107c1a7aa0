use chrono::Utc;
use sqlx::Row;
use tracing::debug;

use recovery_cell::models::PhotoAnalysis;
use recovery_cell::services::PhotoAnalysisService;
use shared_database::DbPool;

use crate::models::{CurrencyTotal, DashboardStats, InsightsError};

const DEFAULT_REVIEW_LIMIT: i64 = 20;
const MAX_REVIEW_LIMIT: i64 = 100;

pub struct DashboardService {
    pool: DbPool,
}

impl DashboardService {
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn stats(&self) -> Result<DashboardStats, InsightsError> {
        let now = Utc::now();

        let total_patients = self.count("SELECT COUNT(*) FROM patients").await?;
        let active_patients = self
            .count("SELECT COUNT(*) FROM patients WHERE status = 'active'")
            .await?;

        let upcoming_appointments: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments \
             WHERE scheduled_at >= ? AND status IN ('scheduled', 'confirmed')",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let pending_reviews = self
            .count("SELECT COUNT(*) FROM photo_analyses WHERE requires_doctor_review = 1 AND reviewed_at IS NULL")
            .await?;

        let revenue = sqlx::query(
            "SELECT currency, SUM(amount) AS total FROM payments \
             WHERE status = 'succeeded' GROUP BY currency ORDER BY currency",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| -> Result<CurrencyTotal, sqlx::Error> {
            Ok(CurrencyTotal {
                currency: row.try_get("currency")?,
                amount: row.try_get("total")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

        debug!(
            "Dashboard: {} patients, {} upcoming appointments, {} pending reviews",
            total_patients, upcoming_appointments, pending_reviews
        );

        Ok(DashboardStats {
            total_patients,
            active_patients,
            upcoming_appointments,
            pending_reviews,
            revenue,
            generated_at: now,
        })
    }

    /// Analyses awaiting a doctor, oldest first.
    pub async fn review_queue(&self, limit: Option<i64>) -> Result<Vec<PhotoAnalysis>, InsightsError> {
        let limit = limit.unwrap_or(DEFAULT_REVIEW_LIMIT).clamp(1, MAX_REVIEW_LIMIT);
        let analyses = PhotoAnalysisService::new(&self.pool).pending_reviews(limit).await?;
        Ok(analyses)
    }

    async fn count(&self, sql: &str) -> Result<i64, InsightsError> {
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}
