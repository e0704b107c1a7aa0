use serde_json::json;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::debug;
use uuid::Uuid;

use appointment_cell::models::Appointment;
use patient_cell::services::PatientService;
use payment_cell::models::Payment;
use recovery_cell::models::PhotoAnalysis;
use shared_database::DbPool;

use crate::models::{
    InsightsError, PatientTimeline, RecoveryPoint, TimelineEvent, TimelineEventKind, TimelineQuery,
};

pub struct TimelineService {
    pool: DbPool,
}

impl TimelineService {
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Appointments, photo analyses and payments of one patient, oldest first.
    pub async fn patient_timeline(
        &self,
        patient_id: Uuid,
        query: TimelineQuery,
    ) -> Result<PatientTimeline, InsightsError> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(InsightsError::ValidationError(
                    "`from` must not be later than `to`".to_string(),
                ));
            }
        }
        self.ensure_patient(patient_id).await?;

        let appointments: Vec<Appointment> = self
            .fetch("appointments", "scheduled_at", patient_id, &query)
            .await?;
        let analyses: Vec<PhotoAnalysis> = self
            .fetch("photo_analyses", "created_at", patient_id, &query)
            .await?;
        let payments: Vec<Payment> = self.fetch("payments", "created_at", patient_id, &query).await?;

        let mut events: Vec<TimelineEvent> = Vec::with_capacity(appointments.len() + analyses.len() + payments.len());
        events.extend(appointments.iter().map(appointment_event));
        events.extend(analyses.iter().map(analysis_event));
        events.extend(payments.iter().map(payment_event));
        events.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.kind.cmp(&b.kind)));

        debug!("Timeline for patient {} has {} events", patient_id, events.len());
        Ok(PatientTimeline {
            patient_id,
            earliest: events.first().map(|e| e.occurred_at),
            latest: events.last().map(|e| e.occurred_at),
            events,
        })
    }

    /// Recovery score series ordered by days after surgery.
    pub async fn recovery_series(&self, patient_id: Uuid) -> Result<Vec<RecoveryPoint>, InsightsError> {
        self.ensure_patient(patient_id).await?;

        let analyses = sqlx::query_as::<_, PhotoAnalysis>(
            "SELECT * FROM photo_analyses WHERE patient_id = ? ORDER BY days_post_op ASC, created_at ASC",
        )
        .bind(patient_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(analyses.iter().map(RecoveryPoint::from).collect())
    }

    async fn ensure_patient(&self, patient_id: Uuid) -> Result<(), InsightsError> {
        if PatientService::new(&self.pool).exists(patient_id).await? {
            Ok(())
        } else {
            Err(InsightsError::PatientNotFound(patient_id))
        }
    }

    async fn fetch<T>(
        &self,
        table: &str,
        time_column: &str,
        patient_id: Uuid,
        query: &TimelineQuery,
    ) -> Result<Vec<T>, InsightsError>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT * FROM {} WHERE patient_id = ", table));
        builder.push_bind(patient_id.to_string());
        if let Some(from) = query.from {
            builder.push(format!(" AND {} >= ", time_column)).push_bind(from);
        }
        if let Some(to) = query.to {
            builder.push(format!(" AND {} <= ", time_column)).push_bind(to);
        }

        let rows = builder.build_query_as::<T>().fetch_all(&self.pool).await?;
        Ok(rows)
    }
}

fn appointment_event(appointment: &Appointment) -> TimelineEvent {
    TimelineEvent {
        id: appointment.id,
        kind: TimelineEventKind::Appointment,
        occurred_at: appointment.scheduled_at,
        title: format!("{} appointment", appointment.appointment_type.as_str().replace('_', " ")),
        status: Some(appointment.status.as_str().to_string()),
        severity: None,
        details: json!({
            "doctor_id": appointment.doctor_id,
            "duration_minutes": appointment.duration_minutes,
            "diagnosis": appointment.diagnosis,
        }),
    }
}

fn analysis_event(analysis: &PhotoAnalysis) -> TimelineEvent {
    let status = if analysis.is_pending_review() {
        "pending_review"
    } else if analysis.reviewed_at.is_some() {
        "reviewed"
    } else {
        "recorded"
    };
    TimelineEvent {
        id: analysis.id,
        kind: TimelineEventKind::PhotoAnalysis,
        occurred_at: analysis.created_at,
        title: format!("Photo analysis, day {}", analysis.days_post_op),
        status: Some(status.to_string()),
        severity: Some(analysis.overall_severity),
        details: json!({
            "photo_url": analysis.photo_url,
            "days_post_op": analysis.days_post_op,
            "recovery_score": analysis.recovery_score,
            "procedure_type": analysis.procedure_type,
        }),
    }
}

fn payment_event(payment: &Payment) -> TimelineEvent {
    TimelineEvent {
        id: payment.id,
        kind: TimelineEventKind::Payment,
        occurred_at: payment.created_at,
        title: format!("Payment of {} {}", payment.amount, payment.currency),
        status: Some(payment.status.as_str().to_string()),
        severity: None,
        details: json!({
            "appointment_id": payment.appointment_id,
            "payment_intent_id": payment.payment_intent_id,
        }),
    }
}
