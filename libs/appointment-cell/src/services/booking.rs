use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};
use uuid::Uuid;

use auth_cell::services::UserService;
use shared_database::DbPool;
use shared_models::pagination::Pagination;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, CreateAppointmentRequest, UpdateAppointmentRequest,
};

pub struct AppointmentBookingService {
    pool: DbPool,
}

impl AppointmentBookingService {
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Books an appointment. A missing patient surfaces as a foreign-key violation.
    pub async fn book_appointment(&self, request: CreateAppointmentRequest) -> Result<Appointment, AppointmentError> {
        debug!("Booking appointment for patient {} at {}", request.patient_id, request.scheduled_at);

        validate_duration(request.duration_minutes)?;
        if let Some(doctor_id) = request.doctor_id {
            UserService::new(&self.pool).require_doctor(doctor_id).await?;
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO appointments (id, patient_id, doctor_id, scheduled_at, duration_minutes, status, \
             appointment_type, notes, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(request.patient_id.to_string())
        .bind(request.doctor_id.map(|d| d.to_string()))
        .bind(request.scheduled_at)
        .bind(request.duration_minutes)
        .bind(request.status.as_str())
        .bind(request.appointment_type.as_str())
        .bind(request.notes)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!("Appointment {} booked", id);
        self.get_appointment(id).await
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
            .bind(appointment_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let (limit, offset) = Pagination {
            limit: query.limit,
            offset: query.offset,
        }
        .resolve();

        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppointmentError::ValidationError(
                    "`from` must not be after `to`".to_string(),
                ));
            }
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM appointments WHERE 1 = 1");
        if let Some(patient_id) = query.patient_id {
            builder.push(" AND patient_id = ").push_bind(patient_id.to_string());
        }
        if let Some(doctor_id) = query.doctor_id {
            builder.push(" AND doctor_id = ").push_bind(doctor_id.to_string());
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = query.from {
            builder.push(" AND scheduled_at >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            builder.push(" AND scheduled_at <= ").push_bind(to);
        }
        builder
            .push(" ORDER BY scheduled_at ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let appointments = builder.build_query_as::<Appointment>().fetch_all(&self.pool).await?;
        debug!("Found {} appointments", appointments.len());
        Ok(appointments)
    }

    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.get_appointment(appointment_id).await?;

        if let Some(duration) = request.duration_minutes {
            validate_duration(duration)?;
        }
        if let Some(Some(doctor_id)) = request.doctor_id {
            UserService::new(&self.pool).require_doctor(doctor_id).await?;
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE appointments SET updated_at = ");
        builder.push_bind(Utc::now());

        if let Some(doctor_id) = request.doctor_id {
            builder.push(", doctor_id = ").push_bind(doctor_id.map(|id| id.to_string()));
        }
        if let Some(scheduled_at) = request.scheduled_at {
            builder.push(", scheduled_at = ").push_bind(scheduled_at);
        }
        if let Some(duration) = request.duration_minutes {
            builder.push(", duration_minutes = ").push_bind(duration);
        }
        if let Some(status) = request.status {
            builder.push(", status = ").push_bind(status.as_str());
        }
        if let Some(kind) = request.appointment_type {
            builder.push(", appointment_type = ").push_bind(kind.as_str());
        }
        if let Some(notes) = request.notes {
            builder.push(", notes = ").push_bind(notes);
        }
        if let Some(diagnosis) = request.diagnosis {
            builder.push(", diagnosis = ").push_bind(diagnosis);
        }
        if let Some(treatment) = request.treatment {
            builder.push(", treatment = ").push_bind(treatment);
        }
        if let Some(prescription) = request.prescription {
            builder.push(", prescription = ").push_bind(prescription);
        }

        builder.push(" WHERE id = ").push_bind(appointment_id.to_string());
        builder.build().execute(&self.pool).await?;

        info!("Appointment {} updated", appointment_id);
        self.get_appointment(appointment_id).await
    }

    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
            .bind(appointment_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppointmentError::NotFound);
        }
        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }
}

fn validate_duration(minutes: i64) -> Result<(), AppointmentError> {
    if minutes <= 0 {
        return Err(AppointmentError::ValidationError(
            "duration_minutes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
