use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};
use uuid::Uuid;

use auth_cell::services::UserService;
use shared_database::DbPool;
use shared_models::error::DbError;
use shared_models::pagination::Pagination;
use shared_utils::validation::{normalize_email, require_non_blank};

use crate::models::{CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest};

pub struct PatientService {
    pool: DbPool,
}

impl PatientService {
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn create_patient(&self, request: CreatePatientRequest) -> Result<Patient, PatientError> {
        require_non_blank("name", &request.name).map_err(PatientError::ValidationError)?;
        let email = normalize_email(&request.email).map_err(PatientError::ValidationError)?;
        debug!("Creating new patient profile for: {}", email);

        if let Some(doctor_id) = request.assigned_doctor_id {
            UserService::new(&self.pool).require_doctor(doctor_id).await?;
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO patients (id, name, email, phone, birth_date, document_id, address, status, \
             medical_history, allergies, medications, assigned_doctor_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(request.name.trim())
        .bind(&email)
        .bind(request.phone)
        .bind(request.birth_date)
        .bind(request.document_id)
        .bind(request.address)
        .bind(request.status.as_str())
        .bind(request.medical_history)
        .bind(request.allergies)
        .bind(request.medications)
        .bind(request.assigned_doctor_id.map(|d| d.to_string()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result.map_err(DbError::from) {
            Ok(_) => {}
            Err(DbError::UniqueViolation(_)) => return Err(PatientError::EmailAlreadyExists { email }),
            Err(e) => return Err(e.into()),
        }

        info!("Patient profile created with ID: {}", id);
        self.get_patient(id).await
    }

    pub async fn get_patient(&self, patient_id: Uuid) -> Result<Patient, PatientError> {
        sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = ?")
            .bind(patient_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(PatientError::NotFound)
    }

    pub async fn search_patients(&self, query: PatientSearchQuery) -> Result<Vec<Patient>, PatientError> {
        let (limit, offset) = Pagination {
            limit: query.limit,
            offset: query.offset,
        }
        .resolve();

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM patients WHERE 1 = 1");
        if let Some(name) = query.name.filter(|n| !n.trim().is_empty()) {
            builder.push(" AND name LIKE ").push_bind(format!("%{}%", name.trim()));
        }
        if let Some(email) = query.email.filter(|e| !e.trim().is_empty()) {
            builder
                .push(" AND email LIKE ")
                .push_bind(format!("%{}%", email.trim().to_lowercase()));
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(doctor_id) = query.assigned_doctor_id {
            builder.push(" AND assigned_doctor_id = ").push_bind(doctor_id.to_string());
        }
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let patients = builder.build_query_as::<Patient>().fetch_all(&self.pool).await?;
        debug!("Found {} patients", patients.len());
        Ok(patients)
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient profile: {}", patient_id);
        self.get_patient(patient_id).await?;

        if let Some(Some(doctor_id)) = request.assigned_doctor_id {
            UserService::new(&self.pool).require_doctor(doctor_id).await?;
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE patients SET updated_at = ");
        builder.push_bind(Utc::now());

        if let Some(name) = request.name {
            require_non_blank("name", &name).map_err(PatientError::ValidationError)?;
            builder.push(", name = ").push_bind(name.trim().to_string());
        }
        let mut new_email = None;
        if let Some(email) = request.email {
            let email = normalize_email(&email).map_err(PatientError::ValidationError)?;
            builder.push(", email = ").push_bind(email.clone());
            new_email = Some(email);
        }
        if let Some(phone) = request.phone {
            builder.push(", phone = ").push_bind(phone);
        }
        if let Some(birth_date) = request.birth_date {
            builder.push(", birth_date = ").push_bind(birth_date);
        }
        if let Some(document_id) = request.document_id {
            builder.push(", document_id = ").push_bind(document_id);
        }
        if let Some(address) = request.address {
            builder.push(", address = ").push_bind(address);
        }
        if let Some(status) = request.status {
            builder.push(", status = ").push_bind(status.as_str());
        }
        if let Some(history) = request.medical_history {
            builder.push(", medical_history = ").push_bind(history);
        }
        if let Some(allergies) = request.allergies {
            builder.push(", allergies = ").push_bind(allergies);
        }
        if let Some(medications) = request.medications {
            builder.push(", medications = ").push_bind(medications);
        }
        if let Some(doctor_id) = request.assigned_doctor_id {
            builder
                .push(", assigned_doctor_id = ")
                .push_bind(doctor_id.map(|id| id.to_string()));
        }

        builder.push(" WHERE id = ").push_bind(patient_id.to_string());

        match builder.build().execute(&self.pool).await.map_err(DbError::from) {
            Ok(_) => {}
            Err(DbError::UniqueViolation(_)) => {
                return Err(PatientError::EmailAlreadyExists {
                    email: new_email.unwrap_or_default(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        self.get_patient(patient_id).await
    }

    /// Deletes a patient with their appointments and photo analyses.
    /// Patients with payments on record cannot be deleted.
    pub async fn delete_patient(&self, patient_id: Uuid) -> Result<(), PatientError> {
        let mut tx = self.pool.begin().await?;

        // photo_analyses.patient_id carries no foreign key.
        sqlx::query("DELETE FROM photo_analyses WHERE patient_id = ?")
            .bind(patient_id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(patient_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(DbError::from);

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(PatientError::NotFound),
            Ok(_) => {
                tx.commit().await?;
                info!("Patient {} deleted", patient_id);
                Ok(())
            }
            Err(DbError::ForeignKeyViolation(_)) => Err(PatientError::HasDependents(patient_id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, patient_id: Uuid) -> Result<bool, PatientError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM patients WHERE id = ?")
            .bind(patient_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}
